use std::collections::VecDeque;

/// One word on the link.
///
/// Storage is `u32`; the configured word width (16 to 32 bits) masks the
/// usable range. The protocol never transfers partial words.
pub type Word = u32;

/// Producer side of a flow-controlled word stream.
///
/// The contract mirrors a FIFO write port: a rejected push consumes
/// nothing, and the producer is expected to retry the same word once
/// capacity returns.
pub trait WordSink {
    /// Attempt to push one word. Returns `false` when backpressured;
    /// the word is not consumed.
    fn try_push(&mut self, word: Word) -> bool;
}

/// Consumer side of a flow-controlled word stream.
pub trait WordSource {
    /// Attempt to pop one word. `None` means no data is available yet.
    fn try_pop(&mut self) -> Option<Word>;
}

/// Unbounded sink, useful in tests and harnesses that only need to
/// capture the wire.
impl WordSink for VecDeque<Word> {
    fn try_push(&mut self, word: Word) -> bool {
        self.push_back(word);
        true
    }
}

impl WordSource for VecDeque<Word> {
    fn try_pop(&mut self) -> Option<Word> {
        self.pop_front()
    }
}
