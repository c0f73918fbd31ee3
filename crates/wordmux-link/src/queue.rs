use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::traits::{Word, WordSink, WordSource};

/// Bounded word FIFO with an explicit reset.
///
/// Single writer, single reader. The only handshake is the bounded
/// capacity itself: `try_push` fails when full, `try_pop` fails when
/// empty, and neither ever blocks.
#[derive(Debug)]
pub struct WordQueue {
    buf: VecDeque<Word>,
    capacity: usize,
}

impl WordQueue {
    /// Create a queue holding at most `capacity` words.
    ///
    /// A capacity of zero is allowed and yields a queue that is always
    /// full; it is occasionally useful to model a stuck consumer.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Number of words currently queued.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when no words are queued.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// True when the queue cannot accept another word.
    pub fn is_full(&self) -> bool {
        self.buf.len() >= self.capacity
    }

    /// Maximum number of queued words.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Atomically discard all queued words.
    ///
    /// Only safe to call when no engine is mid-frame for this channel;
    /// the engines expose their own `reset` for that side of the contract.
    pub fn reset(&mut self) {
        if !self.buf.is_empty() {
            debug!(discarded = self.buf.len(), "queue reset");
        }
        self.buf.clear();
    }
}

impl WordSink for WordQueue {
    fn try_push(&mut self, word: Word) -> bool {
        if self.is_full() {
            return false;
        }
        self.buf.push_back(word);
        true
    }
}

impl WordSource for WordQueue {
    fn try_pop(&mut self) -> Option<Word> {
        self.buf.pop_front()
    }
}

/// Create a producer/consumer handle pair over one shared bounded queue.
///
/// This is the cross-thread form of [`WordQueue`]: the producer and
/// consumer ends may live on different threads, matching the two
/// independent engines of a full-duplex session. The discipline stays
/// single-writer/single-reader; the mutex only guards the bounded-capacity
/// handshake.
pub fn word_channel(capacity: usize) -> (WordSender, WordReceiver) {
    let shared = Arc::new(Mutex::new(WordQueue::new(capacity)));
    (
        WordSender {
            shared: Arc::clone(&shared),
        },
        WordReceiver { shared },
    )
}

/// Producer handle of a shared word queue.
#[derive(Debug, Clone)]
pub struct WordSender {
    shared: Arc<Mutex<WordQueue>>,
}

impl WordSender {
    /// Number of words currently queued.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when no words are queued.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Atomically discard all queued words.
    pub fn reset(&self) {
        self.lock().reset();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WordQueue> {
        // A poisoned queue holds only plain words; the data is still
        // consistent, so recover the guard.
        match self.shared.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl WordSink for WordSender {
    fn try_push(&mut self, word: Word) -> bool {
        self.lock().try_push(word)
    }
}

/// Consumer handle of a shared word queue.
#[derive(Debug, Clone)]
pub struct WordReceiver {
    shared: Arc<Mutex<WordQueue>>,
}

impl WordReceiver {
    /// Number of words currently queued.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when no words are queued.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Atomically discard all queued words.
    pub fn reset(&self) {
        self.lock().reset();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WordQueue> {
        match self.shared.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl WordSource for WordReceiver {
    fn try_pop(&mut self) -> Option<Word> {
        self.lock().try_pop()
    }
}
