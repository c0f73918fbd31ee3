use tracing::{debug, trace};

use wordmux_link::{Word, WordSink, WordSource};

use crate::channel::ChannelId;
use crate::codec::{self, MuxConfig, CONTROL_WORD};
use crate::error::{FrameError, Result};

/// Wire write in progress. Tracks per-word progress so a link stall
/// resumes exactly where it left off, with nothing dropped or repeated.
enum Pending {
    /// Channel-select frame. The active cursor moves only once both
    /// words are on the link.
    Select {
        channel: ChannelId,
        control_sent: bool,
    },
    /// Escaped literal control word (two control words back to back).
    Escape { first_sent: bool },
    /// Plain payload word.
    Data(Word),
}

/// Egress engine: multiplexes per-channel queues onto the shared link.
///
/// Drains the channel queues round-robin, up to `batch_size` words per
/// channel before rotating. A select frame is written before the first
/// word of a newly chosen channel and never for the channel that is
/// already active. Payload words are escaped per the codec rule.
pub struct Multiplexer<L> {
    link: L,
    config: MuxConfig,
    active: Option<ChannelId>,
    cursor: usize,
    drained: usize,
    pending: Option<Pending>,
    /// Word popped from its queue but not yet encoded onto the link.
    held: Option<(ChannelId, Word)>,
}

impl<L: WordSink> Multiplexer<L> {
    /// Create a multiplexer with the default configuration.
    pub fn new(link: L) -> Self {
        Self {
            link,
            config: MuxConfig::default(),
            active: None,
            cursor: 0,
            drained: 0,
            pending: None,
            held: None,
        }
    }

    /// Create a multiplexer with an explicit configuration.
    pub fn with_config(link: L, config: MuxConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new(link)
        })
    }

    /// Drain the channel queues onto the link until every queue is empty
    /// or the link backpressures. Returns the number of payload words
    /// accepted from the queues during this call.
    ///
    /// `queues` must hold exactly `channel_count` entries, indexed by
    /// channel id. A rejected link push stalls the engine at that exact
    /// word; a later pump resumes the in-flight frame or escape pair.
    pub fn pump<Q: WordSource>(&mut self, queues: &mut [Q]) -> Result<usize> {
        if queues.len() != self.config.channel_count {
            return Err(FrameError::InvalidConfig {
                reason: "queue slice length must match channel_count",
            });
        }

        let mask = self.config.word_mask();
        let mut accepted = 0;
        loop {
            if !self.flush_pending() {
                return Ok(accepted);
            }

            if let Some((channel, word)) = self.held {
                if self.active != Some(channel) {
                    self.pending = Some(Pending::Select {
                        channel,
                        control_sent: false,
                    });
                    continue;
                }
                self.held = None;
                self.pending = Some(if codec::is_control(word) {
                    Pending::Escape { first_sent: false }
                } else {
                    Pending::Data(word)
                });
                continue;
            }

            let Some((channel, word)) = self.next_word(queues) else {
                return Ok(accepted);
            };
            if word & !mask != 0 {
                return Err(FrameError::WordOutOfRange {
                    word,
                    width: self.config.word_width,
                });
            }
            accepted += 1;
            self.held = Some((channel, word));
        }
    }

    /// Pick the next source word. Finishes the current channel's batch
    /// first, then rotates to the next channel with pending data; empty
    /// channels are skipped so no redundant select frame is ever emitted.
    fn next_word<Q: WordSource>(&mut self, queues: &mut [Q]) -> Option<(ChannelId, Word)> {
        let n = queues.len();
        if self.drained < self.config.batch_size {
            if let Some(word) = queues[self.cursor].try_pop() {
                self.drained += 1;
                return Some((self.cursor as ChannelId, word));
            }
        }
        for off in 1..=n {
            let c = (self.cursor + off) % n;
            if let Some(word) = queues[c].try_pop() {
                self.cursor = c;
                self.drained = 1;
                return Some((c as ChannelId, word));
            }
        }
        None
    }

    /// Push the in-flight wire write onto the link. Returns false when
    /// the link backpressures, leaving the remaining words pending.
    fn flush_pending(&mut self) -> bool {
        while let Some(pending) = self.pending.take() {
            match pending {
                Pending::Select {
                    channel,
                    control_sent,
                } => {
                    if !control_sent && !self.link.try_push(CONTROL_WORD) {
                        self.pending = Some(Pending::Select {
                            channel,
                            control_sent: false,
                        });
                        return false;
                    }
                    if !self.link.try_push(codec::select_word(channel)) {
                        self.pending = Some(Pending::Select {
                            channel,
                            control_sent: true,
                        });
                        return false;
                    }
                    debug!(channel, "egress channel switch");
                    self.active = Some(channel);
                }
                Pending::Escape { first_sent } => {
                    if !first_sent && !self.link.try_push(CONTROL_WORD) {
                        self.pending = Some(Pending::Escape { first_sent: false });
                        return false;
                    }
                    if !self.link.try_push(CONTROL_WORD) {
                        self.pending = Some(Pending::Escape { first_sent: true });
                        return false;
                    }
                    trace!("escaped literal control word");
                }
                Pending::Data(word) => {
                    if !self.link.try_push(word) {
                        self.pending = Some(Pending::Data(word));
                        return false;
                    }
                    trace!(word, "forwarded word");
                }
            }
        }
        true
    }

    /// Hard state reset: discards the in-flight wire write and any held
    /// word. The next drained channel re-emits its select frame.
    pub fn reset(&mut self) {
        debug!("multiplexer reset");
        self.active = None;
        self.cursor = 0;
        self.drained = 0;
        self.pending = None;
        self.held = None;
    }

    /// The channel the link currently carries, if any frame has been
    /// emitted yet.
    pub fn active_channel(&self) -> Option<ChannelId> {
        self.active
    }

    /// True while a channel-select frame is only partially on the link.
    pub fn frame_pending(&self) -> bool {
        matches!(self.pending, Some(Pending::Select { .. }))
    }

    /// Borrow the underlying link.
    pub fn get_ref(&self) -> &L {
        &self.link
    }

    /// Mutably borrow the underlying link.
    pub fn get_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Consume the engine and return the link.
    pub fn into_inner(self) -> L {
        self.link
    }

    /// Current configuration.
    pub fn config(&self) -> &MuxConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use wordmux_link::WordQueue;

    use super::*;

    fn filled(words: &[Word], capacity: usize) -> WordQueue {
        let mut q = WordQueue::new(capacity);
        for &w in words {
            assert!(q.try_push(w));
        }
        q
    }

    #[test]
    fn encodes_worked_example() {
        let mut mux = Multiplexer::new(VecDeque::new());
        let mut chans = vec![
            filled(&[0x1111, 0xC001, 0x2222], 8),
            filled(&[0x3333], 8),
        ];

        let accepted = mux.pump(&mut chans).unwrap();

        assert_eq!(accepted, 4);
        let wire: Vec<Word> = mux.into_inner().into();
        assert_eq!(
            wire,
            [0xC001, 0xAB00, 0x1111, 0xC001, 0xC001, 0x2222, 0xC001, 0xAB01, 0x3333]
        );
    }

    #[test]
    fn no_select_frame_for_the_already_active_channel() {
        let mut mux = Multiplexer::new(VecDeque::new());
        let mut chans = vec![filled(&[0x0001], 8), WordQueue::new(8)];

        mux.pump(&mut chans).unwrap();
        assert_eq!(mux.active_channel(), Some(0));

        // New data on the same channel, other channels stay silent.
        assert!(chans[0].try_push(0x0002));
        mux.pump(&mut chans).unwrap();

        let wire: Vec<Word> = mux.into_inner().into();
        assert_eq!(wire, [0xC001, 0xAB00, 0x0001, 0x0002]);
    }

    #[test]
    fn batch_rotation_back_to_sole_channel_emits_no_frame() {
        let config = MuxConfig {
            batch_size: 2,
            ..MuxConfig::default()
        };
        let mut mux = Multiplexer::with_config(VecDeque::new(), config).unwrap();
        let mut chans = vec![filled(&[1, 2, 3, 4, 5], 8), WordQueue::new(8)];

        mux.pump(&mut chans).unwrap();

        let wire: Vec<Word> = mux.into_inner().into();
        assert_eq!(wire, [0xC001, 0xAB00, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn round_robin_interleaves_batches() {
        let config = MuxConfig {
            batch_size: 1,
            ..MuxConfig::default()
        };
        let mut mux = Multiplexer::with_config(VecDeque::new(), config).unwrap();
        let mut chans = vec![filled(&[0x0A, 0x0B], 8), filled(&[0x1A, 0x1B], 8)];

        mux.pump(&mut chans).unwrap();

        let wire: Vec<Word> = mux.into_inner().into();
        assert_eq!(
            wire,
            [
                0xC001, 0xAB00, 0x0A, //
                0xC001, 0xAB01, 0x1A, //
                0xC001, 0xAB00, 0x0B, //
                0xC001, 0xAB01, 0x1B,
            ]
        );
    }

    #[test]
    fn link_backpressure_resumes_mid_frame_and_mid_escape() {
        // A one-word link forces a stall between every pair of wire words.
        let mut mux = Multiplexer::new(WordQueue::new(1));
        let mut chans = vec![filled(&[0x1111, 0xC001], 8), filled(&[0x3333], 8)];

        let mut wire = Vec::new();
        let mut stalled_mid_select = false;
        loop {
            mux.pump(&mut chans).unwrap();
            stalled_mid_select |= mux.frame_pending();
            match mux.get_mut().try_pop() {
                Some(w) => wire.push(w),
                None => break,
            }
        }

        assert!(stalled_mid_select, "one-word link must stall inside a select frame");
        assert_eq!(
            wire,
            [0xC001, 0xAB00, 0x1111, 0xC001, 0xC001, 0xC001, 0xAB01, 0x3333]
        );
    }

    #[test]
    fn over_width_word_is_rejected_with_the_raw_word() {
        let mut mux = Multiplexer::new(VecDeque::new());
        let mut chans = vec![filled(&[0x1_2345], 8), WordQueue::new(8)];

        let err = mux.pump(&mut chans).unwrap_err();
        assert!(matches!(
            err,
            FrameError::WordOutOfRange {
                word: 0x1_2345,
                width: 16
            }
        ));
    }

    #[test]
    fn reset_forces_a_fresh_select_frame() {
        let mut mux = Multiplexer::new(VecDeque::new());
        let mut chans = vec![filled(&[0x0001], 8), WordQueue::new(8)];
        mux.pump(&mut chans).unwrap();

        mux.reset();
        assert_eq!(mux.active_channel(), None);

        assert!(chans[0].try_push(0x0002));
        mux.pump(&mut chans).unwrap();

        let wire: Vec<Word> = mux.into_inner().into();
        assert_eq!(
            wire,
            [0xC001, 0xAB00, 0x0001, 0xC001, 0xAB00, 0x0002],
            "the select frame must be re-emitted after a reset"
        );
    }

    #[test]
    fn queue_slice_must_match_channel_count() {
        let mut mux = Multiplexer::new(VecDeque::new());
        let mut chans = vec![WordQueue::new(8)];
        let err = mux.pump(&mut chans).unwrap_err();
        assert!(matches!(err, FrameError::InvalidConfig { .. }));
    }
}
