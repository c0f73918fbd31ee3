use tracing::{debug, trace, warn};

use wordmux_link::{Word, WordSink, WordSource};

use crate::channel::ChannelId;
use crate::codec::{self, MuxConfig, CONTROL_WORD};
use crate::error::{FrameError, Result};

/// Ingress engine: demultiplexes the shared link into per-channel queues.
///
/// Consumes words from the link, tracks the active destination channel
/// selected by in-band control frames, collapses escaped control words,
/// and routes payload words to the matching channel queue. Consumption
/// from the link is gated by the destination: a word whose queue rejects
/// the push is held, and no further link input is consumed until the
/// push succeeds.
pub struct Demultiplexer<L> {
    link: L,
    config: MuxConfig,
    active: Option<ChannelId>,
    pending_control: bool,
    /// Routed word waiting for its destination queue to accept it.
    held: Option<(ChannelId, Word)>,
    stalls: usize,
}

impl<L: WordSource> Demultiplexer<L> {
    /// Create a demultiplexer with the default configuration.
    pub fn new(link: L) -> Self {
        Self {
            link,
            config: MuxConfig::default(),
            active: None,
            pending_control: false,
            held: None,
            stalls: 0,
        }
    }

    /// Create a demultiplexer with an explicit configuration.
    pub fn with_config(link: L, config: MuxConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new(link)
        })
    }

    /// Drain the link into the channel queues until the link runs dry or
    /// a destination backpressures. Returns the number of payload words
    /// routed during this call.
    ///
    /// `queues` must hold exactly `channel_count` entries, indexed by
    /// channel id. Framing violations abort the session with the
    /// offending raw word; backpressure is not an error and a later pump
    /// resumes exactly where this one stopped.
    pub fn pump<Q: WordSink>(&mut self, queues: &mut [Q]) -> Result<usize> {
        if queues.len() != self.config.channel_count {
            return Err(FrameError::InvalidConfig {
                reason: "queue slice length must match channel_count",
            });
        }

        let mut routed = 0;
        loop {
            // Flush the held word before consuming any more link input.
            if let Some((channel, word)) = self.held {
                if !queues[channel as usize].try_push(word) {
                    self.stalls += 1;
                    if let Some(limit) = self.config.stall_limit {
                        if self.stalls >= limit {
                            let attempts = self.stalls;
                            self.stalls = 0;
                            warn!(channel, attempts, "channel queue overflow");
                            return Err(FrameError::QueueOverflow { channel, attempts });
                        }
                    }
                    return Ok(routed);
                }
                trace!(channel, word, "routed word");
                self.held = None;
                self.stalls = 0;
                routed += 1;
            }

            let Some(word) = self.link.try_pop() else {
                return Ok(routed);
            };

            if self.pending_control {
                self.pending_control = false;
                if codec::is_control(word) {
                    // Escaped literal: the pair collapses to one payload word.
                    self.route(CONTROL_WORD)?;
                } else {
                    let channel = codec::parse_select(word, self.config.channel_count)?;
                    debug!(channel, "ingress channel switch");
                    self.active = Some(channel);
                }
            } else if codec::is_control(word) {
                // Cannot decide between escape and select until the next
                // word arrives; suspend without consuming anything else.
                self.pending_control = true;
            } else {
                self.route(word)?;
            }
        }
    }

    fn route(&mut self, word: Word) -> Result<()> {
        match self.active {
            Some(channel) => {
                self.held = Some((channel, word));
                Ok(())
            }
            None => Err(FrameError::NoActiveChannel { word }),
        }
    }

    /// Hard state reset: discards any pending control sequence and held
    /// word. The active channel is undefined until the next select frame.
    pub fn reset(&mut self) {
        debug!("demultiplexer reset");
        self.active = None;
        self.pending_control = false;
        self.held = None;
        self.stalls = 0;
    }

    /// The channel payload words currently route to, if any frame has
    /// been seen yet.
    pub fn active_channel(&self) -> Option<ChannelId> {
        self.active
    }

    /// True while a control sequence or held word is in flight. Channel
    /// queue resets are only safe when this is false for the channel.
    pub fn is_mid_frame(&self) -> bool {
        self.pending_control || self.held.is_some()
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

    fn wire(words: &[Word]) -> VecDeque<Word> {
        words.iter().copied().collect()
    }

    fn queues(count: usize, capacity: usize) -> Vec<WordQueue> {
        (0..count).map(|_| WordQueue::new(capacity)).collect()
    }

    fn drain(q: &mut WordQueue) -> Vec<Word> {
        std::iter::from_fn(|| q.try_pop()).collect()
    }

    #[test]
    fn routes_payload_to_selected_channel() {
        let link = wire(&[0xC001, 0xAB01, 0x1234, 0x5678]);
        let mut demux = Demultiplexer::new(link);
        let mut chans = queues(2, 8);

        let routed = demux.pump(&mut chans).unwrap();

        assert_eq!(routed, 2);
        assert_eq!(demux.active_channel(), Some(1));
        assert!(drain(&mut chans[0]).is_empty());
        assert_eq!(drain(&mut chans[1]), [0x1234, 0x5678]);
    }

    #[test]
    fn escaped_pair_collapses_to_one_literal() {
        let link = wire(&[0xC001, 0xAB00, 0xC001, 0xC001]);
        let mut demux = Demultiplexer::new(link);
        let mut chans = queues(2, 8);

        let routed = demux.pump(&mut chans).unwrap();

        assert_eq!(routed, 1);
        assert_eq!(drain(&mut chans[0]), [0xC001]);
        assert_eq!(demux.active_channel(), Some(0), "escape must not switch channels");
    }

    #[test]
    fn decodes_worked_example() {
        // channel 0: [0x1111, 0xC001, 0x2222], channel 1: [0x3333]
        let link = wire(&[
            0xC001, 0xAB00, 0x1111, 0xC001, 0xC001, 0x2222, 0xC001, 0xAB01, 0x3333,
        ]);
        let mut demux = Demultiplexer::new(link);
        let mut chans = queues(2, 8);

        let routed = demux.pump(&mut chans).unwrap();

        assert_eq!(routed, 4);
        assert_eq!(drain(&mut chans[0]), [0x1111, 0xC001, 0x2222]);
        assert_eq!(drain(&mut chans[1]), [0x3333]);
    }

    #[test]
    fn lone_control_at_end_of_input_suspends() {
        let link = wire(&[0xC001, 0xAB00, 0x0042, 0xC001]);
        let mut demux = Demultiplexer::new(link);
        let mut chans = queues(2, 8);

        let routed = demux.pump(&mut chans).unwrap();
        assert_eq!(routed, 1);
        assert!(demux.is_mid_frame(), "must wait for the control word's successor");

        // More input arrives: the pair turns out to be an escaped literal.
        demux.get_mut().push_back(0xC001);
        let routed = demux.pump(&mut chans).unwrap();
        assert_eq!(routed, 1);
        assert!(!demux.is_mid_frame());
        assert_eq!(drain(&mut chans[0]), [0x0042, 0xC001]);
    }

    #[test]
    fn bad_select_tag_is_a_framing_error() {
        let link = wire(&[0xC001, 0xCD01]);
        let mut demux = Demultiplexer::new(link);
        let mut chans = queues(2, 8);

        let err = demux.pump(&mut chans).unwrap_err();
        assert!(matches!(err, FrameError::InvalidSelectTag { word: 0xCD01 }));
    }

    #[test]
    fn out_of_range_channel_is_a_framing_error() {
        let link = wire(&[0xC001, 0xAB07]);
        let mut demux = Demultiplexer::new(link);
        let mut chans = queues(2, 8);

        let err = demux.pump(&mut chans).unwrap_err();
        assert!(matches!(
            err,
            FrameError::ChannelOutOfRange {
                channel: 7,
                channel_count: 2
            }
        ));
    }

    #[test]
    fn payload_before_any_select_frame_is_rejected() {
        let link = wire(&[0x1234]);
        let mut demux = Demultiplexer::new(link);
        let mut chans = queues(2, 8);

        let err = demux.pump(&mut chans).unwrap_err();
        assert!(matches!(err, FrameError::NoActiveChannel { word: 0x1234 }));
    }

    #[test]
    fn backpressure_stalls_without_loss_or_reorder() {
        let link = wire(&[0xC001, 0xAB00, 0x0001, 0x0002, 0x0003]);
        let mut demux = Demultiplexer::new(link);
        let mut chans = queues(2, 1); // room for one word only

        let routed = demux.pump(&mut chans).unwrap();
        assert_eq!(routed, 1);
        // The engine must not run ahead of the stalled destination.
        assert!(demux.get_ref().len() >= 1, "link input beyond the held word must stay unconsumed");

        // Consumer drains one word; the engine resumes in order.
        assert_eq!(chans[0].try_pop(), Some(0x0001));
        let routed = demux.pump(&mut chans).unwrap();
        assert_eq!(routed, 1);
        assert_eq!(chans[0].try_pop(), Some(0x0002));

        assert_eq!(demux.pump(&mut chans).unwrap(), 1);
        assert_eq!(chans[0].try_pop(), Some(0x0003));
        assert_eq!(demux.pump(&mut chans).unwrap(), 0);
    }

    #[test]
    fn stall_limit_surfaces_queue_overflow_and_recovers() {
        let config = MuxConfig {
            stall_limit: Some(3),
            ..MuxConfig::default()
        };
        let link = wire(&[0xC001, 0xAB01, 0x0042]);
        let mut demux = Demultiplexer::with_config(link, config).unwrap();
        let mut chans = queues(2, 0); // channel queues never accept

        // Two stalled pumps are plain backpressure.
        assert_eq!(demux.pump(&mut chans).unwrap(), 0);
        assert_eq!(demux.pump(&mut chans).unwrap(), 0);

        // The third consecutive rejection trips the limit.
        let err = demux.pump(&mut chans).unwrap_err();
        assert!(matches!(
            err,
            FrameError::QueueOverflow {
                channel: 1,
                attempts: 3
            }
        ));

        // Recoverable: once the consumer frees up, the held word lands.
        let mut chans = queues(2, 4);
        assert_eq!(demux.pump(&mut chans).unwrap(), 1);
        assert_eq!(chans[1].try_pop(), Some(0x0042));
    }

    #[test]
    fn reset_discards_in_flight_control_state() {
        let link = wire(&[0xC001]);
        let mut demux = Demultiplexer::new(link);
        let mut chans = queues(2, 8);

        demux.pump(&mut chans).unwrap();
        assert!(demux.is_mid_frame());

        demux.reset();
        assert!(!demux.is_mid_frame());
        assert_eq!(demux.active_channel(), None);

        // After a reset the session starts over: a select frame is
        // required before any payload.
        demux.get_mut().extend([0xC001, 0xAB00, 0x0001]);
        assert_eq!(demux.pump(&mut chans).unwrap(), 1);
        assert_eq!(chans[0].try_pop(), Some(0x0001));
    }

    #[test]
    fn queue_slice_must_match_channel_count() {
        let mut demux = Demultiplexer::new(wire(&[]));
        let mut chans = queues(3, 8);
        let err = demux.pump(&mut chans).unwrap_err();
        assert!(matches!(err, FrameError::InvalidConfig { .. }));
    }
}
