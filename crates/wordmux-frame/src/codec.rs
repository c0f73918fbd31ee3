use wordmux_link::Word;

use crate::channel::{self, ChannelId, MAX_CHANNELS};
use crate::error::{FrameError, Result};

/// Reserved word introducing a control sequence on the link.
pub const CONTROL_WORD: Word = 0xC001;

/// High byte of the second word of a channel-select frame. Distinguishes
/// a select word from an escaped literal control word, whose second word
/// is `CONTROL_WORD` again.
pub const SELECT_TAG: u8 = 0xAB;

/// Minimum word width: the control word itself needs 16 bits.
pub const MIN_WORD_WIDTH: u32 = 16;

/// Maximum word width supported by the `u32` word storage.
pub const MAX_WORD_WIDTH: u32 = 32;

/// Returns true if `word` is the reserved control word.
pub fn is_control(word: Word) -> bool {
    word == CONTROL_WORD
}

/// The second word of a channel-select frame: `0xAB00 | channel`.
pub fn select_word(channel: ChannelId) -> Word {
    ((SELECT_TAG as Word) << 8) | channel as Word
}

/// Encode a switch to `channel` as the two-word channel-select frame.
pub fn encode_select(channel: ChannelId) -> [Word; 2] {
    [CONTROL_WORD, select_word(channel)]
}

/// Encode one payload word, doubling the control word so it can never be
/// mistaken for a frame start.
pub fn encode_payload(word: Word, dst: &mut Vec<Word>) {
    if is_control(word) {
        dst.push(CONTROL_WORD);
    }
    dst.push(word);
}

/// Parse the second word of a channel-select frame.
///
/// The caller has already seen a lone control word and ruled out the
/// escaped-literal case (`word` is not the control word). Violations
/// carry the raw word for diagnosis.
pub fn parse_select(word: Word, channel_count: usize) -> Result<ChannelId> {
    if word >> 8 != SELECT_TAG as Word {
        return Err(FrameError::InvalidSelectTag { word });
    }
    let channel = (word & 0xFF) as ChannelId;
    if !channel::in_range(channel, channel_count) {
        return Err(FrameError::ChannelOutOfRange {
            channel,
            channel_count,
        });
    }
    Ok(channel)
}

/// Bit mask of the usable word range for a given width.
pub fn word_mask(width: u32) -> Word {
    if width >= MAX_WORD_WIDTH {
        Word::MAX
    } else {
        (1 << width) - 1
    }
}

/// Session parameters shared by both engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuxConfig {
    /// Word width on the link, in bits. 16 to 32.
    pub word_width: u32,
    /// Number of logical channels multiplexed on the link.
    pub channel_count: usize,
    /// Egress: words drained from one channel before the scheduler
    /// considers rotating to the next. Fairness tunable, not a
    /// correctness requirement.
    pub batch_size: usize,
    /// Ingress: consecutive rejected pushes of one held word before
    /// `FrameError::QueueOverflow` is surfaced. `None` stalls forever.
    pub stall_limit: Option<usize>,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            word_width: 16,
            channel_count: 2,
            batch_size: 32,
            stall_limit: None,
        }
    }
}

impl MuxConfig {
    /// Check the configuration for internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.word_width < MIN_WORD_WIDTH || self.word_width > MAX_WORD_WIDTH {
            return Err(FrameError::InvalidConfig {
                reason: "word_width must be between 16 and 32 bits",
            });
        }
        if self.channel_count == 0 || self.channel_count > MAX_CHANNELS {
            return Err(FrameError::InvalidConfig {
                reason: "channel_count must be between 1 and 256",
            });
        }
        if self.batch_size == 0 {
            return Err(FrameError::InvalidConfig {
                reason: "batch_size must be at least 1",
            });
        }
        if let Some(0) = self.stall_limit {
            return Err(FrameError::InvalidConfig {
                reason: "stall_limit must be at least 1 when set",
            });
        }
        Ok(())
    }

    /// Bit mask of the usable word range.
    pub fn word_mask(&self) -> Word {
        word_mask(self.word_width)
    }
}
