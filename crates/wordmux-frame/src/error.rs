use wordmux_link::Word;

use crate::channel::ChannelId;

/// Errors that can occur while multiplexing or demultiplexing the link.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A channel-select frame's second word carries a high byte other
    /// than the select tag. Fatal for the session; the raw word is kept
    /// for diagnosis.
    #[error("invalid select word 0x{word:04x} (expected tag 0xab in the high byte)")]
    InvalidSelectTag { word: Word },

    /// A channel-select frame names a channel outside the configured range.
    #[error("channel {channel} out of range (channel_count {channel_count})")]
    ChannelOutOfRange {
        channel: ChannelId,
        channel_count: usize,
    },

    /// A payload word arrived before any channel-select frame, so there
    /// is no destination to route it to.
    #[error("payload word 0x{word:04x} received before any channel-select frame")]
    NoActiveChannel { word: Word },

    /// A payload word does not fit in the configured word width.
    #[error("word 0x{word:x} exceeds the configured width of {width} bits")]
    WordOutOfRange { word: Word, width: u32 },

    /// A channel queue kept rejecting pushes past the configured stall
    /// limit. Recoverable: the engine holds the word and retries on the
    /// next pump.
    #[error("channel {channel} queue rejected {attempts} consecutive pushes")]
    QueueOverflow { channel: ChannelId, attempts: usize },

    /// The configuration is inconsistent.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: &'static str },
}

pub type Result<T> = std::result::Result<T, FrameError>;
