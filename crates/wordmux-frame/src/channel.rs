//! Channel identifiers.
//!
//! The select word carries the channel id in its low byte, so a link can
//! multiplex at most 256 logical channels. How many are actually valid is
//! a session parameter (`MuxConfig::channel_count`).

/// Identifies one logical channel on the shared link.
pub type ChannelId = u8;

/// Upper bound on channels per link, fixed by the select-word encoding.
pub const MAX_CHANNELS: usize = 256;

/// Returns true if `channel` is valid for a link with `channel_count`
/// channels.
pub fn in_range(channel: ChannelId, channel_count: usize) -> bool {
    (channel as usize) < channel_count
}
