//! Control-word framing with channel multiplexing over a shared word link.
//!
//! This is the core value-add layer of wordmux. N independent logical
//! channels share one word-oriented link:
//! - A reserved control word (`0xC001`) introduces a two-word
//!   channel-select frame (`0xAB00 | channel`)
//! - A literal payload word equal to the control word is escaped by
//!   doubling it on the wire
//! - Both directions are gated by non-blocking try-push/try-pop flow
//!   control, so the shared link runs no faster than the slowest
//!   currently-active endpoint
//!
//! [`Multiplexer`] is the egress engine (channel queues onto the link),
//! [`Demultiplexer`] the ingress engine (link into channel queues). They
//! share nothing but the codec constants and may run on separate threads.

pub mod channel;
pub mod codec;
pub mod demux;
pub mod error;
pub mod mux;

pub use channel::{ChannelId, MAX_CHANNELS};
pub use codec::{
    encode_payload, encode_select, is_control, parse_select, select_word, word_mask, MuxConfig,
    CONTROL_WORD, SELECT_TAG,
};
pub use demux::Demultiplexer;
pub use error::{FrameError, Result};
pub use mux::Multiplexer;
