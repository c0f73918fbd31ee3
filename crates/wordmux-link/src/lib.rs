//! Word-oriented flow-controlled queues and link adapter traits.
//!
//! This is the lowest layer of wordmux. It models what remains of a
//! dual-clock first-word-fall-through FIFO once the clocking is stripped
//! away: a bounded queue with independent, non-blocking producer and
//! consumer readiness and an explicit reset. The protocol engines in
//! `wordmux-frame` talk to the shared link and to the per-channel queues
//! exclusively through the [`WordSink`] and [`WordSource`] contracts
//! defined here.

pub mod queue;
pub mod traits;

pub use queue::{word_channel, WordQueue, WordReceiver, WordSender};
pub use traits::{Word, WordSink, WordSource};
