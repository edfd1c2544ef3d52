//! I/O infrastructure: outbound sinks and TCP streaming.

mod sink;
pub mod streaming;

pub use sink::{ChannelSink, NullSink, OutputSink};
