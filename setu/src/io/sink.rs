//! Outbound message sinks.
//!
//! Publishers, the transform publisher and the query thread hand finished
//! messages to an [`OutputSink`]. Implementations must not block the caller.

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::io::streaming::Message;

/// Destination for outbound bus messages.
pub trait OutputSink: Send + Sync {
    fn publish(&self, message: Message);
}

/// Sink that forwards into an in-process channel.
///
/// Used by tests and by embedders that consume messages directly.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<Message>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<Message>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }
}

impl OutputSink for ChannelSink {
    fn publish(&self, message: Message) {
        // Receiver gone means nobody is listening
        let _ = self.tx.send(message);
    }
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn publish(&self, _message: Message) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Pose3D, Stamped};
    use crate::io::streaming::Payload;

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.publish(Message::new(
            "tf",
            1,
            Payload::Pose(Stamped::new("map", 1, Pose3D::identity())),
        ));
    }
}
