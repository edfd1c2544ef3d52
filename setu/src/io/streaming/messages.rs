//! Bus message types.
//!
//! Every frame on the sensor and publish streams is one [`Message`]: a topic
//! name plus a typed payload. The service endpoint exchanges
//! [`QueryRequest`](crate::state::QueryRequest) / [`ServiceReply`] frames.

use serde::{Deserialize, Serialize};

use crate::core::types::{
    ImageFrame, ImuSample, MapSnapshot, OdometrySample, PointCloud, PoseStamped, TransformStamped,
};
use crate::state::QueryResponse;

/// A topic-routed bus message.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
    /// Topic name (e.g. "left/image_raw", "map_data")
    pub topic: String,
    /// Timestamp in microseconds since epoch
    pub timestamp_us: u64,
    pub payload: Payload,
}

impl Message {
    pub fn new(topic: impl Into<String>, timestamp_us: u64, payload: Payload) -> Self {
        Self {
            topic: topic.into(),
            timestamp_us,
            payload,
        }
    }
}

/// Message payloads.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Payload {
    // Inbound
    Image(ImageFrame),
    Imu(ImuSample),
    Odometry(OdometrySample),

    // Outbound
    MapData(MapSnapshot),
    PointCloud(PointCloud),
    Pose(PoseStamped),
    Transform(TransformStamped),
}

impl Payload {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Image(_) => "image",
            Payload::Imu(_) => "imu",
            Payload::Odometry(_) => "odometry",
            Payload::MapData(_) => "map_data",
            Payload::PointCloud(_) => "point_cloud",
            Payload::Pose(_) => "pose",
            Payload::Transform(_) => "transform",
        }
    }
}

/// Service endpoint reply.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ServiceReply {
    Ok(QueryResponse),
    Err(String),
}
