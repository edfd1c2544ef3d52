//! TCP streaming for Setu
//!
//! | Endpoint | Direction | Frames |
//! |----------|-----------|--------|
//! | [`SensorServer`] | inbound | `Message` (images, IMU, odometry) |
//! | [`StreamPublisher`] | outbound | `Message` (map data, clouds, poses, tf) |
//! | [`ServiceServer`] | request/response | `QueryRequest` → `ServiceReply` |

mod listener;
pub mod messages;
pub mod tcp_publisher;
pub mod tcp_receiver;
pub mod tcp_service;
pub mod wire;

pub use messages::{Message, Payload, ServiceReply};
pub use tcp_publisher::StreamPublisher;
pub use tcp_receiver::SensorServer;
pub use tcp_service::ServiceServer;
pub use wire::{DEFAULT_MAX_FRAME_BYTES, Serializer, WireFormat};
