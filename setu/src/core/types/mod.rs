//! Core data types shared by every layer of the bridge.

mod map;
mod pose;
mod sensors;
mod stamped;

pub use map::{KeyFrameData, Landmark, MapQuery, MapSnapshot, PointCloud};
pub use pose::{Point3D, Pose3D};
pub use sensors::{ImageFrame, ImuSample, OdometrySample, StereoFrame, TrackingResult};
pub use stamped::{PoseStamped, Stamped, TransformStamped};
