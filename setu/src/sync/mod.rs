//! Sensor stream synchronization.

mod stereo;

pub use stereo::{StereoSide, StereoSynchronizer, SyncConfig, SyncStats};
