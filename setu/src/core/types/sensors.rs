//! Sensor sample types consumed by the bridge.

use serde::{Deserialize, Serialize};

use super::pose::Pose3D;

/// A single camera image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFrame {
    /// Capture timestamp in microseconds since epoch
    pub timestamp_us: u64,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Pixel encoding (e.g. "mono8", "rgb8")
    pub encoding: String,
    /// Raw pixel payload, row-major
    pub data: Vec<u8>,
}

impl ImageFrame {
    /// Create an image with the given pixel payload.
    pub fn new(timestamp_us: u64, width: u32, height: u32, encoding: &str, data: Vec<u8>) -> Self {
        Self {
            timestamp_us,
            width,
            height,
            encoding: encoding.to_string(),
            data,
        }
    }

    /// Empty mono8 image, useful when only timing matters.
    pub fn header_only(timestamp_us: u64) -> Self {
        Self::new(timestamp_us, 0, 0, "mono8", Vec::new())
    }
}

/// A time-synchronized stereo pair.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoFrame {
    /// Left camera image
    pub left: ImageFrame,
    /// Right camera image
    pub right: ImageFrame,
}

impl StereoFrame {
    /// Pair two images if their capture times differ by less than `max_interval_us`.
    pub fn new(left: ImageFrame, right: ImageFrame, max_interval_us: u64) -> Option<Self> {
        let frame = Self { left, right };
        (frame.interval_us() < max_interval_us).then_some(frame)
    }

    /// Absolute capture time difference between the two images.
    #[inline]
    pub fn interval_us(&self) -> u64 {
        self.left.timestamp_us.abs_diff(self.right.timestamp_us)
    }

    /// Frame timestamp (taken from the left image).
    #[inline]
    pub fn timestamp_us(&self) -> u64 {
        self.left.timestamp_us
    }
}

/// Raw IMU sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuSample {
    /// Timestamp in microseconds since epoch
    pub timestamp_us: u64,
    /// Linear acceleration in m/s² (x, y, z)
    pub linear_acceleration: [f64; 3],
    /// Angular velocity in rad/s (x, y, z)
    pub angular_velocity: [f64; 3],
}

/// External odometry sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdometrySample {
    /// Timestamp in microseconds since epoch
    pub timestamp_us: u64,
    /// Pose of the robot in the odometry frame
    pub pose: Pose3D,
    /// 6x6 pose covariance (x, y, z, roll, pitch, yaw)
    pub covariance: [[f64; 6]; 6],
}

impl OdometrySample {
    /// Create a sample with zero covariance.
    pub fn new(timestamp_us: u64, pose: Pose3D) -> Self {
        Self {
            timestamp_us,
            pose,
            covariance: [[0.0; 6]; 6],
        }
    }
}

/// Outcome of one tracking call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackingResult {
    /// Whether the engine estimated a pose for this frame
    pub tracked: bool,
    /// Camera pose in the SLAM map frame (meaningless when not tracked)
    pub pose: Pose3D,
    /// Timestamp of the frame that produced this result
    pub timestamp_us: u64,
}

impl TrackingResult {
    /// Successful tracking result.
    pub fn tracked(pose: Pose3D, timestamp_us: u64) -> Self {
        Self {
            tracked: true,
            pose,
            timestamp_us,
        }
    }

    /// Tracking failed or the engine is still initializing.
    pub fn lost(timestamp_us: u64) -> Self {
        Self {
            tracked: false,
            pose: Pose3D::identity(),
            timestamp_us,
        }
    }
}
