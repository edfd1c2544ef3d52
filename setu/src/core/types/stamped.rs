//! Frame-stamped wrappers.

use serde::{Deserialize, Serialize};

use super::pose::Pose3D;

/// Data tagged with a reference frame and a capture time.
///
/// Timestamps are in microseconds since epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stamped<T> {
    /// Name of the reference frame the data is expressed in
    pub frame_id: String,
    /// Timestamp in microseconds since epoch
    pub timestamp_us: u64,
    /// The wrapped data
    pub data: T,
}

impl<T> Stamped<T> {
    /// Create a new stamped value.
    #[inline]
    pub fn new(frame_id: impl Into<String>, timestamp_us: u64, data: T) -> Self {
        Self {
            frame_id: frame_id.into(),
            timestamp_us,
            data,
        }
    }

    /// Map the inner data while preserving frame and timestamp.
    #[inline]
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Stamped<U> {
        Stamped {
            frame_id: self.frame_id,
            timestamp_us: self.timestamp_us,
            data: f(self.data),
        }
    }
}

/// Pose stamped with the frame it is expressed in.
pub type PoseStamped = Stamped<Pose3D>;

/// Transform between two named frames, ready for broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformStamped {
    /// Parent frame (e.g. "map")
    pub parent_frame: String,
    /// Child frame (e.g. "odom" or "base_link")
    pub child_frame: String,
    /// Timestamp in microseconds since epoch
    pub timestamp_us: u64,
    /// Pose of the child frame expressed in the parent frame
    pub transform: Pose3D,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamped_map() {
        let s = Stamped::new("map", 1000, 21i32);
        let doubled = s.map(|x| x * 2);

        assert_eq!(doubled.data, 42);
        assert_eq!(doubled.frame_id, "map");
        assert_eq!(doubled.timestamp_us, 1000);
    }
}
