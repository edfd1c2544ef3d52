//! Map content types: keyframes, landmarks and point clouds.

use serde::{Deserialize, Serialize};

use super::pose::{Point3D, Pose3D};

/// A keyframe stored in the SLAM map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyFrameData {
    /// Unique keyframe id
    pub id: u64,
    /// Capture timestamp in microseconds since epoch
    pub timestamp_us: u64,
    /// Camera pose in the SLAM map frame
    pub pose: Pose3D,
    /// Id of the map this keyframe belongs to
    pub map_id: u32,
    /// Ids of landmarks observed by this keyframe
    pub observed_landmarks: Vec<u64>,
}

/// A triangulated 3D map point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Unique landmark id
    pub id: u64,
    /// Position in the SLAM map frame
    pub position: Point3D,
}

/// Snapshot of the map graph produced on request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapSnapshot {
    /// Keyframes included by the query
    pub keyframes: Vec<KeyFrameData>,
    /// Landmarks included by the query (empty unless requested)
    pub landmarks: Vec<Landmark>,
}

impl MapSnapshot {
    /// Number of keyframes in the snapshot.
    pub fn keyframe_count(&self) -> usize {
        self.keyframes.len()
    }
}

/// Selection flags for a map snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapQuery {
    /// Only include keyframes from the currently active map
    pub active_map_only: bool,
    /// Include landmark positions
    pub include_landmarks: bool,
    /// Restrict landmarks to those observed by this keyframe
    pub keyframe_id: Option<u64>,
}

impl MapQuery {
    /// Query used by the periodic map-data publisher.
    pub fn periodic() -> Self {
        Self {
            active_map_only: true,
            include_landmarks: false,
            keyframe_id: None,
        }
    }
}

/// A set of 3D points expressed in one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointCloud {
    /// Frame the points are expressed in
    pub frame_id: String,
    /// Timestamp in microseconds since epoch
    pub timestamp_us: u64,
    /// Point positions
    pub points: Vec<Point3D>,
}

impl PointCloud {
    pub fn new(frame_id: impl Into<String>, timestamp_us: u64, points: Vec<Point3D>) -> Self {
        Self {
            frame_id: frame_id.into(),
            timestamp_us,
            points,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }
}
