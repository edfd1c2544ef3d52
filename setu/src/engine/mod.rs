//! Tracking engine contract.
//!
//! The bridge never does feature extraction or optimisation itself. It drives
//! an engine through [`TrackingEngine`] and reads map state back out.
//!
//! # Threading
//!
//! - `track_stereo` is only ever called from the tracking lane, one call at a
//!   time. Implementations may assume it is not reentrant.
//! - `handle_imu` / `handle_odometry` arrive from ingest threads concurrently
//!   with `track_stereo` and must return promptly.
//! - Map accessors are called from publisher and query threads while a
//!   tracking call may be in flight; they must return a consistent snapshot.

mod mock;

pub use mock::{MockEngine, MockEngineConfig, MockOutcome};

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::core::types::{
    ImuSample, Landmark, MapQuery, MapSnapshot, OdometrySample, PointCloud, Pose3D, StereoFrame,
    TrackingResult,
};
use crate::error::{Error, Result};

/// A visual-inertial SLAM engine.
pub trait TrackingEngine: Send + Sync {
    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    /// Track one synchronized stereo pair.
    ///
    /// A result with `tracked == false` is a normal outcome (initialising or
    /// lost), not an error.
    fn track_stereo(&self, frame: &StereoFrame) -> TrackingResult;

    /// Buffer one IMU sample for the next tracking call.
    fn handle_imu(&self, sample: ImuSample);

    /// Feed one odometry sample.
    fn handle_odometry(&self, _sample: &OdometrySample) {}

    /// Map points currently held by the active map. May be empty.
    fn current_map_points(&self) -> PointCloud;

    /// Keyframe (and optionally landmark) snapshot of the map graph.
    fn map_snapshot(&self, query: &MapQuery) -> MapSnapshot;

    /// Landmarks visible from `pose`, nearest first.
    ///
    /// At most `max_count` landmarks within `max_distance` meters whose bearing
    /// differs from the camera forward axis by at most `max_angle` radians.
    fn landmarks_visible_from(
        &self,
        pose: &Pose3D,
        max_count: usize,
        max_distance: f64,
        max_angle: f64,
    ) -> Vec<Landmark>;
}

/// Create a tracking engine based on configuration
pub fn create_engine(config: &EngineConfig) -> Result<Arc<dyn TrackingEngine>> {
    match config.engine_type.as_str() {
        "mock" => {
            let engine = MockEngine::new(config.mock.clone());
            log::info!(
                "Mock engine created ({} landmarks, seed {})",
                engine.landmark_count(),
                config.mock.seed
            );
            Ok(Arc::new(engine))
        }
        other => Err(Error::Config(format!("Unknown engine type: {}", other))),
    }
}
