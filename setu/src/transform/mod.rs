//! Map frame transform broadcast.
//!
//! Two modes, fixed at startup:
//!
//! | Mode | Trigger | Transform | Frames |
//! |------|---------|-----------|--------|
//! | Direct (`no_odometry_mode = true`) | each tracked frame | `P ∘ T(x0, y0)` | global → robot base |
//! | Composed (`no_odometry_mode = false`) | each odometry sample | `P ∘ T(x0, y0) ∘ odom⁻¹` | global → odom |
//!
//! `P` is the latest tracked camera pose and `T(x0, y0)` the fixed robot
//! offset. Nothing is broadcast before the first successful track, and
//! nothing at all when `publish_tf = false`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::config::SetuConfig;
use crate::core::types::{OdometrySample, Pose3D, TransformStamped};
use crate::io::OutputSink;
use crate::io::streaming::{Message, Payload};
use crate::state::{TrackedPose, TrackingState};

/// Which transform is broadcast, and on which trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformMode {
    Direct,
    Composed,
}

impl TransformMode {
    pub fn from_no_odometry_mode(no_odometry_mode: bool) -> Self {
        if no_odometry_mode {
            TransformMode::Direct
        } else {
            TransformMode::Composed
        }
    }
}

/// Transform publisher configuration
#[derive(Debug, Clone)]
pub struct TransformPublisherConfig {
    pub mode: TransformMode,
    pub publish_tf: bool,
    pub global_frame: String,
    pub robot_base_frame: String,
    pub odom_frame: String,
    pub robot_x: f64,
    pub robot_y: f64,
    /// Outbound topic
    pub topic: String,
}

impl TransformPublisherConfig {
    pub fn from_config(config: &SetuConfig) -> Self {
        Self {
            mode: TransformMode::from_no_odometry_mode(config.transform.no_odometry_mode),
            publish_tf: config.transform.publish_tf,
            global_frame: config.frames.global_frame.clone(),
            robot_base_frame: config.frames.robot_base_frame.clone(),
            odom_frame: config.frames.odom_frame.clone(),
            robot_x: config.robot.robot_x,
            robot_y: config.robot.robot_y,
            topic: config.topics.tf.clone(),
        }
    }
}

impl Default for TransformPublisherConfig {
    fn default() -> Self {
        Self::from_config(&SetuConfig::default())
    }
}

/// Fixed planar offset of the robot relative to the SLAM map origin.
#[inline]
pub fn robot_offset(robot_x: f64, robot_y: f64) -> Pose3D {
    Pose3D::from_translation(robot_x, robot_y, 0.0)
}

/// Map → robot base: `slam_pose ∘ T(robot_x, robot_y, 0)`.
pub fn direct_map_to_robot(slam_pose: &Pose3D, robot_x: f64, robot_y: f64) -> Pose3D {
    slam_pose.compose(&robot_offset(robot_x, robot_y))
}

/// Map → odom: `(slam_pose ∘ T(robot_x, robot_y, 0)) ∘ odom_pose⁻¹`.
pub fn composed_map_to_odom(
    slam_pose: &Pose3D,
    robot_x: f64,
    robot_y: f64,
    odom_pose: &Pose3D,
) -> Pose3D {
    direct_map_to_robot(slam_pose, robot_x, robot_y).compose(&odom_pose.inverse())
}

/// Recomputes and broadcasts the map frame transform.
pub struct TransformPublisher {
    config: TransformPublisherConfig,
    sink: Arc<dyn OutputSink>,
    latest: Mutex<Option<TransformStamped>>,
    broadcasts: AtomicU64,
}

impl TransformPublisher {
    pub fn new(config: TransformPublisherConfig, sink: Arc<dyn OutputSink>) -> Self {
        log::info!(
            "Transform publisher: {:?} mode, {} -> {}{}",
            config.mode,
            config.global_frame,
            match config.mode {
                TransformMode::Direct => &config.robot_base_frame,
                TransformMode::Composed => &config.odom_frame,
            },
            if config.publish_tf { "" } else { " (disabled)" }
        );
        Self {
            config,
            sink,
            latest: Mutex::new(None),
            broadcasts: AtomicU64::new(0),
        }
    }

    pub fn mode(&self) -> TransformMode {
        self.config.mode
    }

    /// Odometry is consumed only in composed mode with broadcast enabled.
    pub fn accepts_odometry(&self) -> bool {
        self.config.publish_tf && self.config.mode == TransformMode::Composed
    }

    /// Handle a successful tracking result. Broadcasts in direct mode only.
    pub fn on_tracking_success(&self, tracked: &TrackedPose) -> Option<TransformStamped> {
        if !self.config.publish_tf || self.config.mode != TransformMode::Direct {
            return None;
        }

        let transform =
            direct_map_to_robot(&tracked.pose, self.config.robot_x, self.config.robot_y);
        Some(self.broadcast(
            self.config.robot_base_frame.clone(),
            tracked.timestamp_us,
            transform,
        ))
    }

    /// Handle one odometry sample. Broadcasts in composed mode once a pose
    /// has been tracked.
    pub fn on_odometry(
        &self,
        sample: &OdometrySample,
        state: &TrackingState,
    ) -> Option<TransformStamped> {
        if !self.accepts_odometry() {
            return None;
        }
        if !state.is_tracked() {
            log::trace!("Odometry before first track, no transform");
            return None;
        }
        let slam_pose = state.latest_pose()?;

        let transform = composed_map_to_odom(
            &slam_pose,
            self.config.robot_x,
            self.config.robot_y,
            &sample.pose,
        );
        Some(self.broadcast(self.config.odom_frame.clone(), sample.timestamp_us, transform))
    }

    /// Most recently broadcast transform.
    pub fn latest(&self) -> Option<TransformStamped> {
        self.latest.lock().clone()
    }

    pub fn broadcast_count(&self) -> u64 {
        self.broadcasts.load(Ordering::Relaxed)
    }

    fn broadcast(
        &self,
        child_frame: String,
        timestamp_us: u64,
        transform: Pose3D,
    ) -> TransformStamped {
        let stamped = TransformStamped {
            parent_frame: self.config.global_frame.clone(),
            child_frame,
            timestamp_us,
            transform,
        };
        *self.latest.lock() = Some(stamped.clone());
        self.broadcasts.fetch_add(1, Ordering::Relaxed);

        self.sink.publish(Message::new(
            self.config.topic.clone(),
            timestamp_us,
            Payload::Transform(stamped.clone()),
        ));
        stamped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{ChannelSink, NullSink};
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn config(mode: TransformMode) -> TransformPublisherConfig {
        TransformPublisherConfig {
            mode,
            robot_x: 1.0,
            robot_y: 0.5,
            ..Default::default()
        }
    }

    #[test]
    fn test_direct_offset_rotates_with_pose() {
        // Camera facing +Y at (2, 0): the x offset lands along +Y
        let slam = Pose3D::from_xyz_rpy(2.0, 0.0, 0.0, 0.0, 0.0, FRAC_PI_2);
        let t = direct_map_to_robot(&slam, 1.0, 0.0);
        assert_relative_eq!(t.translation().x, 2.0, epsilon = 1e-12);
        assert_relative_eq!(t.translation().y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_composed_cancels_odometry() {
        let slam = Pose3D::from_xyz_rpy(3.0, -1.0, 0.2, 0.0, 0.1, 0.7);
        let odom = Pose3D::from_xyz_rpy(0.4, 0.3, 0.0, 0.0, 0.0, -0.2);
        let map_to_odom = composed_map_to_odom(&slam, 1.0, 1.0, &odom);

        // map→odom ∘ odom→base recovers map→base
        let recovered = map_to_odom.compose(&odom);
        let direct = direct_map_to_robot(&slam, 1.0, 1.0);
        assert_relative_eq!(
            (recovered.translation() - direct.translation()).norm(),
            0.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(recovered.rotation().angle_to(&direct.rotation()), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_direct_mode_broadcasts_on_track() {
        let (sink, rx) = ChannelSink::new();
        let publisher = TransformPublisher::new(config(TransformMode::Direct), Arc::new(sink));
        let tracked = TrackedPose {
            pose: Pose3D::from_translation(1.0, 2.0, 0.0),
            timestamp_us: 77,
            sequence: 1,
        };

        let t = publisher.on_tracking_success(&tracked).unwrap();
        assert_eq!(t.parent_frame, "map");
        assert_eq!(t.child_frame, "base_link");
        assert_eq!(t.timestamp_us, 77);
        assert_relative_eq!(t.transform.translation().x, 2.0);
        assert_relative_eq!(t.transform.translation().y, 2.5);

        let msg = rx.try_recv().unwrap();
        assert_eq!(msg.topic, "tf");
        assert_eq!(msg.payload, Payload::Transform(t));
    }

    #[test]
    fn test_direct_mode_ignores_odometry() {
        let publisher = TransformPublisher::new(config(TransformMode::Direct), Arc::new(NullSink));
        let state = TrackingState::default();
        state.record_success(Pose3D::identity(), 1);

        assert!(!publisher.accepts_odometry());
        assert!(
            publisher
                .on_odometry(&OdometrySample::new(2, Pose3D::identity()), &state)
                .is_none()
        );
    }

    #[test]
    fn test_composed_mode_needs_tracked_pose() {
        let (sink, rx) = ChannelSink::new();
        let publisher = TransformPublisher::new(config(TransformMode::Composed), Arc::new(sink));
        let state = TrackingState::default();
        let odom = OdometrySample::new(5, Pose3D::from_translation(0.5, 0.0, 0.0));

        assert!(publisher.on_odometry(&odom, &state).is_none());
        assert!(rx.try_recv().is_err());

        let tracked = state.record_success(Pose3D::identity(), 4);
        // Tracking alone does not broadcast in composed mode
        assert!(publisher.on_tracking_success(&tracked).is_none());

        let t = publisher.on_odometry(&odom, &state).unwrap();
        assert_eq!(t.child_frame, "odom");
        assert_eq!(t.timestamp_us, 5);
        assert_relative_eq!(t.transform.translation().x, 0.5);
        assert_relative_eq!(t.transform.translation().y, 0.5);
        assert_eq!(publisher.broadcast_count(), 1);
    }

    #[test]
    fn test_publish_tf_disabled() {
        let cfg = TransformPublisherConfig {
            publish_tf: false,
            ..config(TransformMode::Direct)
        };
        let publisher = TransformPublisher::new(cfg, Arc::new(NullSink));
        let tracked = TrackedPose {
            pose: Pose3D::identity(),
            timestamp_us: 1,
            sequence: 1,
        };
        assert!(publisher.on_tracking_success(&tracked).is_none());
        assert!(publisher.latest().is_none());
    }
}
