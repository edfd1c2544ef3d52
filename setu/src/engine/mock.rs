//! Deterministic mock tracking engine.
//!
//! Stands in for a native visual-inertial SLAM library so the daemon and its
//! tests can run end to end. The camera follows a constant-velocity
//! trajectory through a random landmark field:
//!
//! ```text
//! frame:    0 .. init_frames-1 | init_frames ..
//! result:   lost (initialising)| tracked, pose_k = k * (velocity, yaw_rate)
//! keyframe:                    | every keyframe_interval-th tracked frame
//! ```
//!
//! Scripted outcomes override the trajectory one frame at a time, which is
//! how tests drive exact pose sequences.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::TrackingEngine;
use crate::core::types::{
    ImuSample, KeyFrameData, Landmark, MapQuery, MapSnapshot, OdometrySample, Point3D, PointCloud,
    Pose3D, StereoFrame, TrackingResult,
};

/// Limits used when attaching observations to a new keyframe.
const KEYFRAME_OBSERVATION_RANGE: f64 = 5.0;
const KEYFRAME_OBSERVATION_ANGLE: f64 = 1.0;
const KEYFRAME_MAX_OBSERVATIONS: usize = 500;

/// Most recent tracking-call timestamps kept for inspection.
const CALL_LOG_CAPACITY: usize = 4096;

/// Mock engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MockEngineConfig {
    /// Frames reported as lost before tracking starts
    pub init_frames: u64,
    /// Camera motion per tracked frame in meters (x, y, z)
    pub velocity: [f64; 3],
    /// Camera yaw change per tracked frame in radians
    pub yaw_rate: f64,
    /// Insert a keyframe every N tracked frames
    pub keyframe_interval: u64,
    /// Number of random landmarks generated at startup
    pub landmark_count: usize,
    /// Half-width of the landmark field in meters
    pub landmark_extent: f64,
    /// RNG seed for the landmark field
    pub seed: u64,
    /// IMU samples kept between tracking calls
    pub imu_buffer_capacity: usize,
    /// Simulated processing time per tracking call
    pub track_delay_ms: u64,
}

impl Default for MockEngineConfig {
    fn default() -> Self {
        Self {
            init_frames: 5,
            velocity: [0.05, 0.0, 0.0],
            yaw_rate: 0.0,
            keyframe_interval: 10,
            landmark_count: 2000,
            landmark_extent: 10.0,
            seed: 42,
            imu_buffer_capacity: 2000,
            track_delay_ms: 0,
        }
    }
}

/// One scripted tracking outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockOutcome {
    Tracked(Pose3D),
    Lost,
}

#[derive(Debug, Default)]
struct MockMap {
    landmarks: Vec<Landmark>,
    keyframes: Vec<KeyFrameData>,
    active_map_id: u32,
    next_keyframe_id: u64,
    last_timestamp_us: u64,
}

/// Mock implementation of [`TrackingEngine`].
pub struct MockEngine {
    config: MockEngineConfig,
    map: RwLock<MockMap>,
    script: Mutex<VecDeque<MockOutcome>>,
    calls: Mutex<VecDeque<u64>>,
    imu: Mutex<VecDeque<ImuSample>>,
    frames_seen: AtomicU64,
    tracked_frames: AtomicU64,
    odometry_received: AtomicU64,
    in_flight: AtomicBool,
    reentrant_calls: AtomicU64,
}

impl MockEngine {
    /// Create an engine with a seeded random landmark field.
    pub fn new(config: MockEngineConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let extent = config.landmark_extent.max(f64::EPSILON);
        let points = (0..config.landmark_count)
            .map(|_| {
                Point3D::new(
                    rng.random_range(-extent..extent),
                    rng.random_range(-extent..extent),
                    rng.random_range(-1.0..2.0),
                )
            })
            .collect();
        Self::with_landmarks(config, points)
    }

    /// Create an engine with an explicit landmark field.
    pub fn with_landmarks(config: MockEngineConfig, points: Vec<Point3D>) -> Self {
        let landmarks = points
            .into_iter()
            .enumerate()
            .map(|(i, position)| Landmark {
                id: i as u64,
                position,
            })
            .collect();

        Self {
            map: RwLock::new(MockMap {
                landmarks,
                ..Default::default()
            }),
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(VecDeque::with_capacity(CALL_LOG_CAPACITY)),
            imu: Mutex::new(VecDeque::with_capacity(config.imu_buffer_capacity)),
            frames_seen: AtomicU64::new(0),
            tracked_frames: AtomicU64::new(0),
            odometry_received: AtomicU64::new(0),
            in_flight: AtomicBool::new(false),
            reentrant_calls: AtomicU64::new(0),
            config,
        }
    }

    /// Queue outcomes for the next tracking calls, overriding the trajectory.
    pub fn script(&self, outcomes: impl IntoIterator<Item = MockOutcome>) {
        self.script.lock().extend(outcomes);
    }

    /// Start a new (empty) active map. Older keyframes stay in the atlas.
    pub fn start_new_map(&self) {
        let mut map = self.map.write();
        map.active_map_id += 1;
        log::info!("Mock engine: started map {}", map.active_map_id);
    }

    /// Left-image timestamps of the most recent tracking calls, in call
    /// order.
    pub fn tracked_calls(&self) -> Vec<u64> {
        self.calls.lock().iter().copied().collect()
    }

    /// Total tracking calls since creation.
    pub fn call_count(&self) -> usize {
        self.frames_seen.load(Ordering::Relaxed) as usize
    }

    /// Number of tracking calls that overlapped another in-flight call.
    pub fn reentrant_calls(&self) -> u64 {
        self.reentrant_calls.load(Ordering::Relaxed)
    }

    pub fn imu_buffered(&self) -> usize {
        self.imu.lock().len()
    }

    pub fn odometry_received(&self) -> u64 {
        self.odometry_received.load(Ordering::Relaxed)
    }

    pub fn landmark_count(&self) -> usize {
        self.map.read().landmarks.len()
    }

    pub fn keyframe_count(&self) -> usize {
        self.map.read().keyframes.len()
    }

    fn trajectory_pose(&self, index: u64) -> Pose3D {
        let k = index as f64;
        let [vx, vy, vz] = self.config.velocity;
        Pose3D::from_xyz_rpy(vx * k, vy * k, vz * k, 0.0, 0.0, self.config.yaw_rate * k)
    }

    fn next_outcome(&self, frame_index: u64) -> MockOutcome {
        if let Some(outcome) = self.script.lock().pop_front() {
            return outcome;
        }
        if frame_index < self.config.init_frames {
            return MockOutcome::Lost;
        }
        MockOutcome::Tracked(self.trajectory_pose(frame_index - self.config.init_frames))
    }

    fn insert_keyframe(&self, pose: &Pose3D, timestamp_us: u64) {
        let mut map = self.map.write();
        let observed_landmarks = visible_landmarks(
            &map.landmarks,
            pose,
            KEYFRAME_MAX_OBSERVATIONS,
            KEYFRAME_OBSERVATION_RANGE,
            KEYFRAME_OBSERVATION_ANGLE,
        )
        .into_iter()
        .map(|l| l.id)
        .collect();

        let id = map.next_keyframe_id;
        map.next_keyframe_id += 1;
        let map_id = map.active_map_id;
        map.keyframes.push(KeyFrameData {
            id,
            timestamp_us,
            pose: *pose,
            map_id,
            observed_landmarks,
        });
        log::debug!("Mock engine: keyframe {} in map {}", id, map_id);
    }

    fn consume_imu(&self, up_to_us: u64) -> usize {
        let mut imu = self.imu.lock();
        let before = imu.len();
        while imu.front().is_some_and(|s| s.timestamp_us <= up_to_us) {
            imu.pop_front();
        }
        before - imu.len()
    }
}

impl TrackingEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn track_stereo(&self, frame: &StereoFrame) -> TrackingResult {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            self.reentrant_calls.fetch_add(1, Ordering::Relaxed);
            log::error!("Mock engine: reentrant track_stereo call");
        }

        let timestamp_us = frame.timestamp_us();
        {
            let mut calls = self.calls.lock();
            if calls.len() == CALL_LOG_CAPACITY {
                calls.pop_front();
            }
            calls.push_back(timestamp_us);
        }
        let frame_index = self.frames_seen.fetch_add(1, Ordering::Relaxed);
        let imu_used = self.consume_imu(timestamp_us);

        if self.config.track_delay_ms > 0 {
            thread::sleep(Duration::from_millis(self.config.track_delay_ms));
        }

        let result = match self.next_outcome(frame_index) {
            MockOutcome::Tracked(pose) => {
                let tracked = self.tracked_frames.fetch_add(1, Ordering::Relaxed);
                self.map.write().last_timestamp_us = timestamp_us;
                if self.config.keyframe_interval > 0 && tracked % self.config.keyframe_interval == 0
                {
                    self.insert_keyframe(&pose, timestamp_us);
                }
                TrackingResult::tracked(pose, timestamp_us)
            }
            MockOutcome::Lost => TrackingResult::lost(timestamp_us),
        };

        log::trace!(
            "Mock engine: frame {} tracked={} ({} imu samples)",
            frame_index,
            result.tracked,
            imu_used
        );

        self.in_flight.store(false, Ordering::Release);
        result
    }

    fn handle_imu(&self, sample: ImuSample) {
        let mut imu = self.imu.lock();
        imu.push_back(sample);
        while imu.len() > self.config.imu_buffer_capacity {
            imu.pop_front();
        }
    }

    fn handle_odometry(&self, _sample: &OdometrySample) {
        self.odometry_received.fetch_add(1, Ordering::Relaxed);
    }

    fn current_map_points(&self) -> PointCloud {
        let map = self.map.read();
        let observed: HashSet<u64> = map
            .keyframes
            .iter()
            .filter(|kf| kf.map_id == map.active_map_id)
            .flat_map(|kf| kf.observed_landmarks.iter().copied())
            .collect();

        let points = map
            .landmarks
            .iter()
            .filter(|l| observed.contains(&l.id))
            .map(|l| l.position)
            .collect();

        PointCloud::new("map", map.last_timestamp_us, points)
    }

    fn map_snapshot(&self, query: &MapQuery) -> MapSnapshot {
        let map = self.map.read();
        let keyframes: Vec<KeyFrameData> = map
            .keyframes
            .iter()
            .filter(|kf| !query.active_map_only || kf.map_id == map.active_map_id)
            .cloned()
            .collect();

        let landmarks = if query.include_landmarks {
            let observed: HashSet<u64> = keyframes
                .iter()
                .filter(|kf| query.keyframe_id.is_none_or(|id| kf.id == id))
                .flat_map(|kf| kf.observed_landmarks.iter().copied())
                .collect();
            map.landmarks
                .iter()
                .filter(|l| observed.contains(&l.id))
                .copied()
                .collect()
        } else {
            Vec::new()
        };

        MapSnapshot {
            keyframes,
            landmarks,
        }
    }

    fn landmarks_visible_from(
        &self,
        pose: &Pose3D,
        max_count: usize,
        max_distance: f64,
        max_angle: f64,
    ) -> Vec<Landmark> {
        let map = self.map.read();
        visible_landmarks(&map.landmarks, pose, max_count, max_distance, max_angle)
    }
}

/// Landmarks within range and view cone of `pose`, nearest first.
fn visible_landmarks(
    landmarks: &[Landmark],
    pose: &Pose3D,
    max_count: usize,
    max_distance: f64,
    max_angle: f64,
) -> Vec<Landmark> {
    let origin = pose.position();
    let forward = pose.forward_axis();
    let max_distance_sq = max_distance * max_distance;

    let mut visible: Vec<(f64, Landmark)> = landmarks
        .iter()
        .filter_map(|l| {
            let d2 = origin.distance_squared(&l.position);
            if d2 > max_distance_sq {
                return None;
            }
            let ray = l.position.to_vector() - origin.to_vector();
            (forward.angle(&ray) <= max_angle).then_some((d2, *l))
        })
        .collect();

    visible.sort_by(|a, b| a.0.total_cmp(&b.0));
    visible.truncate(max_count);
    visible.into_iter().map(|(_, l)| l).collect()
}
