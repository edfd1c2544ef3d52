//! Periodic publishers.
//!
//! Two independent timers, each on its own thread:
//!
//! | Publisher | Default period | Publishes | Gate |
//! |-----------|----------------|-----------|------|
//! | [`MapDataPublisher`] | 1000 ms | active-map keyframes, no landmarks | tracked |
//! | [`LandmarkCloudPublisher`] | 1000 ms | current map points | tracked, non-empty |
//!
//! Both only read engine snapshots and tracking state, so a slow publish never
//! delays the tracking lane.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::core::now_us;
use crate::core::types::MapQuery;
use crate::engine::TrackingEngine;
use crate::io::OutputSink;
use crate::io::streaming::{Message, Payload};
use crate::state::TrackingStateHandle;

/// Longest sleep between running-flag checks.
const MAX_SLEEP: Duration = Duration::from_millis(50);

/// What one map-data publish did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapDataReport {
    /// Tracked frames counted since the previous publish
    pub frames: u64,
    /// Tracking frequency over the same window
    pub rate_hz: f64,
    /// Keyframes in the published snapshot
    pub keyframes: usize,
}

/// Publishes the active map graph and reports tracking frequency.
pub struct MapDataPublisher {
    engine: Arc<dyn TrackingEngine>,
    state: TrackingStateHandle,
    sink: Arc<dyn OutputSink>,
    topic: String,
    window_start: Instant,
}

impl MapDataPublisher {
    pub fn new(
        engine: Arc<dyn TrackingEngine>,
        state: TrackingStateHandle,
        sink: Arc<dyn OutputSink>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            state,
            sink,
            topic: topic.into(),
            window_start: Instant::now(),
        }
    }

    /// One timer firing. Returns `None` while not tracked.
    pub fn fire(&mut self) -> Option<MapDataReport> {
        if !self.state.is_tracked() {
            return None;
        }

        let elapsed = self.window_start.elapsed().as_secs_f64();
        let frames = self.state.take_frame_count();
        self.window_start = Instant::now();
        let rate_hz = if elapsed > 0.0 {
            frames as f64 / elapsed
        } else {
            0.0
        };
        log::info!("Tracking frequency: {:.2} Hz ({} frames)", rate_hz, frames);

        let fetch_start = Instant::now();
        let snapshot = self.engine.map_snapshot(&MapQuery::periodic());
        let fetch_time = fetch_start.elapsed();
        let keyframes = snapshot.keyframe_count();

        let publish_start = Instant::now();
        self.sink.publish(Message::new(
            self.topic.clone(),
            now_us(),
            Payload::MapData(snapshot),
        ));
        log::debug!(
            "Map data: {} keyframes (fetch {:?}, publish {:?})",
            keyframes,
            fetch_time,
            publish_start.elapsed()
        );

        Some(MapDataReport {
            frames,
            rate_hz,
            keyframes,
        })
    }
}

/// Publishes the engine's current map point cloud.
pub struct LandmarkCloudPublisher {
    engine: Arc<dyn TrackingEngine>,
    state: TrackingStateHandle,
    sink: Arc<dyn OutputSink>,
    topic: String,
}

impl LandmarkCloudPublisher {
    pub fn new(
        engine: Arc<dyn TrackingEngine>,
        state: TrackingStateHandle,
        sink: Arc<dyn OutputSink>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            state,
            sink,
            topic: topic.into(),
        }
    }

    /// One timer firing. Returns true if a cloud was published.
    pub fn fire(&self) -> bool {
        if !self.state.is_tracked() {
            return false;
        }

        let fetch_start = Instant::now();
        let cloud = self.engine.current_map_points();
        if cloud.is_empty() {
            return false;
        }
        let points = cloud.len();
        let fetch_time = fetch_start.elapsed();

        let publish_start = Instant::now();
        self.sink.publish(Message::new(
            self.topic.clone(),
            cloud.timestamp_us,
            Payload::PointCloud(cloud),
        ));
        log::debug!(
            "Map points: {} (fetch {:?}, publish {:?})",
            points,
            fetch_time,
            publish_start.elapsed()
        );
        true
    }
}

/// Periodic publisher thread handle.
pub struct PublisherThread {
    handle: JoinHandle<()>,
}

impl PublisherThread {
    /// Spawn a thread that runs `task` every `period` until `running` clears.
    pub fn spawn<F>(name: &str, period: Duration, running: Arc<AtomicBool>, mut task: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let thread_name = name.to_string();
        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                log::info!("{} thread starting (period {:?})", thread_name, period);
                let mut next = Instant::now() + period;

                while running.load(Ordering::Relaxed) {
                    let now = Instant::now();
                    if now >= next {
                        task();
                        next += period;
                        // Skip missed firings rather than bursting
                        if next <= now {
                            next = now + period;
                        }
                    } else {
                        thread::sleep((next - now).min(MAX_SLEEP));
                    }
                }

                log::info!("{} thread exiting", thread_name);
            })
            .expect("Failed to spawn publisher thread");

        Self { handle }
    }

    /// Wait for thread to finish.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ImageFrame, Point3D, Pose3D, StereoFrame};
    use crate::engine::{MockEngine, MockEngineConfig, MockOutcome};
    use crate::io::ChannelSink;
    use crate::state::create_tracking_state;
    use std::sync::atomic::AtomicUsize;

    fn engine(points: Vec<Point3D>) -> Arc<MockEngine> {
        Arc::new(MockEngine::with_landmarks(
            MockEngineConfig {
                init_frames: 0,
                keyframe_interval: 1,
                ..Default::default()
            },
            points,
        ))
    }

    fn track(engine: &MockEngine, state: &TrackingStateHandle, pose: Pose3D, ts: u64) {
        engine.script([MockOutcome::Tracked(pose)]);
        let result = engine.track_stereo(&StereoFrame {
            left: ImageFrame::header_only(ts),
            right: ImageFrame::header_only(ts),
        });
        state.record_success(result.pose, ts);
    }

    #[test]
    fn test_map_data_gated_until_tracked() {
        let engine = engine(Vec::new());
        let state = create_tracking_state();
        let (sink, rx) = ChannelSink::new();
        let mut publisher =
            MapDataPublisher::new(engine.clone(), state.clone(), Arc::new(sink), "map_data");

        assert!(publisher.fire().is_none());
        assert!(rx.try_recv().is_err());

        track(&engine, &state, Pose3D::identity(), 1);
        track(&engine, &state, Pose3D::identity(), 2);

        let report = publisher.fire().unwrap();
        assert_eq!(report.frames, 2);
        assert_eq!(report.keyframes, 2);
        assert_eq!(state.frames_since_reset(), 0);

        let msg = rx.try_recv().unwrap();
        assert_eq!(msg.topic, "map_data");
        match msg.payload {
            Payload::MapData(snapshot) => assert!(snapshot.landmarks.is_empty()),
            other => panic!("unexpected payload {:?}", other.kind()),
        }
    }

    #[test]
    fn test_landmark_cloud_skips_empty() {
        // No landmark in front of the camera, so the active map has no points
        let engine = engine(vec![Point3D::new(-3.0, 0.0, 0.0)]);
        let state = create_tracking_state();
        let (sink, rx) = ChannelSink::new();
        let publisher = LandmarkCloudPublisher::new(
            engine.clone(),
            state.clone(),
            Arc::new(sink),
            "map_points",
        );

        track(&engine, &state, Pose3D::identity(), 1);
        assert!(!publisher.fire());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_landmark_cloud_published_when_tracked() {
        let engine = engine(vec![Point3D::new(2.0, 0.0, 0.0)]);
        let state = create_tracking_state();
        let (sink, rx) = ChannelSink::new();
        let publisher = LandmarkCloudPublisher::new(
            engine.clone(),
            state.clone(),
            Arc::new(sink),
            "map_points",
        );

        assert!(!publisher.fire());
        track(&engine, &state, Pose3D::identity(), 1);
        assert!(publisher.fire());

        let msg = rx.try_recv().unwrap();
        assert_eq!(msg.topic, "map_points");
        assert!(matches!(msg.payload, Payload::PointCloud(ref c) if c.len() == 1));
    }

    #[test]
    fn test_publisher_thread_fires_and_stops() {
        let running = Arc::new(AtomicBool::new(true));
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let thread = PublisherThread::spawn(
            "test-timer",
            Duration::from_millis(10),
            running.clone(),
            move || {
                c.fetch_add(1, Ordering::Relaxed);
            },
        );

        thread::sleep(Duration::from_millis(100));
        running.store(false, Ordering::Relaxed);
        thread.join().unwrap();

        assert!(count.load(Ordering::Relaxed) >= 2);
    }
}
