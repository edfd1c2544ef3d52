//! Tracking Thread - the single owner of `track_stereo`.
//!
//! Receives images from ingest, pairs them in the stereo synchronizer and
//! runs each emitted pair through the [`TrackingLane`] in arrival order.
//! Because only this thread calls the engine, tracking calls never overlap.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::core::types::{StereoFrame, TrackingResult};
use crate::engine::TrackingEngine;
use crate::ingest::ImageEvent;
use crate::state::TrackingStateHandle;
use crate::sync::{StereoSynchronizer, SyncConfig, SyncStats};
use crate::transform::TransformPublisher;

/// Poll interval for the running flag while no images arrive.
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Runs one stereo frame through the engine and fans out the result.
pub struct TrackingLane {
    engine: Arc<dyn TrackingEngine>,
    state: TrackingStateHandle,
    transform: Arc<TransformPublisher>,
    frames: u64,
    lost: u64,
}

impl TrackingLane {
    pub fn new(
        engine: Arc<dyn TrackingEngine>,
        state: TrackingStateHandle,
        transform: Arc<TransformPublisher>,
    ) -> Self {
        Self {
            engine,
            state,
            transform,
            frames: 0,
            lost: 0,
        }
    }

    /// Track one frame.
    ///
    /// On success the pose is cached, the tracked flag set, the frequency
    /// counter bumped and (direct mode) the transform broadcast. On failure
    /// nothing changes.
    pub fn process(&mut self, frame: &StereoFrame) -> TrackingResult {
        let start = Instant::now();
        let result = self.engine.track_stereo(frame);
        self.frames += 1;

        if result.tracked {
            let was_tracked = self.state.is_tracked();
            let tracked = self.state.record_success(result.pose, frame.timestamp_us());
            if !was_tracked {
                log::info!("Tracking started at frame {}", self.frames);
            }
            self.transform.on_tracking_success(&tracked);
        } else {
            self.lost += 1;
            log::trace!("Frame {} not tracked", frame.timestamp_us());
        }

        log::trace!("track_stereo took {:?}", start.elapsed());
        result
    }

    /// Frames processed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Frames the engine did not track.
    pub fn lost(&self) -> u64 {
        self.lost
    }
}

/// Tracking Thread handle.
pub struct TrackingThread {
    handle: JoinHandle<SyncStats>,
}

impl TrackingThread {
    /// Spawn the tracking thread.
    pub fn spawn(
        sync_config: SyncConfig,
        lane: TrackingLane,
        image_rx: Receiver<ImageEvent>,
        running: Arc<AtomicBool>,
    ) -> Self {
        let handle = thread::Builder::new()
            .name("tracking".into())
            .spawn(move || run_tracking_loop(sync_config, lane, image_rx, running))
            .expect("Failed to spawn tracking thread");

        Self { handle }
    }

    /// Wait for thread to finish; returns the synchronizer statistics.
    pub fn join(self) -> thread::Result<SyncStats> {
        self.handle.join()
    }
}

fn run_tracking_loop(
    sync_config: SyncConfig,
    mut lane: TrackingLane,
    image_rx: Receiver<ImageEvent>,
    running: Arc<AtomicBool>,
) -> SyncStats {
    log::info!(
        "Tracking thread starting (tolerance {} us, queue depth {})",
        sync_config.max_interval_us,
        sync_config.queue_depth
    );
    let mut sync = StereoSynchronizer::new(sync_config);

    while running.load(Ordering::Relaxed) {
        match image_rx.recv_timeout(RECV_TIMEOUT) {
            Ok((side, image)) => {
                if let Some(frame) = sync.push(side, image) {
                    lane.process(&frame);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                log::info!("Image channel closed");
                break;
            }
        }
    }

    let stats = sync.stats();
    log::info!(
        "Tracking thread exiting ({} pairs, {} stale images dropped, {} frames lost)",
        stats.paired,
        stats.dropped,
        lane.lost()
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ImageFrame, Pose3D};
    use crate::engine::{MockEngine, MockEngineConfig, MockOutcome};
    use crate::io::NullSink;
    use crate::state::create_tracking_state;
    use crate::transform::TransformPublisherConfig;

    fn frame(ts: u64) -> StereoFrame {
        StereoFrame {
            left: ImageFrame::header_only(ts),
            right: ImageFrame::header_only(ts + 500),
        }
    }

    fn lane(engine: Arc<MockEngine>) -> (TrackingLane, TrackingStateHandle, Arc<TransformPublisher>) {
        let state = create_tracking_state();
        let transform = Arc::new(TransformPublisher::new(
            TransformPublisherConfig::default(),
            Arc::new(NullSink),
        ));
        (
            TrackingLane::new(engine, state.clone(), transform.clone()),
            state,
            transform,
        )
    }

    #[test]
    fn test_failure_mutates_nothing() {
        let engine = Arc::new(MockEngine::new(MockEngineConfig {
            landmark_count: 0,
            ..Default::default()
        }));
        engine.script([MockOutcome::Lost, MockOutcome::Lost]);
        let (mut lane, state, transform) = lane(engine);

        lane.process(&frame(1));
        lane.process(&frame(2));

        assert!(!state.is_tracked());
        assert_eq!(state.frames_since_reset(), 0);
        assert!(transform.latest().is_none());
        assert_eq!(lane.lost(), 2);
    }

    #[test]
    fn test_success_updates_state_and_transform() {
        let engine = Arc::new(MockEngine::new(MockEngineConfig {
            landmark_count: 0,
            ..Default::default()
        }));
        let pose = Pose3D::from_translation(1.0, 0.0, 0.0);
        engine.script([MockOutcome::Tracked(pose)]);
        let (mut lane, state, transform) = lane(engine);

        let result = lane.process(&frame(10));

        assert!(result.tracked);
        assert!(state.is_tracked());
        assert_eq!(state.latest_pose(), Some(pose));
        // Stamp comes from the left image
        assert_eq!(state.latest().unwrap().timestamp_us, 10);
        assert_eq!(state.frames_since_reset(), 1);
        assert_eq!(transform.latest().unwrap().timestamp_us, 10);
    }
}
