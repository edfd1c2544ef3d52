//! Tracking state cache.
//!
//! Single writer (tracking lane), many readers (publishers, transform
//! publisher, query thread). The pose lives behind a `RwLock`; the tracked
//! flag and counters are atomics so the hot gating check never locks.
//!
//! Write order on success is pose, then flag (Release). A reader that sees
//! `is_tracked() == true` (Acquire) is guaranteed to see a pose.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::core::types::Pose3D;

/// Most recent successful tracking result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedPose {
    /// Camera pose in the SLAM map frame
    pub pose: Pose3D,
    /// Timestamp of the frame that produced it
    pub timestamp_us: u64,
    /// 1-based index of this success
    pub sequence: u64,
}

/// Tracking state shared across threads.
#[derive(Debug, Default)]
pub struct TrackingState {
    tracked: AtomicBool,
    latest: RwLock<Option<TrackedPose>>,
    successes: AtomicU64,
    frame_counter: AtomicU64,
}

/// Thread-safe handle to tracking state.
pub type TrackingStateHandle = Arc<TrackingState>;

/// Create a new tracking state handle.
pub fn create_tracking_state() -> TrackingStateHandle {
    Arc::new(TrackingState::default())
}

impl TrackingState {
    /// True once any frame has tracked. Never resets.
    #[inline]
    pub fn is_tracked(&self) -> bool {
        self.tracked.load(Ordering::Acquire)
    }

    /// Latest successful pose, if any.
    pub fn latest(&self) -> Option<TrackedPose> {
        *self.latest.read()
    }

    pub fn latest_pose(&self) -> Option<Pose3D> {
        self.latest().map(|t| t.pose)
    }

    /// Successful frames since the last frequency reset.
    #[inline]
    pub fn frames_since_reset(&self) -> u64 {
        self.frame_counter.load(Ordering::Relaxed)
    }

    /// Read and zero the frequency counter in one step.
    #[inline]
    pub fn take_frame_count(&self) -> u64 {
        self.frame_counter.swap(0, Ordering::AcqRel)
    }

    /// Total successful frames since startup.
    #[inline]
    pub fn success_count(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    /// Record a successful tracking result.
    pub(crate) fn record_success(&self, pose: Pose3D, timestamp_us: u64) -> TrackedPose {
        let sequence = self.successes.fetch_add(1, Ordering::Relaxed) + 1;
        let tracked = TrackedPose {
            pose,
            timestamp_us,
            sequence,
        };
        *self.latest.write() = Some(tracked);
        self.tracked.store(true, Ordering::Release);
        self.frame_counter.fetch_add(1, Ordering::AcqRel);
        tracked
    }
}
