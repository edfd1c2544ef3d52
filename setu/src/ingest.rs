//! Inbound sensor routing.
//!
//! Every inbound [`Message`] goes through [`IngestRouter::route`]:
//!
//! - left/right images → bounded channel to the tracking thread (never blocks;
//!   a full channel drops the image with a throttled warning)
//! - IMU → `TrackingEngine::handle_imu`, immediately
//! - odometry → [`OdometryIngest`], which discards it unless composed-mode
//!   transform broadcast is active

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::config::TopicsConfig;
use crate::core::types::{ImageFrame, ImuSample, OdometrySample, TransformStamped};
use crate::engine::TrackingEngine;
use crate::io::streaming::{Message, Payload};
use crate::state::TrackingStateHandle;
use crate::sync::StereoSide;
use crate::transform::TransformPublisher;
use crate::utils::Throttle;

/// Odometry discard warnings are limited to one per interval.
pub const ODOMETRY_WARN_INTERVAL: Duration = Duration::from_millis(4000);

const IMAGE_QUEUE_WARN_INTERVAL: Duration = Duration::from_secs(2);

/// One image on its way to the tracking thread.
pub type ImageEvent = (StereoSide, ImageFrame);

/// Create the bounded image channel between ingest and the tracking thread.
pub fn create_image_channel(capacity: usize) -> (Sender<ImageEvent>, Receiver<ImageEvent>) {
    bounded(capacity.max(1))
}

/// Ingest counters.
#[derive(Debug, Default)]
pub struct IngestStats {
    pub images: AtomicU64,
    pub rejected_images: AtomicU64,
    pub imu: AtomicU64,
    pub odometry: AtomicU64,
    pub discarded_odometry: AtomicU64,
    pub unroutable: AtomicU64,
}

impl IngestStats {
    fn bump(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Odometry handling for both transform modes.
pub struct OdometryIngest {
    engine: Arc<dyn TrackingEngine>,
    transform: Arc<TransformPublisher>,
    state: TrackingStateHandle,
    discard_warning: Throttle,
}

impl OdometryIngest {
    pub fn new(
        engine: Arc<dyn TrackingEngine>,
        transform: Arc<TransformPublisher>,
        state: TrackingStateHandle,
    ) -> Self {
        Self {
            engine,
            transform,
            state,
            discard_warning: Throttle::new(ODOMETRY_WARN_INTERVAL),
        }
    }

    /// Returns the transform broadcast for this sample, if any.
    ///
    /// `None` with `accepted == false` means the sample was discarded.
    pub fn handle(&self, sample: &OdometrySample) -> (bool, Option<TransformStamped>) {
        if !self.transform.accepts_odometry() {
            if let Some(suppressed) = self.discard_warning.check() {
                log::warn!(
                    "Odometry received but not used (no_odometry_mode or publish_tf disabled), \
                     {} more since last warning",
                    suppressed
                );
            }
            return (false, None);
        }

        self.engine.handle_odometry(sample);
        (true, self.transform.on_odometry(sample, &self.state))
    }
}

/// Routes inbound bus messages by topic.
pub struct IngestRouter {
    topics: TopicsConfig,
    image_tx: Sender<ImageEvent>,
    engine: Arc<dyn TrackingEngine>,
    odometry: OdometryIngest,
    stats: IngestStats,
    queue_full_warning: Throttle,
}

impl IngestRouter {
    pub fn new(
        topics: TopicsConfig,
        image_tx: Sender<ImageEvent>,
        engine: Arc<dyn TrackingEngine>,
        odometry: OdometryIngest,
    ) -> Self {
        Self {
            topics,
            image_tx,
            engine,
            odometry,
            stats: IngestStats::default(),
            queue_full_warning: Throttle::new(IMAGE_QUEUE_WARN_INTERVAL),
        }
    }

    /// Dispatch one inbound message.
    pub fn route(&self, message: Message) {
        let topic = message.topic.as_str();
        match message.payload {
            Payload::Image(image) if topic == self.topics.left_image => {
                self.push_image(StereoSide::Left, image);
            }
            Payload::Image(image) if topic == self.topics.right_image => {
                self.push_image(StereoSide::Right, image);
            }
            Payload::Imu(sample) if topic == self.topics.imu => self.push_imu(sample),
            Payload::Odometry(sample) if topic == self.topics.odom => {
                self.push_odometry(&sample);
            }
            payload => {
                let n = IngestStats::bump(&self.stats.unroutable);
                if n == 1 || n % 1000 == 0 {
                    log::warn!(
                        "Dropping {} payload on topic '{}' ({} unroutable so far)",
                        payload.kind(),
                        topic,
                        n
                    );
                }
            }
        }
    }

    /// Queue an image for the tracking thread. Returns false if dropped.
    pub fn push_image(&self, side: StereoSide, image: ImageFrame) -> bool {
        IngestStats::bump(&self.stats.images);
        match self.image_tx.try_send((side, image)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                let rejected = IngestStats::bump(&self.stats.rejected_images);
                if self.queue_full_warning.ready() {
                    log::warn!(
                        "Tracking lane busy, image queue full ({} images dropped)",
                        rejected
                    );
                }
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                log::debug!("Tracking thread gone, dropping image");
                false
            }
        }
    }

    pub fn push_imu(&self, sample: ImuSample) {
        IngestStats::bump(&self.stats.imu);
        self.engine.handle_imu(sample);
    }

    pub fn push_odometry(&self, sample: &OdometrySample) -> Option<TransformStamped> {
        IngestStats::bump(&self.stats.odometry);
        let (accepted, transform) = self.odometry.handle(sample);
        if !accepted {
            IngestStats::bump(&self.stats.discarded_odometry);
        }
        transform
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Pose3D;
    use crate::engine::{MockEngine, MockEngineConfig};
    use crate::io::NullSink;
    use crate::state::create_tracking_state;
    use crate::transform::{TransformMode, TransformPublisherConfig};

    type Fixture = (IngestRouter, Receiver<ImageEvent>, Arc<MockEngine>);

    fn router(mode: TransformMode, capacity: usize) -> Fixture {
        router_with(
            TransformPublisherConfig {
                mode,
                ..Default::default()
            },
            capacity,
        )
    }

    fn router_with(config: TransformPublisherConfig, capacity: usize) -> Fixture {
        let engine = Arc::new(MockEngine::new(MockEngineConfig {
            landmark_count: 0,
            ..Default::default()
        }));
        let transform = Arc::new(TransformPublisher::new(config, Arc::new(NullSink)));
        let odometry = OdometryIngest::new(engine.clone(), transform, create_tracking_state());
        let (tx, rx) = create_image_channel(capacity);
        (
            IngestRouter::new(TopicsConfig::default(), tx, engine.clone(), odometry),
            rx,
            engine,
        )
    }

    #[test]
    fn test_images_routed_by_topic() {
        let (router, rx, _) = router(TransformMode::Direct, 4);
        router.route(Message::new(
            "left/image_raw",
            1,
            Payload::Image(ImageFrame::header_only(1)),
        ));
        router.route(Message::new(
            "right/image_raw",
            2,
            Payload::Image(ImageFrame::header_only(2)),
        ));

        assert_eq!(rx.try_recv().unwrap().0, StereoSide::Left);
        assert_eq!(rx.try_recv().unwrap().0, StereoSide::Right);
    }

    #[test]
    fn test_full_image_queue_rejects() {
        let (router, _rx, _) = router(TransformMode::Direct, 2);
        for ts in 0..5 {
            router.push_image(StereoSide::Left, ImageFrame::header_only(ts));
        }
        assert_eq!(IngestStats::get(&router.stats().images), 5);
        assert_eq!(IngestStats::get(&router.stats().rejected_images), 3);
    }

    #[test]
    fn test_imu_forwarded_immediately() {
        let (router, _rx, engine) = router(TransformMode::Direct, 2);
        router.route(Message::new(
            "imu",
            1,
            Payload::Imu(ImuSample {
                timestamp_us: 1,
                linear_acceleration: [0.0, 0.0, 9.81],
                angular_velocity: [0.0; 3],
            }),
        ));
        assert_eq!(engine.imu_buffered(), 1);
    }

    #[test]
    fn test_odometry_discarded_in_direct_mode() {
        let (router, _rx, engine) = router(TransformMode::Direct, 2);
        for ts in 0..3 {
            assert!(
                router
                    .push_odometry(&OdometrySample::new(ts, Pose3D::identity()))
                    .is_none()
            );
        }
        assert_eq!(engine.odometry_received(), 0);
        assert_eq!(IngestStats::get(&router.stats().discarded_odometry), 3);
    }

    #[test]
    fn test_odometry_forwarded_in_composed_mode() {
        let (router, _rx, engine) = router(TransformMode::Composed, 2);
        router.push_odometry(&OdometrySample::new(1, Pose3D::identity()));
        assert_eq!(engine.odometry_received(), 1);
        assert_eq!(IngestStats::get(&router.stats().discarded_odometry), 0);
    }

    #[test]
    fn test_odometry_discarded_in_composed_mode_without_tf() {
        let (router, _rx, engine) = router_with(
            TransformPublisherConfig {
                mode: TransformMode::Composed,
                publish_tf: false,
                ..Default::default()
            },
            2,
        );
        for ts in 0..4 {
            assert!(
                router
                    .push_odometry(&OdometrySample::new(ts, Pose3D::identity()))
                    .is_none()
            );
        }
        assert_eq!(engine.odometry_received(), 0);
        assert_eq!(IngestStats::get(&router.stats().odometry), 4);
        assert_eq!(IngestStats::get(&router.stats().discarded_odometry), 4);
    }

    #[test]
    fn test_payload_topic_mismatch_dropped() {
        let (router, rx, _) = router(TransformMode::Direct, 2);
        router.route(Message::new(
            "imu",
            1,
            Payload::Image(ImageFrame::header_only(1)),
        ));
        assert!(rx.try_recv().is_err());
        assert_eq!(IngestStats::get(&router.stats().unroutable), 1);
    }
}
