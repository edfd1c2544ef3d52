//! Daemon wiring.
//!
//! Builds the shared state, transform publisher and ingest router, then
//! spawns the worker threads:
//!
//! ```text
//!   IngestRouter ──images──▶ Tracking Thread ──▶ TrackingState
//!        │                   (sync + lane)   └─▶ TransformPublisher ─▶ sink
//!        ├──imu──▶ engine                           ▲
//!        └──odom─▶ OdometryIngest ──────────────────┘
//!
//!   TrackingState ─▶ Map Data Publisher ──────────▶ sink
//!                 └▶ Landmark Cloud Publisher ────▶ sink
//!   QuerySender ──▶ Query Thread ─────────────────▶ sink (side channel)
//! ```
//!
//! Network endpoints are attached separately by `main`; tests drive the
//! router and query sender directly.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use crate::config::SetuConfig;
use crate::engine::TrackingEngine;
use crate::error::Result;
use crate::ingest::{IngestRouter, IngestStats, OdometryIngest, create_image_channel};
use crate::io::OutputSink;
use crate::state::{QuerySender, TrackingStateHandle, create_query_channel, create_tracking_state};
use crate::threads::{
    LandmarkCloudPublisher, MapDataPublisher, PublisherThread, QueryOutputs, QueryService,
    QueryThread, TrackingLane, TrackingThread,
};
use crate::transform::{TransformPublisher, TransformPublisherConfig};

/// Totals reported at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DaemonSummary {
    pub images_received: u64,
    pub images_rejected: u64,
    pub pairs: u64,
    pub stale_dropped: u64,
    pub tracked_frames: u64,
    pub odometry_discarded: u64,
}

/// Running bridge: tracking, publishers and query threads.
pub struct Daemon {
    state: TrackingStateHandle,
    transform: Arc<TransformPublisher>,
    router: Arc<IngestRouter>,
    query_tx: QuerySender,
    tracking: TrackingThread,
    map_data: PublisherThread,
    landmarks: Option<PublisherThread>,
    query: QueryThread,
}

impl Daemon {
    /// Spawn all worker threads. They run until `running` clears.
    pub fn spawn(
        config: &SetuConfig,
        engine: Arc<dyn TrackingEngine>,
        sink: Arc<dyn OutputSink>,
        running: Arc<AtomicBool>,
    ) -> Result<Self> {
        config.validate()?;
        log::info!("Initializing bridge ({} engine)...", engine.name());

        let state = create_tracking_state();
        let transform = Arc::new(TransformPublisher::new(
            TransformPublisherConfig::from_config(config),
            Arc::clone(&sink),
        ));

        let (image_tx, image_rx) = create_image_channel(config.sync.image_queue_capacity);
        let odometry =
            OdometryIngest::new(Arc::clone(&engine), Arc::clone(&transform), state.clone());
        let router = Arc::new(IngestRouter::new(
            config.topics.clone(),
            image_tx,
            Arc::clone(&engine),
            odometry,
        ));

        let lane = TrackingLane::new(Arc::clone(&engine), state.clone(), Arc::clone(&transform));
        let tracking = TrackingThread::spawn(config.sync.clone(), lane, image_rx, running.clone());
        log::info!("  Tracking thread started");

        let mut map_data_publisher = MapDataPublisher::new(
            Arc::clone(&engine),
            state.clone(),
            Arc::clone(&sink),
            config.topics.map_data.clone(),
        );
        let map_data = PublisherThread::spawn(
            "map-data",
            Duration::from_millis(config.publish.map_data_period_ms),
            running.clone(),
            move || {
                map_data_publisher.fire();
            },
        );
        log::info!("  Map data publisher started");

        let landmarks = if config.publish.ros_visualization {
            let cloud_publisher = LandmarkCloudPublisher::new(
                Arc::clone(&engine),
                state.clone(),
                Arc::clone(&sink),
                config.topics.map_points.clone(),
            );
            let thread = PublisherThread::spawn(
                "landmark-cloud",
                Duration::from_millis(config.publish.landmark_period_ms),
                running.clone(),
                move || {
                    cloud_publisher.fire();
                },
            );
            log::info!("  Landmark cloud publisher started");
            Some(thread)
        } else {
            log::info!("  Landmark cloud publisher disabled");
            None
        };

        let (query_tx, query_rx) = create_query_channel();
        let service = QueryService::new(
            Arc::clone(&engine),
            Arc::clone(&sink),
            QueryOutputs {
                visible_landmarks_topic: config.topics.visible_landmarks.clone(),
                visible_landmarks_pose_topic: config.topics.visible_landmarks_pose.clone(),
                frame_id: config.frames.global_frame.clone(),
            },
            config.query.clone(),
        );
        let query = QueryThread::spawn(service, query_rx, running);
        log::info!("  Query thread started");

        Ok(Self {
            state,
            transform,
            router,
            query_tx,
            tracking,
            map_data,
            landmarks,
            query,
        })
    }

    /// Entry point for inbound sensor messages.
    pub fn router(&self) -> Arc<IngestRouter> {
        Arc::clone(&self.router)
    }

    /// Sender for on-demand queries.
    pub fn query_sender(&self) -> QuerySender {
        self.query_tx.clone()
    }

    pub fn state(&self) -> TrackingStateHandle {
        self.state.clone()
    }

    pub fn transform(&self) -> Arc<TransformPublisher> {
        Arc::clone(&self.transform)
    }

    /// Join every thread. Call after clearing the running flag.
    pub fn join(self) -> DaemonSummary {
        let sync_stats = match self.tracking.join() {
            Ok(stats) => stats,
            Err(_) => {
                log::error!("Tracking thread panicked");
                Default::default()
            }
        };
        if self.map_data.join().is_err() {
            log::error!("Map data publisher panicked");
        }
        if let Some(thread) = self.landmarks
            && thread.join().is_err()
        {
            log::error!("Landmark cloud publisher panicked");
        }
        if self.query.join().is_err() {
            log::error!("Query thread panicked");
        }

        let stats = self.router.stats();
        let summary = DaemonSummary {
            images_received: IngestStats::get(&stats.images),
            images_rejected: IngestStats::get(&stats.rejected_images),
            pairs: sync_stats.paired,
            stale_dropped: sync_stats.dropped,
            tracked_frames: self.state.success_count(),
            odometry_discarded: IngestStats::get(&stats.discarded_odometry),
        };
        log::info!(
            "Bridge stopped: {} images ({} rejected), {} pairs ({} stale dropped), {} tracked",
            summary.images_received,
            summary.images_rejected,
            summary.pairs,
            summary.stale_dropped,
            summary.tracked_frames
        );
        summary
    }
}
