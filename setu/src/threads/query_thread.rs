//! Query Thread - answers on-demand map queries.
//!
//! Queries do not depend on the tracked flag or on publisher cadence; they
//! can be served before the first successful track.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::QueryConfig;
use crate::core::now_us;
use crate::core::types::{MapQuery, MapSnapshot, Point3D, PointCloud, Pose3D, Stamped};
use crate::engine::TrackingEngine;
use crate::io::OutputSink;
use crate::io::streaming::{Message, Payload};
use crate::state::{QueryReceiver, QueryRequest, QueryResponse, QueryResult};

const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Where the landmarks-in-view side channel publishes.
#[derive(Debug, Clone)]
pub struct QueryOutputs {
    pub visible_landmarks_topic: String,
    pub visible_landmarks_pose_topic: String,
    /// Frame the results are expressed in
    pub frame_id: String,
}

impl Default for QueryOutputs {
    fn default() -> Self {
        Self {
            visible_landmarks_topic: "visible_landmarks".to_string(),
            visible_landmarks_pose_topic: "visible_landmarks_pose".to_string(),
            frame_id: "map".to_string(),
        }
    }
}

/// Executes queries against the engine.
pub struct QueryService {
    engine: Arc<dyn TrackingEngine>,
    sink: Arc<dyn OutputSink>,
    outputs: QueryOutputs,
    limits: QueryConfig,
}

impl QueryService {
    pub fn new(
        engine: Arc<dyn TrackingEngine>,
        sink: Arc<dyn OutputSink>,
        outputs: QueryOutputs,
        limits: QueryConfig,
    ) -> Self {
        Self {
            engine,
            sink,
            outputs,
            limits,
        }
    }

    pub fn handle(&self, request: &QueryRequest) -> QueryResult {
        let response = match request {
            QueryRequest::MapData {
                tracked_points,
                keyframe_id,
            } => QueryResponse::MapData(self.map_data(*tracked_points, *keyframe_id)),
            QueryRequest::LandmarksInView { pose } => {
                QueryResponse::LandmarksInView(self.landmarks_in_view(pose))
            }
        };
        Ok(response)
    }

    /// Map graph across every map, optionally with landmarks.
    pub fn map_data(&self, tracked_points: bool, keyframe_id: Option<u64>) -> MapSnapshot {
        let start = Instant::now();
        let snapshot = self.engine.map_snapshot(&MapQuery {
            active_map_only: false,
            include_landmarks: tracked_points,
            keyframe_id,
        });
        log::debug!(
            "Map data query: {} keyframes, {} landmarks in {:?}",
            snapshot.keyframes.len(),
            snapshot.landmarks.len(),
            start.elapsed()
        );
        snapshot
    }

    /// Positions of landmarks visible from `pose`.
    ///
    /// Also publishes the result cloud and the query pose for visualization.
    pub fn landmarks_in_view(&self, pose: &Pose3D) -> Vec<Point3D> {
        let landmarks = self.engine.landmarks_visible_from(
            pose,
            self.limits.max_landmarks,
            self.limits.max_distance,
            self.limits.max_angle,
        );
        let positions: Vec<Point3D> = landmarks.iter().map(|l| l.position).collect();
        log::debug!("Landmarks in view: {}", positions.len());

        let stamp = now_us();
        self.sink.publish(Message::new(
            self.outputs.visible_landmarks_topic.clone(),
            stamp,
            Payload::PointCloud(PointCloud::new(
                self.outputs.frame_id.clone(),
                stamp,
                positions.clone(),
            )),
        ));
        self.sink.publish(Message::new(
            self.outputs.visible_landmarks_pose_topic.clone(),
            stamp,
            Payload::Pose(Stamped::new(self.outputs.frame_id.clone(), stamp, *pose)),
        ));

        positions
    }
}

/// Query Thread handle.
pub struct QueryThread {
    handle: JoinHandle<()>,
}

impl QueryThread {
    /// Spawn the query thread.
    pub fn spawn(service: QueryService, query_rx: QueryReceiver, running: Arc<AtomicBool>) -> Self {
        let handle = thread::Builder::new()
            .name("query".into())
            .spawn(move || {
                log::info!("Query thread starting");
                let mut served = 0u64;

                while running.load(Ordering::Relaxed) {
                    match query_rx.recv_timeout(RECV_TIMEOUT) {
                        Ok(query) => {
                            let result = service.handle(&query.request);
                            served += 1;
                            if query.response_tx.send(result).is_err() {
                                log::debug!("Query requester gone before response");
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }

                log::info!("Query thread exiting ({} queries served)", served);
            })
            .expect("Failed to spawn query thread");

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
    use crate::engine::{MockEngine, MockEngineConfig};
    use crate::io::ChannelSink;
    use crate::state::{create_query_channel, send_query_sync};

    fn service(points: Vec<Point3D>) -> (QueryService, crossbeam_channel::Receiver<Message>) {
        let engine = Arc::new(MockEngine::with_landmarks(MockEngineConfig::default(), points));
        let (sink, rx) = ChannelSink::new();
        (
            QueryService::new(
                engine,
                Arc::new(sink),
                QueryOutputs::default(),
                QueryConfig::default(),
            ),
            rx,
        )
    }

    #[test]
    fn test_landmarks_in_view_side_channel() {
        let (service, rx) = service(vec![
            Point3D::new(1.0, 0.0, 0.0),
            Point3D::new(0.0, 0.0, -1.0),
        ]);
        let pose = Pose3D::identity();

        // Angle limit 2.0 rad admits the point straight below (π/2)
        let positions = service.landmarks_in_view(&pose);
        assert_eq!(positions.len(), 2);

        let cloud = rx.try_recv().unwrap();
        assert_eq!(cloud.topic, "visible_landmarks");
        match cloud.payload {
            Payload::PointCloud(c) => {
                assert_eq!(c.points, positions);
                assert_eq!(c.frame_id, "map");
            }
            other => panic!("unexpected payload {}", other.kind()),
        }

        let pose_msg = rx.try_recv().unwrap();
        assert_eq!(pose_msg.topic, "visible_landmarks_pose");
        match pose_msg.payload {
            Payload::Pose(stamped) => {
                assert_eq!(stamped.frame_id, "map");
                assert_eq!(stamped.data, pose);
            }
            other => panic!("unexpected payload {}", other.kind()),
        }
    }

    #[test]
    fn test_map_data_before_tracking() {
        let (service, _rx) = service(Vec::new());
        let response = service
            .handle(&QueryRequest::MapData {
                tracked_points: true,
                keyframe_id: None,
            })
            .unwrap();
        assert_eq!(response, QueryResponse::MapData(MapSnapshot::default()));
    }

    #[test]
    fn test_query_thread_serves_requests() {
        let (service, _rx) = service(vec![Point3D::new(1.0, 0.0, 0.0)]);
        let running = Arc::new(AtomicBool::new(true));
        let (tx, rx) = create_query_channel();
        let thread = QueryThread::spawn(service, rx, running.clone());

        let response = send_query_sync(
            &tx,
            QueryRequest::LandmarksInView {
                pose: Pose3D::identity(),
            },
            1000,
        )
        .unwrap();
        assert_eq!(
            response,
            QueryResponse::LandmarksInView(vec![Point3D::new(1.0, 0.0, 0.0)])
        );

        running.store(false, Ordering::Relaxed);
        thread.join().unwrap();
    }
}
