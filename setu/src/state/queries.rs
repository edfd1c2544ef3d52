//! On-demand query types for inter-thread communication.
//!
//! Queries are sent from the service endpoint (or in-process callers) to the
//! query thread via an mpsc channel. Each query carries a oneshot-style
//! channel for the response.

use std::sync::mpsc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::types::{MapSnapshot, Point3D, Pose3D};
use crate::error::Error;

/// Queries answered by the query thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryRequest {
    /// Full map graph across all maps.
    MapData {
        /// Include landmark positions.
        tracked_points: bool,
        /// Restrict landmarks to those observed by this keyframe.
        keyframe_id: Option<u64>,
    },

    /// Landmarks visible from a camera pose.
    LandmarksInView {
        /// Camera pose in the SLAM map frame.
        pose: Pose3D,
    },
}

/// Response data from a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryResponse {
    /// Map graph snapshot.
    MapData(MapSnapshot),

    /// Visible landmark positions, nearest first.
    LandmarksInView(Vec<Point3D>),
}

/// Result of a query.
pub type QueryResult = Result<QueryResponse, Error>;

/// Query with response channel.
pub struct QueryWithResponse {
    /// The query to answer.
    pub request: QueryRequest,
    /// Channel to send the response back.
    pub response_tx: mpsc::Sender<QueryResult>,
}

impl std::fmt::Debug for QueryWithResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryWithResponse")
            .field("request", &self.request)
            .field("response_tx", &"...")
            .finish()
    }
}

/// Sender end of the query channel (service endpoint, tests).
pub type QuerySender = mpsc::Sender<QueryWithResponse>;

/// Receiver end of the query channel (query thread).
pub type QueryReceiver = mpsc::Receiver<QueryWithResponse>;

/// Create a new query channel pair.
pub fn create_query_channel() -> (QuerySender, QueryReceiver) {
    mpsc::channel()
}

/// Send a query and wait for its response.
pub fn send_query_sync(sender: &QuerySender, request: QueryRequest, timeout_ms: u64) -> QueryResult {
    let (response_tx, response_rx) = mpsc::channel();

    sender
        .send(QueryWithResponse {
            request,
            response_tx,
        })
        .map_err(|_| Error::ChannelClosed("query thread not running"))?;

    response_rx
        .recv_timeout(Duration::from_millis(timeout_ms))
        .map_err(|e| match e {
            mpsc::RecvTimeoutError::Timeout => Error::Timeout(timeout_ms),
            mpsc::RecvTimeoutError::Disconnected => {
                Error::ChannelClosed("query dropped without response")
            }
        })?
}
