//! State shared between the tracking lane and its fan-out consumers.
//!
//! This module provides:
//! - `TrackingStateHandle`: latest tracking result plus the tracked flag and
//!   frequency counter, written only by the tracking lane
//! - `QueryRequest`: on-demand map queries sent to the query thread
//! - Channel types for inter-thread communication

mod queries;
mod tracking;

pub use queries::{
    QueryReceiver, QueryRequest, QueryResponse, QueryResult, QuerySender, QueryWithResponse,
    create_query_channel, send_query_sync,
};
pub use tracking::{TrackedPose, TrackingState, TrackingStateHandle, create_tracking_state};
