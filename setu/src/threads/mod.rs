//! Thread management for the bridge daemon.
//!
//! This module provides:
//! - `TrackingThread`: stereo pairing and the single tracking lane
//! - `PublisherThread`: periodic map-data and landmark-cloud publishing
//! - `QueryThread`: on-demand map queries

mod publisher_thread;
mod query_thread;
mod tracking_thread;

pub use publisher_thread::{
    LandmarkCloudPublisher, MapDataPublisher, MapDataReport, PublisherThread,
};
pub use query_thread::{QueryOutputs, QueryService, QueryThread};
pub use tracking_thread::{TrackingLane, TrackingThread};
