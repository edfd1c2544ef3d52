//! Setu - orchestration bridge for stereo visual-inertial SLAM
//!
//! Sits between a tracking engine and a message bus: pairs stereo images,
//! feeds them to the engine one at a time, and fans the results out to
//! periodic publishers, the map transform broadcast and on-demand queries.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │               daemon, io/streaming                  │  ← Wiring, TCP endpoints
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                    threads/                         │  ← Tracking, publishers, queries
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │      ingest, transform, state/, sync/               │  ← Orchestration
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                    engine/                          │  ← Tracking engine contract
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     core/                           │  ← Foundation
//! │                (types, clock)                       │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod core;
pub mod daemon;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod io;
pub mod state;
pub mod sync;
pub mod threads;
pub mod transform;
pub mod utils;

pub use config::SetuConfig;
pub use daemon::{Daemon, DaemonSummary};
pub use error::{Error, Result};
