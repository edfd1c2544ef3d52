//! Approximate-time stereo pairing.
//!
//! Left and right images arrive independently. Each side keeps a short
//! lookback queue; a new image is matched against the nearest timestamp on
//! the opposite side:
//!
//! ```text
//! left:   L1      L2        L3
//! right:     R1        R2 R3
//!            │         │
//!  push(R1) ─┘ pairs L1 (|ΔT| < tolerance)
//!  push(R2) ──────────┘ pairs L2, nothing older left
//!  push(R3)  no left candidate → queued until L3 arrives
//! ```
//!
//! After a pair is emitted everything older on both sides is stale and
//! discarded. No interpolation.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::core::types::{ImageFrame, StereoFrame};

/// Which camera an image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StereoSide {
    Left,
    Right,
}

/// Synchronizer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Pair only when |left.ts - right.ts| is strictly below this
    pub max_interval_us: u64,
    /// Lookback queue length per side
    pub queue_depth: usize,
    /// Images buffered between ingest and the tracking lane
    pub image_queue_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_interval_us: 20_000,
            queue_depth: 10,
            image_queue_capacity: 32,
        }
    }
}

/// Pairing statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Pairs emitted
    pub paired: u64,
    /// Images discarded as stale or by queue overflow
    pub dropped: u64,
}

/// Pairs two timestamped image streams.
///
/// Not thread-safe by itself; owned by the tracking thread.
#[derive(Debug)]
pub struct StereoSynchronizer {
    config: SyncConfig,
    left: VecDeque<ImageFrame>,
    right: VecDeque<ImageFrame>,
    stats: SyncStats,
}

impl StereoSynchronizer {
    pub fn new(config: SyncConfig) -> Self {
        let depth = config.queue_depth;
        Self {
            config,
            left: VecDeque::with_capacity(depth + 1),
            right: VecDeque::with_capacity(depth + 1),
            stats: SyncStats::default(),
        }
    }

    #[inline]
    pub fn push_left(&mut self, image: ImageFrame) -> Option<StereoFrame> {
        self.push(StereoSide::Left, image)
    }

    #[inline]
    pub fn push_right(&mut self, image: ImageFrame) -> Option<StereoFrame> {
        self.push(StereoSide::Right, image)
    }

    /// Offer one image; returns a pair when it matches the opposite side.
    pub fn push(&mut self, side: StereoSide, image: ImageFrame) -> Option<StereoFrame> {
        let max_interval_us = self.config.max_interval_us;
        let queue_depth = self.config.queue_depth;
        let (own, other) = match side {
            StereoSide::Left => (&mut self.left, &mut self.right),
            StereoSide::Right => (&mut self.right, &mut self.left),
        };

        // Nearest candidate; earliest wins a tie
        let best = other
            .iter()
            .enumerate()
            .min_by_key(|(i, candidate)| (candidate.timestamp_us.abs_diff(image.timestamp_us), *i))
            .map(|(i, candidate)| (i, candidate.timestamp_us.abs_diff(image.timestamp_us)));

        match best {
            Some((index, interval)) if interval < max_interval_us => {
                // Everything before the match on the other side is stale
                let mut dropped = index as u64;
                other.drain(..index);
                let matched = other.pop_front()?;

                // Own side: keep only images newer than the one just paired
                let own_before = own.len();
                own.retain(|queued| queued.timestamp_us > image.timestamp_us);
                dropped += (own_before - own.len()) as u64;

                self.stats.dropped += dropped;
                self.stats.paired += 1;
                if dropped > 0 {
                    log::trace!("Stereo sync: {} stale images dropped", dropped);
                }

                let (left, right) = match side {
                    StereoSide::Left => (image, matched),
                    StereoSide::Right => (matched, image),
                };
                Some(StereoFrame { left, right })
            }
            _ => {
                own.push_back(image);
                while own.len() > queue_depth {
                    own.pop_front();
                    self.stats.dropped += 1;
                }
                None
            }
        }
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Images currently waiting on (left, right).
    pub fn pending(&self) -> (usize, usize) {
        (self.left.len(), self.right.len())
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }
}
