//! # Result Pipeline Engine
//!
//! The concurrency core of the benchmark. One pipeline run consists of:
//!
//! 1. the [`executor`] consuming the record stream with at most
//!    `concurrency` operations in flight, emitting one timed [`OpResult`]
//!    per record;
//! 2. the [`broadcast`] hub republishing every result, in emission order,
//!    to each subscriber's independent bounded queue;
//! 3. the observers: [`progress`] renders cumulative completion, [`stats`]
//!    folds the stream into latency and success statistics.
//!
//! Invariant: for every record consumed, exactly one result is eventually
//! emitted, and the output stream closes once all results are out. There is
//! no ordering guarantee between input order and emission order.

pub mod broadcast;
pub mod executor;
pub mod progress;
pub mod stats;

pub use broadcast::Broadcast;
pub use executor::execute;
pub use stats::{DistributionSummary, RunTotals, StatsAggregator};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The broadcastable unit: one record's outcome enriched with timing.
///
/// Immutable once emitted. `key` is the record's email, carried only for
/// logging and correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpResult {
    pub key: String,
    pub success: bool,
    pub duration_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OpResult {
    pub fn success(key: impl Into<String>, duration_ms: f64) -> Self {
        Self {
            key: key.into(),
            success: true,
            duration_ms,
            error: None,
        }
    }

    pub fn failure(key: impl Into<String>, duration_ms: f64, error: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            success: false,
            duration_ms,
            error: Some(error.into()),
        }
    }
}

/// Fatal engine errors.
///
/// Per-record operation failures are never fatal; they become `OpResult`s
/// with `success = false`. Only the machinery itself failing ends a run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("result channel closed before all results were emitted")]
    ChannelClosed,
}
