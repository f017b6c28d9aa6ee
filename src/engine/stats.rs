//! # Streaming Statistics Aggregator
//!
//! Folds one broadcast subscription into latency and success statistics in
//! a single pass. Mean and standard deviation use Welford's incremental
//! update, min/max are direct comparisons, and success/failure counts come
//! from each result's flag, so accumulation is O(1) per result.
//!
//! Percentiles are exact nearest-rank, computed once at stream closure over
//! the retained duration samples: sort ascending and take
//! `ceil(p * count) - 1`, clamped to the valid index range. Retaining one
//! f64 per record is the documented trade for exact, reproducible
//! percentiles over a finite input set; no approximate estimator is used.
//!
//! All values are accumulated at full precision; rounding happens only at
//! the reporting boundary (see [`crate::results`]).

use super::OpResult;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Aggregated latency statistics over one run's durations, in milliseconds.
///
/// All fields are `0` for an empty run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub count: u64,
    pub min: f64,
    pub mean: f64,
    pub stddev: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
}

/// What one full aggregation pass produces: the latency distribution plus
/// the success/failure split. The orchestrator adds wall-clock duration and
/// rate on top to form a `RunStats`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunTotals {
    pub summary: DistributionSummary,
    pub successes: u64,
    pub failures: u64,
}

/// Single-consumer accumulator over a result stream.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    durations: Vec<f64>,
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
    successes: u64,
    failures: u64,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one result into the running accumulators.
    pub fn record(&mut self, result: &OpResult) {
        let duration = result.duration_ms;
        self.count += 1;

        // Welford's update keeps mean/variance numerically stable without
        // a raw sum-of-squares.
        let delta = duration - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (duration - self.mean);

        if self.count == 1 {
            self.min = duration;
            self.max = duration;
        } else {
            self.min = self.min.min(duration);
            self.max = self.max.max(duration);
        }

        self.durations.push(duration);

        if result.success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
    }

    /// Finish the pass: sort the retained samples once and produce the
    /// totals.
    pub fn finish(mut self) -> RunTotals {
        let summary = if self.count == 0 {
            DistributionSummary::default()
        } else {
            self.durations
                .sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            DistributionSummary {
                count: self.count,
                min: self.min,
                mean: self.mean,
                stddev: (self.m2 / self.count as f64).sqrt(),
                p50: nearest_rank(&self.durations, 0.50),
                p90: nearest_rank(&self.durations, 0.90),
                p95: nearest_rank(&self.durations, 0.95),
                p99: nearest_rank(&self.durations, 0.99),
                max: self.max,
            }
        };
        RunTotals {
            summary,
            successes: self.successes,
            failures: self.failures,
        }
    }

    /// Consume a broadcast subscription to closure and fold every result.
    pub async fn aggregate(mut subscription: mpsc::Receiver<OpResult>) -> RunTotals {
        let mut aggregator = Self::new();
        while let Some(result) = subscription.recv().await {
            aggregator.record(&result);
        }
        let totals = aggregator.finish();
        debug!(
            "aggregated {} results: {} ok, {} failed",
            totals.summary.count, totals.successes, totals.failures
        );
        totals
    }
}

/// Exact nearest-rank percentile over ascending-sorted samples:
/// 1-indexed rank `ceil(p * count)`, clamped to the sample range.
fn nearest_rank(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p * sorted.len() as f64).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted.len() - 1);
    sorted[index]
}
