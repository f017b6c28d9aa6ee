//! # Pipeline Assembly and Matrix Orchestration
//!
//! [`run_pipeline`] wires one complete pass: record source -> bounded
//! executor -> broadcast hub -> {progress observer, statistics aggregator}
//! -> [`RunStats`]. The [`Orchestrator`] runs one such pass per (mode,
//! concurrency) pairing, strictly sequentially so pairings never compete
//! for the concurrency budget, and assembles the nested [`BenchmarkReport`]
//! keyed by concurrency level then mode.

use crate::cli::Mode;
use crate::defaults;
use crate::engine::{execute, Broadcast, StatsAggregator};
use crate::engine::{progress, DistributionSummary};
use crate::ops::{Operation, OperationTable};
use crate::records::{RecordSource, RecordSourceFactory};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Options shared by every pipeline pass.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub concurrency: usize,
    pub progress: bool,
    pub verbose: bool,
}

/// The complete statistics contract for one run: the latency distribution
/// plus success/failure counts, wall-clock duration, and throughput.
///
/// `rate` is successful operations per second of wall-clock time, zero for
/// an instantaneous or empty run. Values are unrounded; rounding belongs to
/// the reporting boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    #[serde(flatten)]
    pub distribution: DistributionSummary,
    pub successes: u64,
    pub failures: u64,
    pub total_duration_ms: f64,
    pub rate: f64,
}

/// One (mode, concurrency) pairing's entry in the report: either its stats
/// or the pipeline-level error that prevented them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunOutcome {
    Stats(RunStats),
    Error { error: String },
}

/// All runs for one concurrency level, keyed by mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyResults {
    pub concurrency: usize,
    pub tests: BTreeMap<Mode, RunOutcome>,
}

/// The nested matrix report: levels in declared order, each carrying one
/// entry per declared mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub timestamp: DateTime<Utc>,
    pub results: Vec<ConcurrencyResults>,
}

impl BenchmarkReport {
    /// Whether any pairing recorded a pipeline-level error.
    pub fn has_errors(&self) -> bool {
        self.results
            .iter()
            .flat_map(|level| level.tests.values())
            .any(|outcome| matches!(outcome, RunOutcome::Error { .. }))
    }

    /// Total failed operations across all completed pairings.
    pub fn total_failures(&self) -> u64 {
        self.results
            .iter()
            .flat_map(|level| level.tests.values())
            .map(|outcome| match outcome {
                RunOutcome::Stats(stats) => stats.failures,
                RunOutcome::Error { .. } => 0,
            })
            .sum()
    }
}

/// Run one full pipeline pass over `source` with `op`.
///
/// Subscriptions are established before the hub begins forwarding, so
/// every observer sees every result from the first one on. Wall-clock
/// duration spans from dispatch of the first record to completion of all
/// observers.
pub async fn run_pipeline(
    source: RecordSource,
    op: Operation,
    options: &PipelineOptions,
) -> Result<RunStats> {
    let total = source.count();
    debug!(
        "pipeline start: {} records, concurrency {}",
        total, options.concurrency
    );

    let started = Instant::now();
    let (results, executor) = execute(
        source.into_stream(),
        options.concurrency,
        move |record| {
            let op = Operation::clone(&op);
            async move { op(record).await }
        },
        options.verbose,
    );

    let mut hub = Broadcast::new(results, defaults::BROADCAST_BUFFER);
    let stats_subscription = hub.subscribe();
    let progress_task = if options.progress {
        let subscription = hub.subscribe();
        Some(tokio::spawn(progress::observe(subscription, total as u64)))
    } else {
        None
    };
    let hub_task = hub.spawn();
    let stats_task = tokio::spawn(StatsAggregator::aggregate(stats_subscription));

    // The aggregator resolves when the hub closes its subscription, which
    // happens once the executor has emitted every result.
    let totals = stats_task
        .await
        .context("statistics aggregator task failed")?;
    hub_task.await.context("broadcast hub task failed")?;
    if let Some(task) = progress_task {
        task.await.context("progress observer task failed")?;
    }
    executor
        .await
        .context("executor task failed")?
        .context("executor aborted")?;

    let total_duration_ms = started.elapsed().as_secs_f64() * 1000.0;
    let rate = if total_duration_ms > 0.0 {
        totals.successes as f64 / (total_duration_ms / 1000.0)
    } else {
        0.0
    };

    Ok(RunStats {
        distribution: totals.summary,
        successes: totals.successes,
        failures: totals.failures,
        total_duration_ms,
        rate,
    })
}

/// Sweeps the {mode} x {concurrency level} matrix.
pub struct Orchestrator<'a> {
    modes: Vec<Mode>,
    levels: Vec<usize>,
    table: &'a OperationTable,
    progress: bool,
    verbose: bool,
    /// Abort the whole matrix on the first pairing that fails at pipeline
    /// level, instead of recording an error entry and moving on.
    fail_fast: bool,
}

impl<'a> Orchestrator<'a> {
    pub fn new(modes: Vec<Mode>, levels: Vec<usize>, table: &'a OperationTable) -> Self {
        Self {
            modes,
            levels,
            table,
            progress: false,
            verbose: false,
            fail_fast: false,
        }
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Run the full matrix: levels in declared order, modes in declared
    /// order within each level, one fresh record stream per pairing, no
    /// overlap between pairings.
    pub async fn run(&self, factory: &dyn RecordSourceFactory) -> Result<BenchmarkReport> {
        let timestamp = Utc::now();
        let mut results = Vec::with_capacity(self.levels.len());

        for &concurrency in &self.levels {
            let mut tests = BTreeMap::new();
            for &mode in &self.modes {
                info!("running {} at concurrency {}", mode, concurrency);
                let outcome = match self.run_pairing(factory, mode, concurrency).await {
                    Ok(stats) => RunOutcome::Stats(stats),
                    Err(e) if self.fail_fast => {
                        return Err(e).with_context(|| {
                            format!("{} at concurrency {} failed", mode, concurrency)
                        });
                    }
                    Err(e) => {
                        warn!(
                            "{} at concurrency {} failed: {:#}; continuing",
                            mode, concurrency, e
                        );
                        RunOutcome::Error {
                            error: format!("{:#}", e),
                        }
                    }
                };
                tests.insert(mode, outcome);
            }
            results.push(ConcurrencyResults { concurrency, tests });
        }

        Ok(BenchmarkReport { timestamp, results })
    }

    async fn run_pairing(
        &self,
        factory: &dyn RecordSourceFactory,
        mode: Mode,
        concurrency: usize,
    ) -> Result<RunStats> {
        let source = factory.create().context("failed to create record source")?;
        let op = self.table.operation(mode)?;
        let options = PipelineOptions {
            concurrency,
            progress: self.progress,
            verbose: self.verbose,
        };
        run_pipeline(source, op, &options).await
    }
}
