//! # User-Store Benchmark Library
//!
//! A load and latency benchmark for remote user-store services. The library
//! drives a configurable user-record operation (create, load, delete, query)
//! against a finite stream of input records under a bounded concurrency cap,
//! fans the per-record results out to independent observers, and folds them
//! into streaming latency and success statistics.
//!
//! ## Architecture Overview
//!
//! The library is organized into several key modules:
//!
//! - `engine`: the bounded executor, broadcast hub, progress observer, and
//!   streaming statistics aggregator that form the result pipeline
//! - `benchmark`: pipeline assembly and the orchestrator that sweeps an
//!   {operation mode} x {concurrency level} matrix into a nested report
//! - `records`: input record model plus JSON, CSV, and generated sources
//! - `ops`: the HTTP user-store client and the mode-to-operation table
//! - `cli`: command-line interface parsing and mode selection
//! - `config`: optional YAML configuration overlaying CLI arguments
//! - `results`: report rounding, serialization (JSON/CSV), and console output
//!
//! ## Pipeline
//!
//! ```text
//! RecordSource -> BoundedExecutor -> Broadcast -> { Progress, Stats } -> RunStats
//! ```
//!
//! Every record produces exactly one result on the executor's output stream,
//! regardless of operation success; the stream closes once all in-flight
//! operations have settled. Each broadcast subscriber observes every result
//! in emission order exactly once. Completion order is not input order: the
//! executor optimizes for throughput under the concurrency cap.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use user_bench::benchmark::{run_pipeline, PipelineOptions};
//! use user_bench::ops::{OperationTable, UserStoreClient};
//! use user_bench::records::RecordSource;
//! use user_bench::cli::Mode;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Arc::new(UserStoreClient::new("http://127.0.0.1:8080", None)?);
//!     let table = OperationTable::for_client(client);
//!     let source = RecordSource::generated(1000);
//!     let options = PipelineOptions {
//!         concurrency: 16,
//!         progress: true,
//!         verbose: false,
//!     };
//!     let stats = run_pipeline(source, table.operation(Mode::Create)?, &options).await?;
//!     println!("mean latency: {:.3}ms", stats.distribution.mean);
//!     Ok(())
//! }
//! ```

/// Pipeline assembly and matrix orchestration
///
/// Contains `run_pipeline`, which wires one executor/broadcast/aggregator
/// pass, and the `Orchestrator` that runs one such pass per (mode,
/// concurrency) pairing, strictly sequentially, assembling the final report.
pub mod benchmark;

/// Command-line interface and mode selection
pub mod cli;

/// YAML configuration file overlay and resolved runtime settings
pub mod config;

/// Core result pipeline: bounded executor, broadcast hub, observers
///
/// The engine is agnostic to what the operation does; it guarantees one
/// timed result per record, the concurrency cap, and exactly-once delivery
/// to every subscriber.
pub mod engine;

/// Colorized tracing output for user-facing log lines
pub mod logging;

/// The HTTP user-store client and the operation capability table
pub mod ops;

/// Input records and their sources (JSON files, CSV files, generated)
pub mod records;

/// Report rounding, JSON/CSV serialization, and console summaries
pub mod results;

// Re-export the types most library users need.
pub use benchmark::{BenchmarkReport, Orchestrator, RunStats};
pub use cli::{Args, Mode};
pub use engine::OpResult;
pub use ops::{OperationTable, UserStoreClient};
pub use records::{Record, RecordSource};

/// The current version of the benchmark, taken from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values.
pub mod defaults {
    /// Number of generated records when no input file is supplied.
    pub const RECORD_COUNT: usize = 1000;

    /// Concurrency cap for single-mode runs.
    ///
    /// Four in-flight requests is a conservative default that exercises
    /// concurrency without overwhelming a development-sized service.
    pub const CONCURRENCY: usize = 4;

    /// Concurrency levels swept by the benchmark matrix.
    pub const CONCURRENCY_LEVELS: &[usize] = &[1, 2, 4, 8, 16];

    /// Base URL of the user-store service.
    pub const BASE_URL: &str = "http://127.0.0.1:8080";

    /// Per-subscriber buffer size for the broadcast hub.
    ///
    /// Large enough that observers rarely stall the pipeline, small enough
    /// that a wedged subscriber applies backpressure before results pile up
    /// without bound.
    pub const BROADCAST_BUFFER: usize = 256;
}
