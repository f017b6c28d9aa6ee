//! # User-Store Benchmark - Main Entry Point
//!
//! Ties the pieces together:
//! 1. initialize colorized tracing output;
//! 2. parse CLI arguments and overlay the optional YAML config;
//! 3. build the record source factory (input file or generator) and the
//!    mode-to-operation table over one shared HTTP client;
//! 4. run either a single-operation pipeline or the full benchmark matrix;
//! 5. print summaries, write the report, and map failures to the exit code
//!    when `--fatal-errors` is set.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use user_bench::benchmark::{run_pipeline, Orchestrator, PipelineOptions};
use user_bench::cli::{Args, Command};
use user_bench::config::Settings;
use user_bench::ops::{OperationTable, UserStoreClient};
use user_bench::records::{GeneratedSource, RecordSourceFactory, StaticSource};
use user_bench::{logging, results};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let settings = Settings::resolve(args)?;
    info!(
        "user-bench {} against {}",
        user_bench::VERSION,
        settings.url
    );

    // Input files are parsed once, up front, so malformed input is a
    // configuration error surfaced before any pipeline starts.
    let factory: Box<dyn RecordSourceFactory> = match &settings.input_file {
        Some(path) => {
            let source = StaticSource::from_file(path)?;
            Box::new(source)
        }
        None => Box::new(GeneratedSource::new(settings.records)),
    };

    let client = Arc::new(UserStoreClient::new(settings.url.as_str(), settings.timeout)?);
    let table = OperationTable::for_client(client);

    match settings.command {
        Command::Benchmark => run_matrix(&settings, factory.as_ref(), &table).await,
        single => run_single(&settings, single, factory.as_ref(), &table).await,
    }
}

/// Run one operation mode over the full record set at a single concurrency.
async fn run_single(
    settings: &Settings,
    command: Command,
    factory: &dyn RecordSourceFactory,
    table: &OperationTable,
) -> Result<()> {
    // All non-benchmark commands map to exactly one mode.
    let mode = command
        .mode()
        .context("command does not map to an operation mode")?;
    let source = factory.create()?;
    let total = source.count();
    info!(
        "{}: {} records at concurrency {}",
        mode, total, settings.concurrency
    );

    let options = PipelineOptions {
        concurrency: settings.concurrency,
        progress: settings.progress,
        verbose: settings.verbose,
    };
    let stats = run_pipeline(source, table.operation(mode)?, &options).await?;

    results::print_run_summary(&mode.to_string(), &stats);
    if let Some(path) = &settings.output_file {
        results::write_run(mode, &stats, path)?;
    }

    if settings.fatal_errors && stats.failures > 0 {
        bail!("{} of {} operations failed", stats.failures, total);
    }
    Ok(())
}

/// Sweep the {mode} x {concurrency level} matrix and assemble the report.
async fn run_matrix(
    settings: &Settings,
    factory: &dyn RecordSourceFactory,
    table: &OperationTable,
) -> Result<()> {
    info!(
        "benchmark matrix: modes {:?} x levels {:?}",
        settings
            .modes
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>(),
        settings.levels
    );

    let orchestrator = Orchestrator::new(settings.modes.clone(), settings.levels.clone(), table)
        .with_progress(settings.progress)
        .with_verbose(settings.verbose)
        .with_fail_fast(settings.fail_fast);
    let report = orchestrator.run(factory).await?;

    results::print_report_summary(&report);
    if let Some(path) = &settings.output_file {
        results::write_report(&report, path)?;
    }

    if settings.fatal_errors {
        if report.has_errors() {
            bail!("one or more benchmark pairings failed; see report for details");
        }
        if report.total_failures() > 0 {
            bail!(
                "{} operations failed across the matrix",
                report.total_failures()
            );
        }
    }
    Ok(())
}
