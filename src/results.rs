//! # Report Output
//!
//! The reporting boundary: rounding, serialization, and console summaries.
//! Statistics accumulate at full precision inside the engine; everything
//! written or printed here is rounded first, to 3 decimal places for
//! time-based fields and 2 for rates.
//!
//! Two sinks are supported, chosen by the output file extension: a pretty
//! JSON document mirroring the nested report structure, and a flat CSV with
//! one row per (concurrency, mode) pairing.

use crate::benchmark::{BenchmarkReport, RunOutcome, RunStats};
use crate::cli::Mode;
use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::info;

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

impl RunStats {
    /// A copy with reporting-boundary rounding applied: 3 decimals for
    /// time-based fields, 2 for the rate.
    pub fn rounded(&self) -> RunStats {
        let mut stats = self.clone();
        stats.distribution.min = round_to(stats.distribution.min, 3);
        stats.distribution.mean = round_to(stats.distribution.mean, 3);
        stats.distribution.stddev = round_to(stats.distribution.stddev, 3);
        stats.distribution.p50 = round_to(stats.distribution.p50, 3);
        stats.distribution.p90 = round_to(stats.distribution.p90, 3);
        stats.distribution.p95 = round_to(stats.distribution.p95, 3);
        stats.distribution.p99 = round_to(stats.distribution.p99, 3);
        stats.distribution.max = round_to(stats.distribution.max, 3);
        stats.total_duration_ms = round_to(stats.total_duration_ms, 3);
        stats.rate = round_to(stats.rate, 2);
        stats
    }
}

impl BenchmarkReport {
    /// A copy with every completed pairing's stats rounded.
    pub fn rounded(&self) -> BenchmarkReport {
        let mut report = self.clone();
        for level in &mut report.results {
            for outcome in level.tests.values_mut() {
                if let RunOutcome::Stats(stats) = outcome {
                    *stats = stats.rounded();
                }
            }
        }
        report
    }
}

/// Write a matrix report to `path`, as JSON or CSV by extension.
pub fn write_report(report: &BenchmarkReport, path: &Path) -> Result<()> {
    let report = report.rounded();
    match extension_of(path).as_str() {
        "json" => {
            let json = serde_json::to_string_pretty(&report)
                .context("failed to serialize benchmark report")?;
            std::fs::write(path, json)
                .with_context(|| format!("failed to write report to {:?}", path))?;
        }
        "csv" => write_report_csv(&report, path)?,
        other => bail!("unsupported report format {:?}; expected .json or .csv", other),
    }
    info!("report written to {:?}", path);
    Ok(())
}

/// Write a single run's stats to `path`, as JSON or CSV by extension.
pub fn write_run(mode: Mode, stats: &RunStats, path: &Path) -> Result<()> {
    let stats = stats.rounded();
    match extension_of(path).as_str() {
        "json" => {
            let json =
                serde_json::to_string_pretty(&stats).context("failed to serialize run stats")?;
            std::fs::write(path, json)
                .with_context(|| format!("failed to write results to {:?}", path))?;
        }
        "csv" => {
            let mut writer = csv::Writer::from_path(path)
                .with_context(|| format!("failed to open {:?}", path))?;
            writer.write_record(CSV_HEADER)?;
            writer.write_record(csv_row(None, mode, &RunOutcome::Stats(stats)))?;
            writer.flush()?;
        }
        other => bail!("unsupported report format {:?}; expected .json or .csv", other),
    }
    info!("results written to {:?}", path);
    Ok(())
}

const CSV_HEADER: &[&str] = &[
    "concurrency",
    "mode",
    "count",
    "successes",
    "failures",
    "min",
    "mean",
    "stddev",
    "p50",
    "p90",
    "p95",
    "p99",
    "max",
    "total_duration_ms",
    "rate",
    "error",
];

fn write_report_csv(report: &BenchmarkReport, path: &Path) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("failed to open {:?}", path))?;
    writer.write_record(CSV_HEADER)?;
    for level in &report.results {
        for (mode, outcome) in &level.tests {
            writer.write_record(csv_row(Some(level.concurrency), *mode, outcome))?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn csv_row(concurrency: Option<usize>, mode: Mode, outcome: &RunOutcome) -> Vec<String> {
    let concurrency = concurrency.map(|c| c.to_string()).unwrap_or_default();
    match outcome {
        RunOutcome::Stats(stats) => {
            let d = &stats.distribution;
            vec![
                concurrency,
                mode.to_string(),
                d.count.to_string(),
                stats.successes.to_string(),
                stats.failures.to_string(),
                d.min.to_string(),
                d.mean.to_string(),
                d.stddev.to_string(),
                d.p50.to_string(),
                d.p90.to_string(),
                d.p95.to_string(),
                d.p99.to_string(),
                d.max.to_string(),
                stats.total_duration_ms.to_string(),
                stats.rate.to_string(),
                String::new(),
            ]
        }
        RunOutcome::Error { error } => {
            let mut row = vec![concurrency, mode.to_string()];
            row.extend(std::iter::repeat(String::new()).take(CSV_HEADER.len() - 3));
            row.push(error.clone());
            row
        }
    }
}

/// Print one run's summary. Always emitted for a completed run, even with
/// a 100% failure rate; the distribution then reflects failed-but-timed
/// operations.
pub fn print_run_summary(label: &str, stats: &RunStats) {
    let stats = stats.rounded();
    let d = &stats.distribution;
    info!("--- {} ---", label);
    info!(
        "  operations: {} ({} ok, {} failed)",
        d.count, stats.successes, stats.failures
    );
    info!("  latency ms: min {} / mean {} / max {}", d.min, d.mean, d.max);
    info!(
        "  percentiles: p50 {} / p90 {} / p95 {} / p99 {}",
        d.p50, d.p90, d.p95, d.p99
    );
    info!("  stddev: {}ms", d.stddev);
    info!(
        "  wall clock: {}ms ({} ok/s)",
        stats.total_duration_ms, stats.rate
    );
}

/// Print the matrix report summary, level by level.
pub fn print_report_summary(report: &BenchmarkReport) {
    for level in &report.results {
        for (mode, outcome) in &level.tests {
            let label = format!("{} @ c={}", mode, level.concurrency);
            match outcome {
                RunOutcome::Stats(stats) => print_run_summary(&label, stats),
                RunOutcome::Error { error } => info!("--- {} --- failed: {}", label, error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DistributionSummary;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn sample_stats() -> RunStats {
        RunStats {
            distribution: DistributionSummary {
                count: 3,
                min: 1.23456,
                mean: 2.34567,
                stddev: 0.98765,
                p50: 2.0001,
                p90: 3.0,
                p95: 3.0,
                p99: 3.0,
                max: 3.45678,
            },
            successes: 2,
            failures: 1,
            total_duration_ms: 123.45678,
            rate: 16.20411,
        }
    }

    #[test]
    fn test_rounding_boundary() {
        let rounded = sample_stats().rounded();
        assert_eq!(rounded.distribution.min, 1.235);
        assert_eq!(rounded.distribution.mean, 2.346);
        assert_eq!(rounded.total_duration_ms, 123.457);
        assert_eq!(rounded.rate, 16.2);
        // Counts are untouched.
        assert_eq!(rounded.successes, 2);
        assert_eq!(rounded.failures, 1);
    }

    #[test]
    fn test_json_report_round_trip() {
        let mut tests = BTreeMap::new();
        tests.insert(Mode::Create, RunOutcome::Stats(sample_stats()));
        tests.insert(
            Mode::Query,
            RunOutcome::Error {
                error: "connection refused".to_string(),
            },
        );
        let report = BenchmarkReport {
            timestamp: Utc::now(),
            results: vec![crate::benchmark::ConcurrencyResults {
                concurrency: 4,
                tests,
            }],
        };

        let file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write_report(&report, file.path()).unwrap();

        let contents = std::fs::read_to_string(file.path()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["results"][0]["concurrency"], 4);
        assert_eq!(parsed["results"][0]["tests"]["create"]["successes"], 2);
        assert_eq!(
            parsed["results"][0]["tests"]["query"]["error"],
            "connection refused"
        );
    }

    #[test]
    fn test_csv_report_rows() {
        let mut tests = BTreeMap::new();
        tests.insert(Mode::Create, RunOutcome::Stats(sample_stats()));
        let report = BenchmarkReport {
            timestamp: Utc::now(),
            results: vec![crate::benchmark::ConcurrencyResults {
                concurrency: 2,
                tests,
            }],
        };

        let file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write_report(&report, file.path()).unwrap();

        let contents = std::fs::read_to_string(file.path()).unwrap();
        let mut lines = contents.lines();
        assert!(lines.next().unwrap().starts_with("concurrency,mode,count"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("2,create,3,2,1,"));
    }

    #[test]
    fn test_unsupported_extension() {
        let stats = sample_stats();
        assert!(write_run(Mode::Load, &stats, Path::new("out.xml")).is_err());
    }
}
