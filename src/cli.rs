use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// User-Store Benchmark - drive user-record operations against a remote service
#[derive(Parser, Debug, Clone)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// What to run: a single operation over the input records, or the full
    /// benchmark matrix
    #[clap(value_enum)]
    pub command: Command,

    /// Input file containing user records (JSON array or CSV with header)
    #[clap(short = 'f', long)]
    pub input_file: Option<PathBuf>,

    /// Number of records to generate when no input file is given
    #[clap(short = 'n', long)]
    pub records: Option<usize>,

    /// Number of operations kept in flight concurrently
    #[clap(short = 'c', long)]
    pub concurrency: Option<usize>,

    /// Concurrency levels swept by the benchmark matrix
    #[clap(long, num_args = 1..)]
    pub levels: Option<Vec<usize>>,

    /// Operation modes swept by the benchmark matrix (or "all")
    #[clap(long, value_enum, num_args = 1..)]
    pub modes: Option<Vec<Mode>>,

    /// Base URL of the user-store service
    #[clap(short = 'u', long)]
    pub url: Option<String>,

    /// Per-request timeout (e.g. "500ms", "10s"); unset means no timeout
    #[clap(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Output file for the report; format chosen by extension (.json or .csv)
    #[clap(short = 'o', long)]
    pub output_file: Option<PathBuf>,

    /// Disable the live progress indicator
    #[clap(long)]
    pub no_progress: bool,

    /// Log every failed operation at error level instead of trace
    #[clap(short = 'v', long)]
    pub verbose: bool,

    /// Exit nonzero if any operation failed
    #[clap(long)]
    pub fatal_errors: bool,

    /// Abort the benchmark matrix on the first failed pairing
    #[clap(long)]
    pub fail_fast: bool,

    /// YAML configuration file; CLI flags take precedence over its values
    #[clap(long)]
    pub config: Option<PathBuf>,
}

/// Top-level command: a single operation run or the full matrix sweep.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Command {
    /// Create one user per record
    Create,
    /// Load each user by its email key
    Load,
    /// Delete each user by its email key
    Delete,
    /// Query the user index by email
    Query,
    /// Sweep the full {mode} x {concurrency} matrix
    Benchmark,
}

impl Command {
    /// The single operation mode this command maps to, if any.
    pub fn mode(&self) -> Option<Mode> {
        match self {
            Command::Create => Some(Mode::Create),
            Command::Load => Some(Mode::Load),
            Command::Delete => Some(Mode::Delete),
            Command::Query => Some(Mode::Query),
            Command::Benchmark => None,
        }
    }
}

/// Operation modes runnable against the user store.
///
/// This is a closed enumeration; the mapping from mode to operation function
/// is built once at startup (see [`crate::ops::OperationTable`]), never
/// dispatched by name at runtime.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[clap(name = "create")]
    Create,

    #[clap(name = "load")]
    Load,

    #[clap(name = "delete")]
    Delete,

    #[clap(name = "query")]
    Query,

    /// All operation modes
    #[clap(name = "all")]
    All,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Create => write!(f, "create"),
            Mode::Load => write!(f, "load"),
            Mode::Delete => write!(f, "delete"),
            Mode::Query => write!(f, "query"),
            Mode::All => write!(f, "all"),
        }
    }
}

impl Mode {
    /// Expand the "all" variant to the concrete mode list.
    pub fn expand_all(modes: Vec<Mode>) -> Vec<Mode> {
        if modes.contains(&Mode::All) {
            vec![Mode::Create, Mode::Load, Mode::Delete, Mode::Query]
        } else {
            modes
        }
    }
}

/// Parse duration from string (e.g. "250ms", "10s", "5m", "1h")
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    let (num_str, unit) = if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, "ms")
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, "s")
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, "m")
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, "h")
    } else {
        (s, "s") // Default to seconds
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number in duration: {}", num_str))?;
    if !num.is_finite() || num < 0.0 {
        return Err(format!("Invalid duration value: {}", num_str));
    }

    // Fractional values are honored ("0.5s" is 500ms, not zero).
    let seconds = match unit {
        "ms" => num / 1000.0,
        "s" => num,
        "m" => num * 60.0,
        "h" => num * 3600.0,
        _ => return Err(format!("Invalid duration unit: {}", unit)),
    };

    Ok(Duration::from_secs_f64(seconds))
}
