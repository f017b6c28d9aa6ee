//! # Configuration Resolution
//!
//! Merges three layers into the runtime [`Settings`] the rest of the crate
//! consumes: built-in defaults, an optional YAML configuration file, and CLI
//! arguments. Precedence is CLI > file > defaults; a flag the user did not
//! pass falls back to the file value, then to the default.

use crate::cli::{parse_duration, Args, Command, Mode};
use crate::defaults;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Values accepted from the YAML configuration file.
///
/// Every field is optional; absent fields leave the corresponding setting
/// untouched. Unknown keys are rejected so typos surface as configuration
/// errors rather than silently ignored options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub url: Option<String>,
    pub input_file: Option<PathBuf>,
    pub records: Option<usize>,
    pub concurrency: Option<usize>,
    pub levels: Option<Vec<usize>>,
    pub modes: Option<Vec<Mode>>,
    /// Per-request timeout in the same format the CLI accepts (e.g. "500ms").
    pub timeout: Option<String>,
    pub output_file: Option<PathBuf>,
    pub fatal_errors: Option<bool>,
    pub fail_fast: Option<bool>,
}

impl FileConfig {
    /// Load and parse a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {:?}", path))
    }
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub command: Command,
    pub input_file: Option<PathBuf>,
    pub records: usize,
    pub concurrency: usize,
    pub levels: Vec<usize>,
    pub modes: Vec<Mode>,
    pub url: String,
    pub timeout: Option<Duration>,
    pub output_file: Option<PathBuf>,
    pub progress: bool,
    pub verbose: bool,
    pub fatal_errors: bool,
    pub fail_fast: bool,
}

impl Settings {
    /// Resolve settings from parsed CLI arguments, consulting the YAML file
    /// named by `--config` when present.
    pub fn resolve(args: Args) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(args, file)
    }

    fn merge(args: Args, file: FileConfig) -> Result<Self> {
        let file_timeout = file
            .timeout
            .as_deref()
            .map(|s| parse_duration(s).map_err(|e| anyhow::anyhow!("invalid timeout in config: {e}")))
            .transpose()?;

        let settings = Self {
            command: args.command,
            input_file: args.input_file.or(file.input_file),
            records: args
                .records
                .or(file.records)
                .unwrap_or(defaults::RECORD_COUNT),
            concurrency: args
                .concurrency
                .or(file.concurrency)
                .unwrap_or(defaults::CONCURRENCY),
            levels: args
                .levels
                .or(file.levels)
                .unwrap_or_else(|| defaults::CONCURRENCY_LEVELS.to_vec()),
            modes: Mode::expand_all(args.modes.or(file.modes).unwrap_or(vec![Mode::All])),
            url: args
                .url
                .or(file.url)
                .unwrap_or_else(|| defaults::BASE_URL.to_string()),
            timeout: args.timeout.or(file_timeout),
            output_file: args.output_file.or(file.output_file),
            progress: !args.no_progress,
            verbose: args.verbose,
            fatal_errors: args.fatal_errors || file.fatal_errors.unwrap_or(false),
            fail_fast: args.fail_fast || file.fail_fast.unwrap_or(false),
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        if self.levels.is_empty() {
            bail!("at least one concurrency level is required");
        }
        if let Some(level) = self.levels.iter().find(|&&l| l == 0) {
            bail!("concurrency level {} is invalid; levels must be at least 1", level);
        }
        if self.modes.is_empty() {
            bail!("at least one operation mode is required");
        }
        // The report is keyed by mode within each level, so a repeated mode
        // would run twice but keep only the last entry.
        let mut seen = std::collections::BTreeSet::new();
        if let Some(mode) = self.modes.iter().find(|&&m| !seen.insert(m)) {
            bail!("mode {} listed more than once", mode);
        }
        Ok(())
    }
}
