//! # Input Records and Their Sources
//!
//! A [`Record`] is one unit of input: a user payload identified by an
//! email-like key. Records come from a JSON array file, a CSV file with a
//! header row, or a built-in generator that fabricates plausible user data
//! for seeding runs.
//!
//! Sources are finite and countable: a [`RecordSource`] knows its record
//! count up front (the progress observer needs it) and yields exactly that
//! many records. The benchmark matrix needs a *fresh* stream per (mode,
//! concurrency) pairing, so sources are produced by a
//! [`RecordSourceFactory`] rather than shared across runs.
//!
//! File problems are configuration failures: they surface here, before any
//! pipeline starts, and are distinct from per-record operation failures.

use futures::Stream;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One unit of input data: a user payload keyed by email.
///
/// The email is used as the identifying key for logging and correlation;
/// the remaining fields are an opaque payload forwarded to the operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub email: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            fields: Map::new(),
        }
    }
}

/// Errors raised while loading or validating an input source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read input file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse input file {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("record {index} in {path:?} has no email key")]
    MissingKey { path: PathBuf, index: usize },

    #[error("unsupported input format {extension:?}; expected .json or .csv")]
    UnsupportedFormat { extension: String },
}

/// A finite, countable sequence of records.
#[derive(Debug, Clone)]
pub struct RecordSource {
    records: Vec<Record>,
}

impl RecordSource {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// The number of records this source will yield.
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Consume the source into a stream yielding exactly `count()` records.
    pub fn into_stream(self) -> impl Stream<Item = Record> + Send + 'static {
        futures::stream::iter(self.records)
    }

    /// Load records from a JSON or CSV file, chosen by extension.
    pub fn from_file(path: &Path) -> Result<Self, SourceError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match extension.as_str() {
            "json" => Self::from_json(path),
            "csv" => Self::from_csv(path),
            other => Err(SourceError::UnsupportedFormat {
                extension: other.to_string(),
            }),
        }
    }

    /// Load a JSON array of user objects. Each object must carry an `email`
    /// string; all other members become payload fields.
    fn from_json(path: &Path) -> Result<Self, SourceError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let values: Vec<Map<String, Value>> =
            serde_json::from_str(&contents).map_err(|e| SourceError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let mut records = Vec::with_capacity(values.len());
        for (index, mut fields) in values.into_iter().enumerate() {
            let email = match fields.remove("email") {
                Some(Value::String(email)) if !email.is_empty() => email,
                _ => {
                    return Err(SourceError::MissingKey {
                        path: path.to_path_buf(),
                        index,
                    })
                }
            };
            records.push(Record { email, fields });
        }
        Ok(Self::new(records))
    }

    /// Load a CSV file with a header row; the `email` column is the key and
    /// every other column becomes a string payload field.
    fn from_csv(path: &Path) -> Result<Self, SourceError> {
        let mut reader = csv::Reader::from_path(path).map_err(|e| SourceError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let headers = reader
            .headers()
            .map_err(|e| SourceError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
            .clone();

        let mut records = Vec::new();
        for (index, row) in reader.records().enumerate() {
            let row = row.map_err(|e| SourceError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

            let mut email = None;
            let mut fields = Map::new();
            for (header, value) in headers.iter().zip(row.iter()) {
                if header == "email" {
                    if !value.is_empty() {
                        email = Some(value.to_string());
                    }
                } else {
                    fields.insert(header.to_string(), Value::String(value.to_string()));
                }
            }

            let email = email.ok_or(SourceError::MissingKey {
                path: path.to_path_buf(),
                index,
            })?;
            records.push(Record { email, fields });
        }
        Ok(Self::new(records))
    }

    /// Fabricate `count` user records with unique email keys.
    pub fn generated(count: usize) -> Self {
        let mut rng = rand::thread_rng();
        let records = (0..count)
            .map(|i| {
                let first = FIRST_NAMES[rng.gen_range(0..FIRST_NAMES.len())];
                let last = LAST_NAMES[rng.gen_range(0..LAST_NAMES.len())];
                let mut fields = Map::new();
                fields.insert("first_name".to_string(), Value::String(first.to_string()));
                fields.insert("last_name".to_string(), Value::String(last.to_string()));
                fields.insert("age".to_string(), Value::from(rng.gen_range(18..90)));
                Record {
                    // The index keeps keys unique across the whole batch.
                    email: format!(
                        "{}.{}.{:06}@example.net",
                        first.to_ascii_lowercase(),
                        last.to_ascii_lowercase(),
                        i
                    ),
                    fields,
                }
            })
            .collect();
        Self::new(records)
    }
}

const FIRST_NAMES: &[&str] = &[
    "alice", "bruno", "carol", "dmitri", "elena", "felix", "grace", "hiro", "ines", "jonas",
    "karin", "liam", "mira", "nadia", "oscar", "priya",
];

const LAST_NAMES: &[&str] = &[
    "anders", "brown", "chen", "diaz", "evans", "fischer", "garcia", "haruki", "ivanov", "jensen",
    "kim", "lopez", "moreau", "novak", "okafor", "patel",
];

/// Produces a fresh [`RecordSource`] per benchmark run.
///
/// The matrix orchestrator must not share one consumed stream across runs;
/// each (mode, concurrency) pairing asks the factory for a new source.
pub trait RecordSourceFactory: Send + Sync {
    fn create(&self) -> Result<RecordSource, SourceError>;
}

/// A factory that replays a fixed record set loaded once up front.
///
/// Used for file-based input: the file is parsed a single time at startup so
/// malformed input fails before any pipeline starts, and every run receives
/// an identical stream.
pub struct StaticSource {
    records: Vec<Record>,
}

impl StaticSource {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn from_file(path: &Path) -> Result<Self, SourceError> {
        let source = RecordSource::from_file(path)?;
        Ok(Self {
            records: source.records,
        })
    }
}

impl RecordSourceFactory for StaticSource {
    fn create(&self) -> Result<RecordSource, SourceError> {
        Ok(RecordSource::new(self.records.clone()))
    }
}

/// A factory that fabricates `count` records once and replays them.
///
/// Generation happens up front so every run sees the same key set: a
/// `load` or `delete` pairing in the matrix targets exactly the users a
/// preceding `create` pairing seeded.
pub struct GeneratedSource {
    records: Vec<Record>,
}

impl GeneratedSource {
    pub fn new(count: usize) -> Self {
        Self {
            records: RecordSource::generated(count).records,
        }
    }
}

impl RecordSourceFactory for GeneratedSource {
    fn create(&self) -> Result<RecordSource, SourceError> {
        Ok(RecordSource::new(self.records.clone()))
    }
}
