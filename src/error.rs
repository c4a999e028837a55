use std::path::PathBuf;

use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// A raw source file could not be read or did not satisfy its column contract.
#[derive(Error, Debug, Clone)]
#[error("failed to parse {}: {reason}", file.display())]
pub struct ParseError {
    pub file: PathBuf,
    pub reason: String,
}

impl ParseError {
    pub fn new(file: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            reason: reason.into(),
        }
    }
}

/// The persisted dataset is not in the shape the merge step expects.
#[derive(Error, Debug, Clone)]
#[error("merge inconsistency in {source_name}: {reason}")]
pub struct MergeInconsistencyError {
    pub source_name: String,
    pub reason: String,
}

/// A load batch kept failing after its retries were exhausted.
#[derive(Error, Debug, Clone)]
#[error(
    "batch load into {table} failed for rows {start}..{end} after {attempts} attempts \
     ({rows_committed} rows already committed): {reason}"
)]
pub struct LoadBatchError {
    pub table: String,
    pub start: usize,
    pub end: usize,
    pub attempts: u32,
    pub rows_committed: usize,
    pub reason: String,
}

/// The processing state could not be written after a successful load.
#[derive(Error, Debug, Clone)]
#[error("failed to persist processing state to {}: {reason}", path.display())]
pub struct StatePersistenceError {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    MergeInconsistency(#[from] MergeInconsistencyError),

    #[error(transparent)]
    LoadBatch(#[from] LoadBatchError),

    #[error(transparent)]
    StatePersistence(#[from] StatePersistenceError),

    #[error("stage {stage} timed out after {secs}s")]
    StageTimeout { stage: String, secs: u64 },

    #[error("run cancelled")]
    Cancelled,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("database error: {0}")]
    Database(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<diesel::result::Error> for Error {
    fn from(err: diesel::result::Error) -> Self {
        Error::Database(err.to_string())
    }
}
