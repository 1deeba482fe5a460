// Error Taxonomy
// Startup errors are fatal, per-request errors become structured payloads.

use std::path::PathBuf;
use thiserror::Error;

use crate::models::DocumentFormat;
use crate::services::trends::TrendTally;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid label mapping: {0}")]
    LabelMapping(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Raised while constructing a predictor. The process must not start.
#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("Model artifact not found: {0}")]
    MissingArtifact(PathBuf),
    #[error("Failed to load tokenizer: {0}")]
    Tokenizer(String),
    #[error("Failed to create inference session: {0}")]
    Session(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Tokenization failed: {0}")]
    Tokenization(String),
    #[error("Forward pass failed: {0}")]
    Forward(String),
    #[error("Model returned {got} logits per input, expected {expected}")]
    OutputShape { expected: usize, got: usize },
    #[error("Invalid probability distribution: {0}")]
    InvalidDistribution(String),
}

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Unsupported file type: {filename}")]
    UnsupportedFormat { filename: String },
    #[error("Failed to process {format} file: {cause}")]
    Failed { format: DocumentFormat, cause: String },
    #[error("No text found in file")]
    NoTextFound,
}

impl ExtractionError {
    pub fn failed(format: DocumentFormat, cause: impl std::fmt::Display) -> Self {
        Self::Failed {
            format,
            cause: cause.to_string(),
        }
    }
}

/// Explanations are auxiliary: callers decide whether to surface these.
#[derive(Error, Debug)]
pub enum ExplanationError {
    #[error("Explanations are disabled")]
    Disabled,
    #[error("Text has no explainable tokens")]
    NoFeatures,
    #[error("Predictor failed while sampling: {0}")]
    Predictor(#[from] InferenceError),
    #[error("Surrogate fit failed: {0}")]
    Numerical(String),
    #[error("Deadline passed after {completed} of {total} samples")]
    DeadlineExceeded { completed: usize, total: usize },
}

#[derive(Error, Debug)]
pub enum SessionLogError {
    #[error("Session log I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize session entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum TrendError {
    #[error("No corpus files could be loaded: {0}")]
    NoInput(String),
    #[error("Column '{column}' missing from {path}")]
    MissingColumn { path: PathBuf, column: String },
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid prediction row: {0}")]
    InvalidRow(String),
    /// The partial tally holds every record classified before the failing batch.
    #[error("Aggregation aborted after {processed} records: {source}")]
    Aborted {
        processed: usize,
        partial: Box<TrendTally>,
        #[source]
        source: InferenceError,
    },
}

/// Errors at the prediction service boundary.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("Request timed out")]
    Timeout,
    #[error("Internal error: {0}")]
    Internal(String),
}
