use std::io;

use thiserror::Error;

/// Failures that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("dataset is missing required columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },
    #[error("worker {worker} terminated abnormally: {reason}")]
    WorkerFailed { worker: usize, reason: String },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A batch that could not be reduced. Recoverable: the batch counts as zero.
#[derive(Debug, Error, PartialEq)]
pub enum AggregationError {
    #[error("row {row} has no value for '{field}'")]
    MissingField { row: usize, field: &'static str },
    #[error("batch lacks columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("row {row} has a negative passenger count")]
    NegativePassengers { row: usize },
}
