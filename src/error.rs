//! Error types for the chunkstats harness.

use thiserror::Error;

/// Result type alias using our error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the chunkstats harness.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (bad iteration argument, settings file, grid)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Chunk count differed between trials of the same cell
    #[error(
        "Consistency error: {size_label} at compaction level {compaction_level}: \
         expected {expected} total chunks, trial {trial} produced {observed}"
    )]
    Consistency {
        size_label: String,
        compaction_level: u16,
        trial: u32,
        expected: u64,
        observed: u64,
    },

    /// Failure raised by the chunk evaluator
    #[error("Evaluation error: {evaluator}: {message}")]
    Evaluation { evaluator: String, message: String },

    /// Payload generation errors
    #[error("Payload error: {0}")]
    Payload(String),

    /// Contract violations inside the harness
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] Box<std::io::Error>),

    /// CSV report errors
    #[error("CSV error: {0}")]
    Csv(#[from] Box<csv::Error>),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] Box<serde_json::Error>),
}

impl Error {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an evaluation error.
    pub fn evaluation(evaluator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Evaluation {
            evaluator: evaluator.into(),
            message: message.into(),
        }
    }

    /// Create a payload error.
    pub fn payload(message: impl Into<String>) -> Self {
        Self::Payload(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Box::new(value))
    }
}

impl From<csv::Error> for Error {
    fn from(value: csv::Error) -> Self {
        Self::Csv(Box::new(value))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(Box::new(value))
    }
}
