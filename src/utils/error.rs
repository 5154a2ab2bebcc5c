//! Error Handling Module
//!
//! Defines the error type shared by every stage of the Heat pipeline.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for Heat pipeline operations
#[derive(Error, Debug)]
pub enum HeatError {
    /// The table does not have enough columns for the requested operation
    #[error("Size mismatch: expected at least {expected} columns, found {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// A stage received a dataset without rows
    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    /// A required column is absent from the header
    #[error("Missing column '{0}'")]
    MissingColumn(String),

    /// Error with dataset operations
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Error with training
    #[error("Training error: {0}")]
    Training(String),

    /// Error with inference
    #[error("Inference error: {0}")]
    Inference(String),

    /// Configuration error (including layer shape mismatches)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The forward pass could not be captured as a static graph
    #[error("Export failed at op '{op}': {reason}")]
    Export { op: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Model record could not be written or read
    #[error("Recorder error: {0}")]
    Recorder(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

impl From<serde_json::Error> for HeatError {
    fn from(err: serde_json::Error) -> Self {
        HeatError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for HeatError {
    fn from(err: toml::de::Error) -> Self {
        HeatError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for HeatError {
    fn from(err: toml::ser::Error) -> Self {
        HeatError::Serialization(err.to_string())
    }
}

impl From<burn::record::RecorderError> for HeatError {
    fn from(err: burn::record::RecorderError) -> Self {
        HeatError::Recorder(format!("{:?}", err))
    }
}

/// Convenience Result type for Heat pipeline operations
pub type Result<T> = std::result::Result<T, HeatError>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, msg: &str) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| HeatError::InvalidInput(format!("{}: {}", msg, e)))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| HeatError::InvalidInput(format!("{}: {}", f(), e)))
    }
}

impl<T> ResultExt<T> for Option<T> {
    fn context(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| HeatError::InvalidInput(msg.to_string()))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.ok_or_else(|| HeatError::InvalidInput(f()))
    }
}
