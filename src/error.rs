//! Error types for fusmerge.

use thiserror::Error;

/// Errors raised while loading a fusion report or one of its optional stores.
#[derive(Debug, Error)]
pub enum FusionError {
    /// The report file could not be opened or read.
    #[error("Error reading fusion report {path}: {source}")]
    ReportFormat {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A data row does not have the fixed number of columns.
    #[error("Malformed report line {line} (expected {expected} columns, got {found})")]
    Parse {
        line: usize,
        expected: usize,
        found: usize,
    },

    /// A counter or position column is not a non-negative integer.
    #[error("Invalid {field} at line {line}: '{value}'")]
    InvalidField {
        line: usize,
        field: &'static str,
        value: String,
    },

    /// The alignment store was configured but could not be loaded.
    #[error("Alignment store error: {0}")]
    Alignment(String),

    /// The reference store was configured but could not be opened or queried.
    #[error("Reference error: {0}")]
    Reference(String),

    /// The merge configuration is unreadable or out of range.
    #[error("Invalid configuration {path}: {message}")]
    Config { path: String, message: String },
}

pub type Result<T> = std::result::Result<T, FusionError>;
