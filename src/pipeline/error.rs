//! Error types for the binning process
//!
//! Only `Configuration` and `NotFitted` come from the binning contract itself.
//! Per-variable failures are recorded as a [`FitStatus`](super::FitStatus) on
//! the variable's result and never surface here.

use thiserror::Error;

/// Result alias for binning operations
pub type Result<T> = std::result::Result<T, BinningError>;

/// Errors that abort a whole process call
#[derive(Error, Debug)]
pub enum BinningError {
    /// Bad variable declarations, length mismatches or invalid constraint values
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A read operation was called before `fit`
    #[error("Binning process is not fitted; call fit() first")]
    NotFitted,

    /// Failure while converting from or to a polars DataFrame
    #[error("Data error: {0}")]
    Data(#[from] polars::prelude::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BinningError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        BinningError::Configuration(message.into())
    }
}
