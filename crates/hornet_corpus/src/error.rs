//! Error types for corpus operations.

use thiserror::Error;

/// Errors that can occur during corpus operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Report serialization failed.
    #[error("report error: {0}")]
    Report(#[from] csv::Error),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias for corpus operations.
pub type Result<T> = std::result::Result<T, Error>;
