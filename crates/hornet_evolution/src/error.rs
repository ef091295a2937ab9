//! Error types for the evolution crate.

use thiserror::Error;

/// Errors that can occur while setting up the evolutionary loop.
#[derive(Debug, Error)]
pub enum Error {
    /// The fuzzer configuration file is malformed.
    #[error("invalid fuzzer configuration: {0}")]
    Config(#[from] serde_yaml::Error),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias for evolution operations.
pub type Result<T> = std::result::Result<T, Error>;
