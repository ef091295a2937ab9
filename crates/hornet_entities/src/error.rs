//! Error types for entity modeling.

use thiserror::Error;

/// Errors that can occur while building or parsing entity descriptors.
#[derive(Debug, Error)]
pub enum Error {
    /// The `$metadata` document could not be understood.
    #[error("metadata error: {0}")]
    Metadata(String),

    /// A `$filter` string could not be parsed.
    #[error("filter parse error: {0}")]
    FilterParse(String),

    /// The restrictions file is malformed.
    #[error("restrictions error: {0}")]
    Restrictions(#[from] serde_yaml::Error),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias for entity operations.
pub type Result<T> = std::result::Result<T, Error>;
