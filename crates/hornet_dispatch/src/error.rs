//! Error types for dispatch operations.

use thiserror::Error;

/// Errors that can occur while dispatching requests.
#[derive(Debug, Error)]
pub enum Error {
    /// A required credential environment variable is not set.
    #[error("missing credential environment variable {0}")]
    MissingCredentials(&'static str),

    /// The trust anchor file could not be used.
    #[error("invalid certificate at {path}: {reason}")]
    InvalidCertificate {
        /// Path the certificate was read from.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// Transport-level failure (DNS, TCP, TLS, timeout).
    #[error("HTTP {method} {url} failed: {source}")]
    Transport {
        /// HTTP method of the failed request.
        method: &'static str,
        /// Full request URL.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },
}

/// Result type alias for dispatch operations.
pub type Result<T> = std::result::Result<T, Error>;
