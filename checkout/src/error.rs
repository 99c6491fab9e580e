//! Error types for the checkout engine.
//!
//! Validation problems are not errors: they are returned as a
//! [`ValidationReport`](crate::validation::ValidationReport). The types here
//! cover configuration, the backend, local drafts and image processing.

use thiserror::Error;

/// Errors talking to the registration/payment backend.
///
/// Timeouts, connectivity problems and 5xx responses are transient and may
/// be retried. 4xx responses mean the server rejected the request and are
/// terminal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The call did not complete within the configured timeout
    #[error("Request timed out")]
    Timeout,

    /// Connection failed or was reset
    #[error("Network error: {0}")]
    Network(String),

    /// Server-side failure (5xx)
    #[error("Server error (status {status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// The server rejected the request (4xx)
    #[error("Request rejected (status {status}): {message}")]
    Client {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// The response body could not be decoded
    #[error("Could not decode response: {0}")]
    Decode(String),

    /// The request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl BackendError {
    /// Whether retrying the same request may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Network(_) | Self::Server { .. }
        )
    }

    /// HTTP status carried by the error, if any
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } | Self::Client { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Invalid static configuration (catalog, team table, environment)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A team size entry has `min == 0` or `max < min`
    #[error("Invalid team size for {title}: min {min}, max {max}")]
    InvalidTeamSize {
        /// Item title the entry is keyed by
        title: String,
        /// Configured minimum
        min: u32,
        /// Configured maximum
        max: u32,
    },

    /// Two catalog items share an id
    #[error("Duplicate catalog item id {0}")]
    DuplicateItem(u32),

    /// An environment variable holds an unusable value
    #[error("Invalid value for {name}: {value}")]
    InvalidEnv {
        /// Variable name
        name: &'static str,
        /// Offending value
        value: String,
    },
}

/// Errors reading or writing the local draft
#[derive(Error, Debug)]
pub enum DraftError {
    /// Filesystem failure
    #[error("Draft I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The stored draft is not valid JSON for the current format
    #[error("Stored draft is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Errors preparing documents for upload
#[derive(Error, Debug)]
pub enum UploadError {
    /// Re-encoding the image failed
    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    /// The blocking compression task failed
    #[error("Compression task failed: {0}")]
    Task(String),
}
