//! Error types for the release backend client.

use bridge_core::CoreError;
use thiserror::Error;

/// Errors that can occur when talking to the release backend.
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Backend returned a non-success status
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Backend is offline or unreachable
    #[error("Server unreachable: {0}")]
    ServerUnreachable(String),

    /// Invalid base or manifest URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Release id is neither a URL, a share id nor a configured legacy key
    #[error("Unknown release: {0}")]
    UnknownRelease(String),

    /// Backend answered `ok: false` or without a URL
    #[error("Signing rejected for {key}: {reason}")]
    SigningRejected { key: String, reason: String },

    /// Failed to parse a backend response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Manifest parsed but holds no playable catalog
    #[error(transparent)]
    Catalog(#[from] CoreError),
}

impl ClientError {
    /// Map a transport failure, separating connectivity problems
    pub(crate) fn from_send(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            Self::ServerUnreachable(e.to_string())
        } else {
            Self::Request(e)
        }
    }

    /// Convert into the core error of the catalog loading contract
    pub fn into_load_error(self) -> CoreError {
        match self {
            Self::UnknownRelease(id) => CoreError::ReleaseNotFound(id),
            Self::ServerError { status: 404, .. } => {
                CoreError::ReleaseNotFound("manifest returned 404".to_string())
            }
            Self::Catalog(e) => e,
            other => CoreError::catalog_load(other.to_string()),
        }
    }

    /// Convert into the core error of the resolving contract
    pub fn into_resolve_error(self) -> CoreError {
        CoreError::resolution(self.to_string())
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
