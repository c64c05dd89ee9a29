//! Error types for adaptive playback

use bridge_core::CoreError;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaybackError {
    /// Catalog has no playable songs
    #[error("Catalog invalid: {0}")]
    CatalogInvalid(String),

    /// The drawn route uses a directed edge that has no bridge
    #[error("Route unbuildable: no bridge from slot {from} to slot {to}")]
    RouteUnbuildable {
        /// Slot the missing edge starts at
        from: u32,
        /// Slot the missing edge ends at
        to: u32,
    },

    /// A source key could not be turned into a playable URL
    #[error("Resolution failed for '{source_key}': {reason}")]
    ResolutionFailed {
        /// Key that failed
        source_key: String,
        /// Last failure reported by the resolver
        reason: String,
    },

    /// The device refused to start playback without a user gesture
    #[error("Autoplay blocked: {0}")]
    AutoplayBlocked(String),

    /// Playback device error
    #[error("Device error: {0}")]
    Device(String),

    /// The engine task is no longer running
    #[error("Playback engine stopped")]
    EngineStopped,

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl From<CoreError> for PlaybackError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::CatalogInvalid(msg) => Self::CatalogInvalid(msg),
            other => Self::InvalidOperation(other.to_string()),
        }
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
