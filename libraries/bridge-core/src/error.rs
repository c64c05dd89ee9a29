/// Core error types for Smart Bridge
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for Smart Bridge
#[derive(Error, Debug)]
pub enum CoreError {
    /// Catalog has no playable songs
    #[error("Catalog invalid: {0}")]
    CatalogInvalid(String),

    /// Malformed edge key (expected "<from>-<to>")
    #[error("Invalid edge key: {0}")]
    InvalidEdgeKey(String),

    /// Release could not be located
    #[error("Release not found: {0}")]
    ReleaseNotFound(String),

    /// Catalog retrieval failed (network, backend)
    #[error("Catalog load failed: {0}")]
    CatalogLoad(String),

    /// Source key could not be turned into a playable URL
    #[error("Resolution failed: {0}")]
    Resolution(String),

    /// Collection persistence failed
    #[error("Collection error: {0}")]
    Collection(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a catalog invalid error
    pub fn catalog_invalid(msg: impl Into<String>) -> Self {
        Self::CatalogInvalid(msg.into())
    }

    /// Create a resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create a catalog load error
    pub fn catalog_load(msg: impl Into<String>) -> Self {
        Self::CatalogLoad(msg.into())
    }
}
