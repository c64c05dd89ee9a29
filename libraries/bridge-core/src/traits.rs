/// Collaborator traits for Smart Bridge
use crate::error::Result;
use crate::types::{Catalog, ReleaseId};
use async_trait::async_trait;

/// Catalog retrieval collaborator
///
/// Implementers fetch and normalize the catalog of a release. The manifest
/// format is theirs to know; the engine only consumes `Catalog`.
#[async_trait]
pub trait CatalogLoader: Send + Sync {
    /// Load the catalog of a release
    ///
    /// # Errors
    /// Returns an error if the release cannot be located, fetched, or has no
    /// playable songs.
    async fn load_catalog(&self, release_id: &ReleaseId) -> Result<Catalog>;
}

/// URL-signing collaborator
///
/// Turns an opaque source key into a playable URL. No retry policy is
/// expected from implementers.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    /// Resolve a source key
    ///
    /// # Errors
    /// Returns `CoreError::Resolution` (or a transport error) when no URL can
    /// be produced.
    async fn resolve(&self, source_key: &str) -> Result<String>;
}

/// Owned-release bookkeeping ("My Collection")
///
/// Ordering is newest-first. `upsert` of an id that is already present is a
/// no-op.
pub trait CollectionStore: Send + Sync {
    /// All owned release ids, newest first
    fn ids(&self) -> Result<Vec<ReleaseId>>;

    /// Record ownership of a release
    fn upsert(&self, id: &ReleaseId) -> Result<()>;

    /// Whether a release is owned
    fn contains(&self, id: &ReleaseId) -> Result<bool> {
        Ok(self.ids()?.iter().any(|owned| owned == id))
    }
}
