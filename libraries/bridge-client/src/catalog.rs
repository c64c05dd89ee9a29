//! Catalog loading from published manifests.

use crate::client::BackendClient;
use crate::error::{ClientError, Result};
use crate::manifest::{manifest_url, parse_manifest};
use async_trait::async_trait;
use bridge_core::{Catalog, CatalogLoader, ReleaseId};
use serde_json::Value;
use tracing::{info, warn};

/// Fetches and normalizes release manifests.
#[derive(Debug, Clone)]
pub struct HttpCatalogLoader {
    client: BackendClient,
}

impl HttpCatalogLoader {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    /// Fetch the raw manifest document of a release.
    pub async fn fetch_manifest(&self, release_id: &ReleaseId) -> Result<Value> {
        let url = manifest_url(self.client.api_base(), self.client.config(), release_id)?;
        let response = self.client.get(&url).await?;

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse manifest: {}", e)))
    }

    /// Fetch and normalize the catalog of a release.
    pub async fn fetch_catalog(&self, release_id: &ReleaseId) -> Result<Catalog> {
        let manifest = self.fetch_manifest(release_id).await?;
        let catalog = parse_manifest(release_id, &manifest)?;

        info!(
            release = %release_id,
            title = %catalog.title(),
            songs = catalog.songs().len(),
            connections = catalog.connection_count(),
            "Catalog loaded"
        );

        Ok(catalog)
    }
}

#[async_trait]
impl CatalogLoader for HttpCatalogLoader {
    async fn load_catalog(&self, release_id: &ReleaseId) -> bridge_core::Result<Catalog> {
        self.fetch_catalog(release_id).await.map_err(|e| {
            warn!(release = %release_id, error = %e, "Catalog load failed");
            e.into_load_error()
        })
    }
}
