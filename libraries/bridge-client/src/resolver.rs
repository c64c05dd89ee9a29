//! Source-key signing against the release backend.

use crate::client::BackendClient;
use crate::error::{ClientError, Result};
use crate::types::PlaybackUrlResponse;
use async_trait::async_trait;
use bridge_core::SourceResolver;
use tracing::{debug, warn};

/// Signs source keys through `GET /api/playback-url`.
#[derive(Debug, Clone)]
pub struct HttpSourceResolver {
    client: BackendClient,
}

impl HttpSourceResolver {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    /// Request a signed playback URL for a storage key.
    pub async fn playback_url(&self, source_key: &str) -> Result<String> {
        let url = url::Url::parse_with_params(
            &format!("{}/api/playback-url", self.client.api_base()),
            &[("s3Key", source_key)],
        )
        .map_err(|e| ClientError::InvalidUrl(e.to_string()))?;

        let response = self.client.get(url.as_str()).await?;
        let body: PlaybackUrlResponse = response.json().await.map_err(|e| {
            ClientError::ParseError(format!("Failed to parse playback URL response: {}", e))
        })?;

        if body.ok == Some(false) {
            return Err(ClientError::SigningRejected {
                key: source_key.to_string(),
                reason: body.error.unwrap_or_else(|| "ok=false".to_string()),
            });
        }

        match body.signed_url() {
            Some(signed) => {
                debug!(key = %source_key, "Signed playback URL");
                Ok(signed.to_string())
            }
            None => Err(ClientError::SigningRejected {
                key: source_key.to_string(),
                reason: "no url in response".to_string(),
            }),
        }
    }
}

#[async_trait]
impl SourceResolver for HttpSourceResolver {
    async fn resolve(&self, source_key: &str) -> bridge_core::Result<String> {
        self.playback_url(source_key).await.map_err(|e| {
            warn!(key = %source_key, error = %e, "Playback URL request failed");
            e.into_resolve_error()
        })
    }
}
