//! Shared HTTP client for the release backend.

use crate::error::{ClientError, Result};
use crate::types::ClientConfig;
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::debug;

/// HTTP client bound to one release backend.
///
/// Cheap to clone; the resolver and the catalog loader share one instance.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    api_base: String,
    config: ClientConfig,
}

impl BackendClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let api_base = normalize_base(&config.api_base)?;

        let http = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("SmartBridge/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_base,
            config,
        })
    }

    /// Normalized base URL (no trailing slash)
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// GET a URL, mapping non-success statuses to `ServerError`
    pub(crate) async fn get(&self, url: &str) -> Result<Response> {
        debug!(url = %url, "GET");

        let response = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(ClientError::from_send)?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(ClientError::ServerError {
                status: status.as_u16(),
                message,
            })
        }
    }
}

fn normalize_base(raw: &str) -> Result<String> {
    let base = raw.trim().trim_end_matches('/');
    if base.is_empty() {
        return Err(ClientError::InvalidUrl("URL cannot be empty".into()));
    }
    if !base.starts_with("http://") && !base.starts_with("https://") {
        return Err(ClientError::InvalidUrl(
            "URL must start with http:// or https://".into(),
        ));
    }
    url::Url::parse(base).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
    Ok(base.to_string())
}
