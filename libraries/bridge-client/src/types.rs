//! Configuration and wire types for the release backend.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Backend connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the release backend (e.g., `https://api.example.com`)
    pub api_base: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Legacy project keys mapped to their manifest URLs
    pub legacy_manifests: BTreeMap<String, String>,
}

impl ClientConfig {
    /// Config for the given backend with default timeout
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            ..Self::default()
        }
    }

    /// Register a legacy project key
    pub fn with_legacy_manifest(mut self, key: impl Into<String>, url: impl Into<String>) -> Self {
        self.legacy_manifests.insert(key.into(), url.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: "http://127.0.0.1:8080".to_string(),
            timeout_secs: 30,
            legacy_manifests: BTreeMap::new(),
        }
    }
}

/// Body of `GET /api/playback-url`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackUrlResponse {
    pub ok: Option<bool>,
    pub url: Option<String>,
    pub playback_url: Option<String>,
    pub error: Option<String>,
}

impl PlaybackUrlResponse {
    /// The signed URL, if the backend produced a usable one
    pub fn signed_url(&self) -> Option<&str> {
        [self.url.as_deref(), self.playback_url.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|u| !u.is_empty())
    }
}
