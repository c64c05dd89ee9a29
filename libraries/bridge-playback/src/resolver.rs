//! Source resolver client
//!
//! Wraps a [`SourceResolver`] collaborator with the engine's policy: key
//! trimming, pass-through of keys that already are URLs, a per-attempt
//! timeout and a bounded number of attempts. Failures are per-item soft
//! errors; the caller decides what to skip.

use crate::error::{PlaybackError, Result};
use crate::types::PlaybackConfig;
use bridge_core::SourceResolver;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Policy wrapper around a resolver collaborator
#[derive(Clone)]
pub struct ResolverClient {
    inner: Arc<dyn SourceResolver>,
    attempts: u32,
    timeout: Duration,
}

impl std::fmt::Debug for ResolverClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverClient")
            .field("attempts", &self.attempts)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ResolverClient {
    /// Create a client with explicit policy
    pub fn new(inner: Arc<dyn SourceResolver>, attempts: u32, timeout: Duration) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            timeout,
        }
    }

    /// Create a client from playback configuration
    pub fn from_config(inner: Arc<dyn SourceResolver>, config: &PlaybackConfig) -> Self {
        Self::new(inner, config.resolve_attempts, config.resolve_timeout())
    }

    /// Resolve a source key to a playable URL
    ///
    /// # Errors
    /// Returns `ResolutionFailed` with the last failure when every attempt
    /// failed, timed out or produced an empty URL.
    pub async fn resolve(&self, source_key: &str) -> Result<String> {
        let key = source_key.trim();
        if key.is_empty() {
            return Err(PlaybackError::ResolutionFailed {
                source_key: source_key.to_string(),
                reason: "empty source key".to_string(),
            });
        }

        if is_direct_url(key) {
            debug!(key, "Source key is already a URL");
            return Ok(key.to_string());
        }

        let mut reason = String::new();
        for attempt in 1..=self.attempts {
            match tokio::time::timeout(self.timeout, self.inner.resolve(key)).await {
                Ok(Ok(url)) if !url.trim().is_empty() => {
                    debug!(key, attempt, "Source resolved");
                    return Ok(url.trim().to_string());
                }
                Ok(Ok(_)) => reason = "resolver returned an empty URL".to_string(),
                Ok(Err(e)) => reason = e.to_string(),
                Err(_) => reason = format!("timed out after {:?}", self.timeout),
            }
            warn!(key, attempt, attempts = self.attempts, %reason, "Source resolution attempt failed");
        }

        Err(PlaybackError::ResolutionFailed {
            source_key: key.to_string(),
            reason,
        })
    }
}

fn is_direct_url(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
