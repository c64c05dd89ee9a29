/// ID types for Smart Bridge entities
use serde::{Deserialize, Serialize};
use std::fmt;

/// Release identifier (share id, legacy project key, or manifest URL)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReleaseId(String);

impl ReleaseId {
    /// Create a new release ID, trimming surrounding whitespace
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the ID is empty after trimming
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the ID looks like a 24-hex share id
    pub fn is_share_id(&self) -> bool {
        self.0.len() == 24 && self.0.chars().all(|c| c.is_ascii_hexdigit())
    }
}

impl fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ReleaseId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ReleaseId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}
