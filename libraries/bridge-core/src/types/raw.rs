//! Raw manifest shapes, as published by the release backend.
//!
//! These are deliberately loose: every field is optional and unknown fields
//! are ignored. `Catalog::from_raw` turns them into validated entities.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Raw catalog as found in a published manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawCatalog {
    /// Release title
    pub title: Option<String>,

    /// Release artist
    pub artist: Option<String>,

    /// Song records in manifest order
    pub songs: Vec<RawSong>,

    /// Connection records keyed by `"<from>-<to>"`
    pub connections: BTreeMap<String, RawConnection>,
}

/// Raw song record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSong {
    /// Slot ordinal (number or numeric string)
    #[serde(deserialize_with = "lenient_slot")]
    pub slot: Option<i64>,

    /// Song title
    pub title: Option<String>,

    /// Recorded variants
    pub files: RawFiles,
}

/// Raw variant files of a song
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawFiles {
    /// Variant A
    pub a: Option<RawMediaRef>,

    /// Variant B
    pub b: Option<RawMediaRef>,

    /// Legacy single-variant key, treated as variant A
    pub album: Option<RawMediaRef>,
}

/// Raw media reference
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawMediaRef {
    /// Storage key to be signed
    #[serde(alias = "sourceKey")]
    pub s3_key: Option<String>,

    /// Pre-signed or public URL
    pub playback_url: Option<String>,

    /// Original upload file name
    pub file_name: Option<String>,
}

impl RawMediaRef {
    /// Reference with only a storage key
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            s3_key: Some(key.into()),
            ..Self::default()
        }
    }

    /// The first non-empty resolvable identifier (storage key, then URL)
    pub fn resolvable(&self) -> Option<String> {
        [self.s3_key.as_deref(), self.playback_url.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_string)
    }
}

/// Raw connection record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawConnection {
    /// Variant of the source song ("a" | "b")
    pub from_choice: Option<String>,

    /// Variant of the destination song ("a" | "b")
    pub to_choice: Option<String>,

    /// Authored bridge clip
    pub bridge: Option<RawMediaRef>,

    /// Authoring lock flag (informational)
    pub locked: bool,
}

fn lenient_slot<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
