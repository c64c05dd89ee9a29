//! Published manifest handling.
//!
//! A manifest is the JSON document the backend publishes for a release. Over
//! time it has been served in a few shapes:
//!
//! - wrapped in `{ "snapshot": ... }` and/or `{ "project": ... }` envelopes
//! - songs under `catalog.songs` with connections under `catalog.connections`
//!   (older exports keep connections under `songs.connections`)
//! - a flat legacy `tracks[]` list with a single key per track
//!
//! Everything here is pure; fetching lives in [`crate::HttpCatalogLoader`].

use crate::error::{ClientError, Result};
use crate::types::ClientConfig;
use bridge_core::types::{RawCatalog, RawConnection, RawFiles, RawMediaRef, RawSong};
use bridge_core::{Catalog, ReleaseId};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Map a release id to the URL of its published manifest.
///
/// - `http(s)://` ids are used as is
/// - 24-hex share ids map to `{api_base}/publish/<id>.json`
/// - configured legacy keys map to their registered URL
pub fn manifest_url(api_base: &str, config: &ClientConfig, release_id: &ReleaseId) -> Result<String> {
    let id = release_id.as_str();
    if id.is_empty() {
        return Err(ClientError::UnknownRelease("empty release id".to_string()));
    }

    let lower = id.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Ok(id.to_string());
    }

    if release_id.is_share_id() {
        return Ok(format!("{}/publish/{}.json", api_base, id));
    }

    config
        .legacy_manifests
        .get(id)
        .cloned()
        .ok_or_else(|| ClientError::UnknownRelease(id.to_string()))
}

/// Parse a manifest document into a validated catalog.
pub fn parse_manifest(release_id: &ReleaseId, manifest: &Value) -> Result<Catalog> {
    let project = unwrap_envelopes(manifest);

    let raw = RawCatalog {
        title: first_text(
            project,
            &[&["album", "title"], &["albumTitle"], &["projectName"]],
        ),
        artist: first_text(
            project,
            &[
                &["album", "artist"],
                &["albumArtist"],
                &["performerName"],
                &["company"],
            ],
        ),
        songs: songs(project),
        connections: connections(project),
    };

    debug!(
        release = %release_id,
        songs = raw.songs.len(),
        connections = raw.connections.len(),
        "Parsed manifest"
    );

    Ok(Catalog::from_raw(release_id.clone(), raw)?)
}

fn unwrap_envelopes(manifest: &Value) -> &Value {
    let snapshot = manifest
        .get("snapshot")
        .filter(|v| v.is_object())
        .unwrap_or(manifest);
    snapshot
        .get("project")
        .filter(|v| v.is_object())
        .unwrap_or(snapshot)
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.get(key))
}

fn first_text(value: &Value, paths: &[&[&str]]) -> Option<String> {
    paths
        .iter()
        .filter_map(|path| lookup(value, path).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn songs(project: &Value) -> Vec<RawSong> {
    if let Some(list) = lookup(project, &["catalog", "songs"]).and_then(Value::as_array) {
        return list.iter().filter_map(catalog_song).collect();
    }

    match project.get("tracks").and_then(Value::as_array) {
        Some(tracks) => {
            debug!(count = tracks.len(), "Using legacy tracks list");
            tracks.iter().map(legacy_track).collect()
        }
        None => Vec::new(),
    }
}

fn catalog_song(value: &Value) -> Option<RawSong> {
    let mut song: RawSong = match serde_json::from_value(value.clone()) {
        Ok(song) => song,
        Err(e) => {
            warn!(error = %e, "Skipping malformed song record");
            return None;
        }
    };
    if song.title.as_deref().map_or(true, |t| t.trim().is_empty()) {
        song.title = first_text(value, &[&["titleJson", "title"]]);
    }
    Some(song)
}

fn legacy_track(value: &Value) -> RawSong {
    let key = first_text(value, &[&["s3Key"], &["sourceKey"]]);
    RawSong {
        slot: None,
        title: first_text(value, &[&["title"], &["name"]]),
        files: RawFiles {
            a: key.map(RawMediaRef::key),
            ..RawFiles::default()
        },
    }
}

fn connections(project: &Value) -> BTreeMap<String, RawConnection> {
    let empty = Map::new();
    let records = lookup(project, &["catalog", "connections"])
        .and_then(Value::as_object)
        .or_else(|| lookup(project, &["songs", "connections"]).and_then(Value::as_object))
        .unwrap_or(&empty);

    records
        .iter()
        .filter_map(|(key, value)| match serde_json::from_value(value.clone()) {
            Ok(connection) => Some((key.clone(), connection)),
            Err(e) => {
                warn!(edge = %key, error = %e, "Skipping malformed connection record");
                None
            }
        })
        .collect()
}
