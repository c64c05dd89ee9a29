//! Catalog model: songs, directed connections and their normalization.

use super::ids::ReleaseId;
use super::raw::{RawCatalog, RawConnection, RawMediaRef, RawSong};
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Which recorded variant of a song is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    /// Variant A (default)
    #[default]
    A,

    /// Variant B
    B,
}

impl Choice {
    /// Normalize a raw manifest choice: only a literal "b" selects B
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("b") => Choice::B,
            _ => Choice::A,
        }
    }

    /// The other variant
    pub fn other(self) -> Self {
        match self {
            Choice::A => Choice::B,
            Choice::B => Choice::A,
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Choice::A => write!(f, "a"),
            Choice::B => write!(f, "b"),
        }
    }
}

/// Opaque resolvable media identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaRef {
    /// Key handed to the source resolver
    pub source_key: String,
}

impl MediaRef {
    /// Create a media reference (key is trimmed)
    pub fn new(source_key: impl Into<String>) -> Self {
        Self {
            source_key: source_key.into().trim().to_string(),
        }
    }

    /// A reference with an empty key is treated as absent
    pub fn is_resolvable(&self) -> bool {
        !self.source_key.is_empty()
    }

    fn from_raw(raw: Option<&RawMediaRef>) -> Option<Self> {
        raw.and_then(RawMediaRef::resolvable).map(Self::new)
    }
}

/// Recorded variants of a song
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variants {
    /// Variant A
    pub a: Option<MediaRef>,

    /// Variant B
    pub b: Option<MediaRef>,
}

impl Variants {
    /// Single-variant song (A only)
    pub fn single(key: impl Into<String>) -> Self {
        Self {
            a: Some(MediaRef::new(key)),
            b: None,
        }
    }

    /// Two-variant song
    pub fn pair(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self {
            a: Some(MediaRef::new(a)),
            b: Some(MediaRef::new(b)),
        }
    }

    /// Variant for a choice, only if it is resolvable
    pub fn get(&self, choice: Choice) -> Option<&MediaRef> {
        let media = match choice {
            Choice::A => self.a.as_ref(),
            Choice::B => self.b.as_ref(),
        };
        media.filter(|m| m.is_resolvable())
    }
}

/// A catalog song
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    /// Stable ordinal, unique within the catalog
    pub slot: u32,

    /// Display title
    pub title: String,

    /// Recorded variants
    pub variants: Variants,
}

impl Song {
    /// Create a new song
    pub fn new(slot: u32, title: impl Into<String>, variants: Variants) -> Self {
        Self {
            slot,
            title: title.into(),
            variants,
        }
    }

    /// Valid only with a positive slot and at least one resolvable variant
    pub fn is_playable(&self) -> bool {
        self.slot > 0 && (self.variants.get(Choice::A).is_some() || self.variants.get(Choice::B).is_some())
    }

    /// Source for the requested variant, falling back to the other one
    ///
    /// Returns the choice actually used alongside the reference.
    pub fn source_for(&self, choice: Choice) -> Option<(Choice, &MediaRef)> {
        self.variants
            .get(choice)
            .map(|m| (choice, m))
            .or_else(|| self.variants.get(choice.other()).map(|m| (choice.other(), m)))
    }
}

/// Directed edge key, formatted `"<from>-<to>"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    /// Source slot
    pub from: u32,

    /// Destination slot
    pub to: u32,
}

impl EdgeKey {
    /// Create an edge key
    pub fn new(from: u32, to: u32) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

impl FromStr for EdgeKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let (from, to) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| CoreError::InvalidEdgeKey(s.to_string()))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| CoreError::InvalidEdgeKey(s.to_string()))
        };
        Ok(Self::new(parse(from)?, parse(to)?))
    }
}

/// Directed connection between two songs via an authored bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Source slot
    pub from_slot: u32,

    /// Destination slot
    pub to_slot: u32,

    /// Variant of the source song this bridge leaves from
    pub from_choice: Choice,

    /// Variant of the destination song this bridge arrives at
    pub to_choice: Choice,

    /// Bridge clip
    pub bridge: MediaRef,
}

impl Connection {
    /// Create a connection
    pub fn new(
        from_slot: u32,
        to_slot: u32,
        from_choice: Choice,
        to_choice: Choice,
        bridge_key: impl Into<String>,
    ) -> Self {
        Self {
            from_slot,
            to_slot,
            from_choice,
            to_choice,
            bridge: MediaRef::new(bridge_key),
        }
    }

    /// Edge key of this connection
    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(self.from_slot, self.to_slot)
    }
}

/// Normalized catalog of one release
///
/// Immutable for the duration of one catalog load. Songs are sorted by slot;
/// every stored connection references existing songs and has a resolvable
/// bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    release_id: ReleaseId,
    title: String,
    artist: String,
    songs: Vec<Song>,
    connections: HashMap<EdgeKey, Connection>,
}

impl Catalog {
    /// Build a catalog from already-typed songs and connections
    ///
    /// Unplayable songs, duplicate slots, and connections that reference
    /// unknown slots or lack a bridge are dropped.
    ///
    /// # Errors
    /// Returns `CoreError::CatalogInvalid` when no playable song remains.
    pub fn new(
        release_id: impl Into<ReleaseId>,
        songs: Vec<Song>,
        connections: Vec<Connection>,
    ) -> Result<Self> {
        let release_id = release_id.into();

        let mut seen = HashSet::new();
        let mut songs: Vec<Song> = songs
            .into_iter()
            .filter(|s| s.is_playable())
            .filter(|s| seen.insert(s.slot))
            .collect();
        songs.sort_by_key(|s| s.slot);

        if songs.is_empty() {
            return Err(CoreError::catalog_invalid(format!(
                "release {} has no playable songs",
                release_id
            )));
        }

        let connections = connections
            .into_iter()
            .filter(|c| {
                let keep = c.bridge.is_resolvable()
                    && c.from_slot != c.to_slot
                    && seen.contains(&c.from_slot)
                    && seen.contains(&c.to_slot);
                if !keep {
                    debug!(edge = %c.key(), "Dropping unusable connection");
                }
                keep
            })
            .map(|c| (c.key(), c))
            .collect();

        Ok(Self {
            release_id,
            title: String::new(),
            artist: String::new(),
            songs,
            connections,
        })
    }

    /// Normalize a raw manifest catalog
    ///
    /// Songs without a positive slot take their 1-based manifest position.
    /// Missing titles default to `"Track <slot>"`. The legacy `album` file is
    /// treated as variant A.
    pub fn from_raw(release_id: impl Into<ReleaseId>, raw: RawCatalog) -> Result<Self> {
        let songs = raw
            .songs
            .iter()
            .enumerate()
            .filter_map(|(i, s)| song_from_raw(i, s))
            .collect();

        let connections = raw
            .connections
            .iter()
            .filter_map(|(key, c)| match key.parse::<EdgeKey>() {
                Ok(edge) => connection_from_raw(edge, c),
                Err(e) => {
                    debug!(key = %key, error = %e, "Skipping connection with malformed key");
                    None
                }
            })
            .collect();

        let mut catalog = Self::new(release_id, songs, connections)?;
        catalog.title = clean(raw.title.as_deref()).unwrap_or_default();
        catalog.artist = clean(raw.artist.as_deref()).unwrap_or_default();
        Ok(catalog)
    }

    /// Set display metadata
    pub fn with_metadata(mut self, title: impl Into<String>, artist: impl Into<String>) -> Self {
        self.title = title.into();
        self.artist = artist.into();
        self
    }

    /// Release this catalog belongs to
    pub fn release_id(&self) -> &ReleaseId {
        &self.release_id
    }

    /// Release title (may be empty)
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Release artist (may be empty)
    pub fn artist(&self) -> &str {
        &self.artist
    }

    /// Playable songs sorted by slot
    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    /// Song by slot
    pub fn song(&self, slot: u32) -> Option<&Song> {
        self.songs.iter().find(|s| s.slot == slot)
    }

    /// Directed connection lookup
    pub fn connection(&self, from: u32, to: u32) -> Option<&Connection> {
        self.connections.get(&EdgeKey::new(from, to))
    }

    /// Number of usable connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Whether every ordered pair of songs has a bridge
    pub fn is_fully_connected(&self) -> bool {
        let n = self.songs.len();
        self.connections.len() == n * (n - 1)
    }
}

fn clean(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn song_from_raw(position: usize, raw: &RawSong) -> Option<Song> {
    let slot = raw
        .slot
        .filter(|n| *n > 0)
        .and_then(|n| u32::try_from(n).ok())
        .or_else(|| u32::try_from(position + 1).ok())?;

    let title = clean(raw.title.as_deref()).unwrap_or_else(|| format!("Track {}", slot));

    let variants = Variants {
        a: MediaRef::from_raw(raw.files.a.as_ref())
            .or_else(|| MediaRef::from_raw(raw.files.album.as_ref())),
        b: MediaRef::from_raw(raw.files.b.as_ref()),
    };

    Some(Song::new(slot, title, variants))
}

fn connection_from_raw(edge: EdgeKey, raw: &RawConnection) -> Option<Connection> {
    let bridge = MediaRef::from_raw(raw.bridge.as_ref())?;
    Some(Connection {
        from_slot: edge.from,
        to_slot: edge.to,
        from_choice: Choice::from_raw(raw.from_choice.as_deref()),
        to_choice: Choice::from_raw(raw.to_choice.as_deref()),
        bridge,
    })
}
