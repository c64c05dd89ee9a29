//! Core types for adaptive playback

use bridge_core::Choice;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One entry of the playback queue
///
/// Queues alternate strictly `Song, Bridge, Song, ..., Song`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QueueItem {
    /// A song, with the variant already chosen from the adjacent edges
    #[serde(rename_all = "camelCase")]
    Song {
        /// Song slot
        slot: u32,
        /// Display title
        title: String,
        /// Variant that `source_key` belongs to
        choice: Choice,
        /// Opaque key of the chosen variant
        source_key: String,
    },

    /// A bridge clip between two songs
    #[serde(rename_all = "camelCase")]
    Bridge {
        /// Slot the bridge leaves from
        from_slot: u32,
        /// Slot the bridge arrives at
        to_slot: u32,
        /// Opaque key of the bridge clip
        source_key: String,
    },
}

impl QueueItem {
    /// Opaque source key to resolve for this item
    pub fn source_key(&self) -> &str {
        match self {
            Self::Song { source_key, .. } | Self::Bridge { source_key, .. } => source_key,
        }
    }

    /// Phase the device is in while this item is loaded
    pub fn phase(&self) -> Phase {
        match self {
            Self::Song { .. } => Phase::Song,
            Self::Bridge { .. } => Phase::Bridge,
        }
    }

    /// Whether this is a song item
    pub fn is_song(&self) -> bool {
        matches!(self, Self::Song { .. })
    }

    /// Whether this is a bridge item
    pub fn is_bridge(&self) -> bool {
        matches!(self, Self::Bridge { .. })
    }

    /// Slot of a song item
    pub fn song_slot(&self) -> Option<u32> {
        match self {
            Self::Song { slot, .. } => Some(*slot),
            Self::Bridge { .. } => None,
        }
    }

    /// Variant of a song item
    pub fn choice(&self) -> Option<Choice> {
        match self {
            Self::Song { choice, .. } => Some(*choice),
            Self::Bridge { .. } => None,
        }
    }

    /// `"<slot>. <title>"` label for a song item
    pub fn label(&self) -> Option<String> {
        match self {
            Self::Song { slot, title, .. } => Some(song_label(*slot, title)),
            Self::Bridge { .. } => None,
        }
    }
}

/// Format the now-playing label of a song
pub fn song_label(slot: u32, title: &str) -> String {
    format!("{}. {}", slot, title)
}

/// Whether the device holds a song or a bridge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// A song is loaded
    #[default]
    Song,
    /// A bridge is loaded
    Bridge,
}

/// Engine state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    /// No session
    #[default]
    Idle,

    /// Resolving or starting the current item
    Loading,

    /// A song is audibly playing
    PlayingSong,

    /// A bridge is audibly playing
    PlayingBridge,

    /// Current item loaded but not playing
    Paused,

    /// Last item ended; no wraparound
    Finished,
}

impl EngineState {
    /// Whether a session is running (not idle, not finished)
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Idle | Self::Finished)
    }
}

/// Listening mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListeningMode {
    /// Owned release: items play to their end
    #[default]
    Full,

    /// Non-owned release: every item is capped
    Preview,
}

/// Playback policy constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Window after an accepted end signal in which further ends are ignored
    pub end_cooldown_ms: u64,

    /// Progress that must be observed before an end signal is believed
    pub min_progress_ms: u64,

    /// How long a song stays highlighted after it starts
    pub highlight_duration_ms: u64,

    /// Lower bound of the randomized bridge label delays
    pub reveal_delay_min_ms: u64,

    /// Upper bound of the randomized bridge label delays
    pub reveal_delay_max_ms: u64,

    /// Preview-mode cap per item
    pub preview_cap_ms: u64,

    /// How early before the cap the preview may fire
    pub preview_tolerance_ms: u64,

    /// Resolver attempts per item (minimum 1)
    pub resolve_attempts: u32,

    /// Timeout of one resolver attempt
    pub resolve_timeout_ms: u64,

    /// Resolve the next item while the current one plays
    pub prefetch_next: bool,

    /// Label shown once a bridge is revealed
    pub bridge_label: String,

    /// Initial listening mode
    pub listening_mode: ListeningMode,

    /// Fixed RNG seed (random when absent)
    pub seed: Option<u64>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            end_cooldown_ms: 350,
            min_progress_ms: 250,
            highlight_duration_ms: 100_000,
            reveal_delay_min_ms: 5_000,
            reveal_delay_max_ms: 20_000,
            preview_cap_ms: 40_000,
            preview_tolerance_ms: 50,
            resolve_attempts: 1,
            resolve_timeout_ms: 15_000,
            prefetch_next: true,
            bridge_label: "Bridge".to_string(),
            listening_mode: ListeningMode::Full,
            seed: None,
        }
    }
}

impl PlaybackConfig {
    /// End-signal cooldown
    pub fn end_cooldown(&self) -> Duration {
        Duration::from_millis(self.end_cooldown_ms)
    }

    /// Minimum observed progress
    pub fn min_progress(&self) -> Duration {
        Duration::from_millis(self.min_progress_ms)
    }

    /// Highlight duration
    pub fn highlight_duration(&self) -> Duration {
        Duration::from_millis(self.highlight_duration_ms)
    }

    /// Bridge label delay range, normalized so that `min <= max`
    pub fn reveal_delay_range(&self) -> (Duration, Duration) {
        let lo = self.reveal_delay_min_ms.min(self.reveal_delay_max_ms);
        let hi = self.reveal_delay_min_ms.max(self.reveal_delay_max_ms);
        (Duration::from_millis(lo), Duration::from_millis(hi))
    }

    /// Preview cap
    pub fn preview_cap(&self) -> Duration {
        Duration::from_millis(self.preview_cap_ms)
    }

    /// Preview early-fire tolerance
    pub fn preview_tolerance(&self) -> Duration {
        Duration::from_millis(self.preview_tolerance_ms)
    }

    /// Resolver timeout per attempt
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }
}

/// Observable playback state, published on every change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    /// Engine state
    pub state: EngineState,

    /// Phase of the current item
    pub phase: Phase,

    /// Item the device holds
    pub current_queue_item: Option<QueueItem>,

    /// Index of the current item in the queue
    pub index: Option<usize>,

    /// Queue length
    pub queue_len: usize,

    /// Whether the device is audibly playing
    pub is_playing: bool,

    /// Whether playback is wanted (may differ from `is_playing`)
    pub wants_playing: bool,

    /// Now-playing label; empty when hidden
    pub now_playing_label: String,

    /// Slot marked active
    pub active_song_slot: Option<u32>,

    /// Whether the active marker is shown
    pub highlight_visible: bool,
}

/// Result of a start request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartOutcome {
    /// Whether a session was started
    pub ok: bool,

    /// Why not, when `ok` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StartOutcome {
    /// A started session
    pub fn started() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    /// A refused start
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
        }
    }
}
