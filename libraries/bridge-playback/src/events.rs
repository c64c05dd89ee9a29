//! Session events and device commands
//!
//! The session machine never touches the device itself. It queues
//! [`DeviceCommand`]s for the engine to execute and [`PlaybackEvent`]s for
//! observers, both drained after every input.

use crate::types::{EngineState, Phase, QueueItem};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Work the engine must perform on behalf of the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Resolve the source of queue item `index`, reporting back with `token`
    Resolve {
        /// Swap token the result belongs to
        token: u64,
        /// Queue index
        index: usize,
        /// Key to resolve
        source_key: String,
    },

    /// Resolve item `index` ahead of time for session `session`
    Prefetch {
        /// Session the result belongs to
        session: u64,
        /// Queue index
        index: usize,
        /// Key to resolve
        source_key: String,
    },

    /// Load a resolved URL onto the device
    Load {
        /// Swap token of the load
        token: u64,
        /// Playable URL
        url: String,
    },

    /// Start playback; the settlement reports back with `token`
    Play {
        /// Swap token the play belongs to
        token: u64,
    },

    /// Pause the device
    Pause,

    /// Move the device position
    Seek(Duration),

    /// Pause and unload; cancels in-flight resolutions
    Stop,
}

/// Why the session moved past an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndOrigin {
    /// The device reported completion
    Device,
    /// The preview cap was reached
    PreviewCap,
    /// The user skipped
    Skip,
}

/// Events emitted by the session machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// A new session started
    SessionStarted {
        /// Queue length
        queue_len: usize,
    },

    /// Engine state changed
    StateChanged {
        /// New state
        state: EngineState,
    },

    /// An item was entered
    PhaseEntered {
        /// Phase of the item
        phase: Phase,
        /// Queue index
        index: usize,
        /// The item
        item: QueueItem,
        /// For bridges, the song that follows (slot, title)
        upcoming: Option<(u32, String)>,
    },

    /// The current item ended and was accepted
    ItemEnded {
        /// Queue index
        index: usize,
        /// What ended it
        origin: EndOrigin,
    },

    /// The URL of an upcoming item is cached
    NextItemPrepared {
        /// Queue index
        index: usize,
    },

    /// An item was skipped after a soft failure
    ItemSkipped {
        /// Queue index
        index: usize,
        /// Failure description
        reason: String,
    },

    /// The last item ended
    Finished,

    /// The session was torn down
    SessionReset,

    /// A non-fatal error occurred
    Error {
        /// Error message
        message: String,
    },
}
