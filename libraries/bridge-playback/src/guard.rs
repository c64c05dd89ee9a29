//! End-signal guard
//!
//! Some devices fire completion-like events while a source is being
//! swapped. An end signal is accepted only if:
//! - a source is armed and has not already produced an accepted end
//! - the cooldown since the last accepted end has elapsed
//! - real playback progress was observed for the armed source

use std::time::{Duration, Instant};

/// Why an end signal was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndRejection {
    /// Nothing is loaded
    NoSource,

    /// The armed source already ended once
    AlreadyAccepted,

    /// Too soon after the previous accepted end
    Cooldown {
        /// Time since the previous accepted end
        since: Duration,
    },

    /// Not enough progress observed for this source
    NoProgress {
        /// Furthest position observed
        progress: Duration,
    },
}

/// Deduplicates and filters end signals
#[derive(Debug, Clone)]
pub struct EndSignalGuard {
    cooldown: Duration,
    min_progress: Duration,
    armed_token: Option<u64>,
    accepted: bool,
    progress: Duration,
    last_accepted_at: Option<Instant>,
}

impl EndSignalGuard {
    /// Create a guard
    pub fn new(cooldown: Duration, min_progress: Duration) -> Self {
        Self {
            cooldown,
            min_progress,
            armed_token: None,
            accepted: false,
            progress: Duration::ZERO,
            last_accepted_at: None,
        }
    }

    /// A new source was loaded under `token`
    pub fn arm(&mut self, token: u64) {
        self.armed_token = Some(token);
        self.accepted = false;
        self.progress = Duration::ZERO;
    }

    /// The current source was unloaded
    pub fn disarm(&mut self) {
        self.armed_token = None;
        self.accepted = false;
        self.progress = Duration::ZERO;
    }

    /// Token of the armed source
    pub fn armed_token(&self) -> Option<u64> {
        self.armed_token
    }

    /// Record a position report for the armed source
    pub fn observe_progress(&mut self, position: Duration) {
        if self.armed_token.is_some() && position > self.progress {
            self.progress = position;
        }
    }

    /// Furthest position observed for the armed source
    pub fn progress(&self) -> Duration {
        self.progress
    }

    /// Decide on an end signal reported at `position`
    ///
    /// On acceptance the source is marked ended and the cooldown restarts.
    pub fn try_accept(&mut self, position: Duration, now: Instant) -> Result<(), EndRejection> {
        if self.armed_token.is_none() {
            return Err(EndRejection::NoSource);
        }
        if self.accepted {
            return Err(EndRejection::AlreadyAccepted);
        }
        if let Some(last) = self.last_accepted_at {
            let since = now.saturating_duration_since(last);
            if since < self.cooldown {
                return Err(EndRejection::Cooldown { since });
            }
        }

        let progress = self.progress.max(position);
        if progress < self.min_progress {
            return Err(EndRejection::NoProgress { progress });
        }

        self.accepted = true;
        self.last_accepted_at = Some(now);
        Ok(())
    }

    /// Mark the armed source ended without checks (user skip)
    pub fn force_accept(&mut self, now: Instant) {
        self.accepted = true;
        self.last_accepted_at = Some(now);
    }

    /// Forget everything, including the cooldown
    pub fn reset(&mut self) {
        self.disarm();
        self.last_accepted_at = None;
    }
}
