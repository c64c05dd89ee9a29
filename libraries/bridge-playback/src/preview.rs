//! Preview cap for non-owned releases

use std::time::Duration;

/// Fires once per item when playback reaches the cap
#[derive(Debug, Clone)]
pub struct PreviewCap {
    cap: Duration,
    tolerance: Duration,
    fired: bool,
}

impl PreviewCap {
    /// Create a cap that fires at `cap - tolerance`
    pub fn new(cap: Duration, tolerance: Duration) -> Self {
        Self {
            cap,
            tolerance,
            fired: false,
        }
    }

    /// Cap length
    pub fn cap(&self) -> Duration {
        self.cap
    }

    /// Feed a position report; true exactly once per item
    pub fn observe(&mut self, position: Duration) -> bool {
        if self.fired || position < self.cap.saturating_sub(self.tolerance) {
            return false;
        }
        self.fired = true;
        true
    }

    /// Whether the cap has fired for the current item
    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Re-arm for a new item
    pub fn rearm(&mut self) {
        self.fired = false;
    }
}
