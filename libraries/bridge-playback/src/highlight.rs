//! Now-playing label and highlight scheduling
//!
//! Phase entries update the label synchronously and return the timers the
//! engine must arm. Each entry bumps a generation counter; a timer carrying an
//! older generation is a no-op when it fires.
//!
//! During a bridge the label is withheld for a random delay so the listener
//! cannot tell where the transition starts. If the upcoming song is known, a
//! second independently drawn delay previews its title.

use crate::types::{song_label, PlaybackConfig};
use rand::Rng;
use std::time::Duration;

/// What a timer does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightAction {
    /// Remove the active-song marker
    HideHighlight,

    /// Show the neutral bridge label
    RevealBridge,

    /// Show the upcoming song's label
    PreviewUpcoming,
}

/// A timer the engine must arm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerRequest {
    /// Delay from now
    pub delay: Duration,
    /// Generation the timer belongs to
    pub generation: u64,
    /// Action on fire
    pub action: HighlightAction,
}

/// Current now-playing display
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NowPlaying {
    /// Label text, empty when hidden
    pub label: String,
    /// Slot marked active
    pub active_slot: Option<u32>,
    /// Whether the active marker is shown
    pub highlight_visible: bool,
}

/// Derives the now-playing display from phase transitions
#[derive(Debug, Clone)]
pub struct HighlightScheduler {
    highlight_duration: Duration,
    delay_min: Duration,
    delay_max: Duration,
    bridge_label: String,
    generation: u64,
    now_playing: NowPlaying,
    upcoming_label: Option<String>,
    preview_shown: bool,
}

impl HighlightScheduler {
    /// Create a scheduler from playback configuration
    pub fn new(config: &PlaybackConfig) -> Self {
        let (delay_min, delay_max) = config.reveal_delay_range();
        Self {
            highlight_duration: config.highlight_duration(),
            delay_min,
            delay_max,
            bridge_label: config.bridge_label.clone(),
            generation: 0,
            now_playing: NowPlaying::default(),
            upcoming_label: None,
            preview_shown: false,
        }
    }

    /// Current display
    pub fn now_playing(&self) -> &NowPlaying {
        &self.now_playing
    }

    /// Current generation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// A song phase was entered
    pub fn enter_song(&mut self, slot: u32, title: &str) -> Vec<TimerRequest> {
        self.supersede();
        self.now_playing = NowPlaying {
            label: song_label(slot, title),
            active_slot: Some(slot),
            highlight_visible: true,
        };

        vec![TimerRequest {
            delay: self.highlight_duration,
            generation: self.generation,
            action: HighlightAction::HideHighlight,
        }]
    }

    /// A bridge phase was entered; `upcoming` is the song after the bridge
    pub fn enter_bridge<R: Rng + ?Sized>(
        &mut self,
        upcoming: Option<(u32, &str)>,
        rng: &mut R,
    ) -> Vec<TimerRequest> {
        self.supersede();
        self.now_playing = NowPlaying::default();
        self.upcoming_label = upcoming.map(|(slot, title)| song_label(slot, title));

        let mut timers = vec![TimerRequest {
            delay: self.draw_delay(rng),
            generation: self.generation,
            action: HighlightAction::RevealBridge,
        }];
        if self.upcoming_label.is_some() {
            timers.push(TimerRequest {
                delay: self.draw_delay(rng),
                generation: self.generation,
                action: HighlightAction::PreviewUpcoming,
            });
        }
        timers
    }

    /// The session finished: cancel timers, keep the label
    pub fn finish(&mut self) {
        self.supersede();
        self.now_playing.highlight_visible = false;
    }

    /// The session was reset
    pub fn reset(&mut self) {
        self.supersede();
        self.now_playing = NowPlaying::default();
    }

    /// Apply a fired timer; returns whether the display changed
    pub fn fire(&mut self, generation: u64, action: HighlightAction) -> bool {
        if generation != self.generation {
            return false;
        }

        let before = self.now_playing.clone();
        match action {
            HighlightAction::HideHighlight => {
                self.now_playing.highlight_visible = false;
            }
            HighlightAction::RevealBridge => {
                if !self.preview_shown {
                    self.now_playing.label = self.bridge_label.clone();
                }
            }
            HighlightAction::PreviewUpcoming => {
                if let Some(label) = self.upcoming_label.clone() {
                    self.now_playing.label = label;
                    self.preview_shown = true;
                }
            }
        }
        self.now_playing != before
    }

    fn supersede(&mut self) {
        self.generation += 1;
        self.upcoming_label = None;
        self.preview_shown = false;
    }

    fn draw_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let lo = self.delay_min.as_millis() as u64;
        let hi = self.delay_max.as_millis() as u64;
        Duration::from_millis(rng.gen_range(lo..=hi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scheduler() -> HighlightScheduler {
        HighlightScheduler::new(&PlaybackConfig::default())
    }

    #[test]
    fn test_song_entry_shows_highlight() {
        let mut s = scheduler();
        let timers = s.enter_song(2, "Glass");

        assert_eq!(s.now_playing().label, "2. Glass");
        assert_eq!(s.now_playing().active_slot, Some(2));
        assert!(s.now_playing().highlight_visible);
        assert_eq!(timers.len(), 1);
        assert_eq!(timers[0].delay, Duration::from_secs(100));
        assert_eq!(timers[0].action, HighlightAction::HideHighlight);

        assert!(s.fire(timers[0].generation, HighlightAction::HideHighlight));
        assert!(!s.now_playing().highlight_visible);
        assert_eq!(s.now_playing().active_slot, Some(2));
    }

    #[test]
    fn test_bridge_entry_clears_and_draws_delays_in_range() {
        let mut s = scheduler();
        let mut rng = StdRng::seed_from_u64(11);
        s.enter_song(1, "Opening");

        for _ in 0..50 {
            let timers = s.enter_bridge(Some((2, "Glass")), &mut rng);
            assert_eq!(s.now_playing(), &NowPlaying::default());
            assert_eq!(timers.len(), 2);
            for t in &timers {
                assert!(t.delay >= Duration::from_secs(5));
                assert!(t.delay <= Duration::from_secs(20));
            }
        }
    }

    #[test]
    fn test_bridge_without_upcoming_only_reveals() {
        let mut s = scheduler();
        let mut rng = StdRng::seed_from_u64(1);
        let timers = s.enter_bridge(None, &mut rng);

        assert_eq!(timers.len(), 1);
        assert!(s.fire(timers[0].generation, HighlightAction::RevealBridge));
        assert_eq!(s.now_playing().label, "Bridge");
    }

    #[test]
    fn test_preview_wins_over_late_reveal() {
        let mut s = scheduler();
        let mut rng = StdRng::seed_from_u64(5);
        let generation = s.enter_bridge(Some((3, "Undertow")), &mut rng)[0].generation;

        assert!(s.fire(generation, HighlightAction::PreviewUpcoming));
        assert_eq!(s.now_playing().label, "3. Undertow");
        assert!(!s.fire(generation, HighlightAction::RevealBridge));
        assert_eq!(s.now_playing().label, "3. Undertow");
        assert!(!s.now_playing().highlight_visible);
    }

    #[test]
    fn test_stale_timer_is_noop() {
        let mut s = scheduler();
        let mut rng = StdRng::seed_from_u64(5);
        let stale = s.enter_bridge(Some((3, "Undertow")), &mut rng);
        s.enter_song(3, "Undertow");

        for t in stale {
            assert!(!s.fire(t.generation, t.action));
        }
        assert!(s.now_playing().highlight_visible);
        assert_eq!(s.now_playing().label, "3. Undertow");
    }

    #[test]
    fn test_finish_keeps_label() {
        let mut s = scheduler();
        let timers = s.enter_song(4, "Coda");
        s.finish();

        assert_eq!(s.now_playing().label, "4. Coda");
        assert!(!s.now_playing().highlight_visible);
        assert!(!s.fire(timers[0].generation, HighlightAction::HideHighlight));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut s = scheduler();
        s.enter_song(4, "Coda");
        s.reset();
        assert_eq!(s.now_playing(), &NowPlaying::default());
    }
}
