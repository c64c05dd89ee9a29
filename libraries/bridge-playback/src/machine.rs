//! Session state machine
//!
//! Sequences the queue over a single shared device. Every input is a method
//! call that runs to completion; the machine never awaits. Device work is
//! queued as [`DeviceCommand`]s and observations as [`PlaybackEvent`]s, both
//! drained by the engine after each input, so async work spawned by a
//! transition can only observe the state after that transition.
//!
//! Race handling:
//! - every source swap bumps `swap_token`; resolve and play completions carry
//!   the token they were issued under and are dropped when stale
//! - end signals pass through [`EndSignalGuard`] (one per source, cooldown,
//!   minimum progress)
//! - intent (`wants_playing`) is tracked apart from the device state; a
//!   rejected play leaves intent set so the next `user_play` retries

use crate::device::DeviceError;
use crate::error::{PlaybackError, Result};
use crate::events::{DeviceCommand, EndOrigin, PlaybackEvent};
use crate::guard::EndSignalGuard;
use crate::preview::PreviewCap;
use crate::queue::validate_alternation;
use crate::types::{EngineState, ListeningMode, Phase, PlaybackConfig, QueueItem};
use bridge_core::Choice;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Where to go once the current bridge ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTransition {
    /// Queue index of the song after the bridge
    pub next_index: usize,
    /// Variant that song plays
    pub arrival_choice: Choice,
}

/// Queue position of one adaptive playthrough
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    queue: Vec<QueueItem>,
    index: usize,
    phase: Phase,
    pending_transition: Option<PendingTransition>,
}

impl PlaybackSession {
    fn new(queue: Vec<QueueItem>) -> Self {
        Self {
            queue,
            index: 0,
            phase: Phase::Song,
            pending_transition: None,
        }
    }

    /// The queue
    pub fn queue(&self) -> &[QueueItem] {
        &self.queue
    }

    /// Index of the current item
    pub fn index(&self) -> usize {
        self.index
    }

    /// Phase of the current item
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current item
    pub fn current_item(&self) -> Option<&QueueItem> {
        self.queue.get(self.index)
    }

    /// Pending bridge exit
    pub fn pending_transition(&self) -> Option<PendingTransition> {
        self.pending_transition
    }
}

enum Next {
    Enter(usize),
    Finish,
}

/// Synchronous adaptive playback state machine
#[derive(Debug)]
pub struct SessionMachine {
    session: Option<PlaybackSession>,
    state: EngineState,

    // Intent vs device
    wants_playing: bool,
    device_playing: bool,

    // Source swap bookkeeping
    session_id: u64,
    swap_token: u64,
    loaded: bool,
    play_in_flight: Option<u64>,
    autoplay_blocked: bool,
    ready_retry_used: bool,

    listening_mode: ListeningMode,
    prefetch_next: bool,
    guard: EndSignalGuard,
    preview: PreviewCap,

    // Resolved URLs by queue index; cleared with the session
    resolved: HashMap<usize, String>,
    prefetching: Option<usize>,

    pending_commands: Vec<DeviceCommand>,
    pending_events: Vec<PlaybackEvent>,
}

impl SessionMachine {
    /// Create an idle machine
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            session: None,
            state: EngineState::Idle,
            wants_playing: false,
            device_playing: false,
            session_id: 0,
            swap_token: 0,
            loaded: false,
            play_in_flight: None,
            autoplay_blocked: false,
            ready_retry_used: false,
            listening_mode: config.listening_mode,
            prefetch_next: config.prefetch_next,
            guard: EndSignalGuard::new(config.end_cooldown(), config.min_progress()),
            preview: PreviewCap::new(config.preview_cap(), config.preview_tolerance()),
            resolved: HashMap::new(),
            prefetching: None,
            pending_commands: Vec::new(),
            pending_events: Vec::new(),
        }
    }

    // ===== Session Lifecycle =====

    /// Start a session over `queue`, replacing any running one
    ///
    /// # Errors
    /// Returns `InvalidOperation` if the queue is empty or does not alternate
    /// song/bridge starting and ending on a song.
    pub fn start(&mut self, queue: Vec<QueueItem>) -> Result<()> {
        if !validate_alternation(&queue) {
            return Err(PlaybackError::InvalidOperation(
                "queue must alternate song/bridge and start and end on a song".to_string(),
            ));
        }

        self.teardown();
        self.session_id += 1;
        info!(queue_len = queue.len(), session = self.session_id, "Adaptive session started");

        self.pending_events.push(PlaybackEvent::SessionStarted {
            queue_len: queue.len(),
        });
        self.session = Some(PlaybackSession::new(queue));
        self.wants_playing = true;
        self.enter(0);
        Ok(())
    }

    /// Tear the session down and return to `Idle`
    ///
    /// Invalidates every in-flight resolution and play attempt.
    pub fn reset(&mut self) {
        if self.session.is_none() && self.state == EngineState::Idle {
            return;
        }
        self.teardown();
        self.set_state(EngineState::Idle);
    }

    fn teardown(&mut self) {
        let had_session = self.session.take().is_some();

        self.swap_token += 1;
        self.loaded = false;
        self.play_in_flight = None;
        self.device_playing = false;
        self.wants_playing = false;
        self.autoplay_blocked = false;
        self.ready_retry_used = false;
        self.guard.reset();
        self.preview.rearm();
        self.resolved.clear();
        self.prefetching = None;

        if had_session {
            info!(session = self.session_id, "Adaptive session reset");
            self.pending_commands.push(DeviceCommand::Stop);
            self.pending_events.push(PlaybackEvent::SessionReset);
        }
    }

    /// Change the listening mode; applies from the next time update
    pub fn set_listening_mode(&mut self, mode: ListeningMode) {
        if self.listening_mode != mode {
            debug!(?mode, "Listening mode changed");
            self.listening_mode = mode;
        }
    }

    // ===== User Input =====

    /// Express intent to play
    pub fn user_play(&mut self) {
        if !self.state.is_active() {
            return;
        }
        self.wants_playing = true;
        self.autoplay_blocked = false;

        if self.loaded && !self.device_playing && self.play_in_flight.is_none() {
            self.request_play();
        }
    }

    /// Express intent to pause
    pub fn user_pause(&mut self) {
        if !self.state.is_active() {
            return;
        }
        self.wants_playing = false;
        self.autoplay_blocked = false;

        if self.device_playing || self.play_in_flight.is_some() {
            self.pending_commands.push(DeviceCommand::Pause);
        }
        self.device_playing = false;
        if self.loaded {
            self.set_state(EngineState::Paused);
        }
    }

    /// Seek within the current item
    pub fn user_seek(&mut self, position: Duration) {
        if self.state.is_active() && self.loaded {
            self.pending_commands.push(DeviceCommand::Seek(position));
        }
    }

    /// Move past the current item as if it had ended
    pub fn user_skip(&mut self, now: Instant) {
        if !self.state.is_active() {
            return;
        }
        if self.device_playing || self.play_in_flight.is_some() {
            self.pending_commands.push(DeviceCommand::Pause);
        }
        self.device_playing = false;
        self.guard.force_accept(now);
        self.accept_end(EndOrigin::Skip);
    }

    // ===== Device Input =====

    /// The device reported completion of the loaded source
    pub fn item_ended(&mut self, position: Duration, now: Instant) {
        if !self.state.is_active() {
            debug!(state = ?self.state, "End signal without an active session ignored");
            return;
        }
        if !self.loaded {
            debug!(token = self.swap_token, "End signal during source swap ignored");
            return;
        }

        match self.guard.try_accept(position, now) {
            Ok(()) => {
                self.device_playing = false;
                self.accept_end(EndOrigin::Device);
            }
            Err(reason) => {
                debug!(?reason, token = self.swap_token, "End signal suppressed");
            }
        }
    }

    /// The device reported a new position
    ///
    /// Only counted once the current source's play has settled; updates still
    /// queued from the previous source arrive before that settlement.
    pub fn time_update(&mut self, position: Duration, now: Instant) {
        if !self.state.is_active() || !self.loaded {
            return;
        }
        if !self.device_playing {
            trace!(token = self.swap_token, ?position, "Time update before play settled ignored");
            return;
        }
        self.guard.observe_progress(position);

        if self.listening_mode == ListeningMode::Preview
            && self.wants_playing
            && self.preview.observe(position)
        {
            info!(index = self.index(), cap = ?self.preview.cap(), "Preview cap reached");
            self.pending_commands.push(DeviceCommand::Pause);
            self.pending_commands.push(DeviceCommand::Seek(Duration::ZERO));
            self.device_playing = false;
            self.guard.force_accept(now);
            self.accept_end(EndOrigin::PreviewCap);
        }
    }

    /// The device can start the loaded source; retries a failed start once
    pub fn on_device_ready(&mut self) {
        if self.state.is_active()
            && self.loaded
            && self.wants_playing
            && !self.device_playing
            && self.play_in_flight.is_none()
            && !self.ready_retry_used
        {
            debug!(token = self.swap_token, "Device ready, retrying play");
            self.ready_retry_used = true;
            self.autoplay_blocked = false;
            self.request_play();
        }
    }

    // ===== Async Completions =====

    /// Resolution of the current item finished
    pub fn on_resolved(&mut self, token: u64, index: usize, result: Result<String>) {
        if token != self.swap_token || self.loaded || Some(index) != self.current_index() {
            debug!(token, current = self.swap_token, index, "Stale resolution ignored");
            return;
        }

        match result {
            Ok(url) => {
                self.resolved.insert(index, url.clone());
                self.load(url);
            }
            Err(e) => {
                warn!(index, error = %e, "Source resolution failed, skipping");
                self.skip_failed(index, e.to_string());
            }
        }
    }

    /// Ahead-of-time resolution finished
    pub fn on_prefetched(&mut self, session: u64, index: usize, result: Result<String>) {
        if self.prefetching == Some(index) {
            self.prefetching = None;
        }
        if session != self.session_id || self.session.is_none() {
            return;
        }

        match result {
            Ok(url) => {
                if !self.resolved.contains_key(&index) {
                    self.resolved.insert(index, url);
                    self.pending_events
                        .push(PlaybackEvent::NextItemPrepared { index });
                }
            }
            Err(e) => {
                debug!(index, error = %e, "Prefetch failed, resolving on entry instead");
            }
        }
    }

    /// A play request settled
    pub fn on_play_settled(&mut self, token: u64, result: std::result::Result<(), DeviceError>) {
        if token != self.swap_token || self.play_in_flight != Some(token) {
            debug!(token, current = self.swap_token, "Stale play settlement ignored");
            return;
        }
        self.play_in_flight = None;

        match result {
            Ok(()) if self.wants_playing => {
                self.device_playing = true;
                self.autoplay_blocked = false;
                self.set_state(self.playing_state());
                self.prefetch();
            }
            Ok(()) => {
                // Paused while the play was pending
                self.pending_commands.push(DeviceCommand::Pause);
                self.device_playing = false;
                self.set_state(EngineState::Paused);
            }
            Err(_) if !self.wants_playing => {
                self.device_playing = false;
                self.set_state(EngineState::Paused);
            }
            Err(DeviceError(reason)) => {
                self.device_playing = false;
                let index = self.index();
                if self.phase() == Some(Phase::Bridge) {
                    warn!(index, %reason, "Bridge playback failed, skipping to next song");
                    self.skip_failed(index, format!("bridge playback failed: {}", reason));
                } else {
                    let err = PlaybackError::AutoplayBlocked(reason);
                    info!(index, error = %err, "Waiting for user gesture");
                    self.autoplay_blocked = true;
                    self.pending_events.push(PlaybackEvent::Error {
                        message: err.to_string(),
                    });
                    self.set_state(EngineState::Paused);
                }
            }
        }
    }

    // ===== Transitions =====

    fn accept_end(&mut self, origin: EndOrigin) {
        let index = self.index();
        self.pending_events
            .push(PlaybackEvent::ItemEnded { index, origin });
        self.advance();
    }

    fn advance(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let next = match session.phase {
            Phase::Song => {
                let next = session.index + 1;
                match session.queue.get(next) {
                    None => Next::Finish,
                    Some(QueueItem::Bridge { .. }) => {
                        session.pending_transition = session
                            .queue
                            .get(next + 1)
                            .and_then(QueueItem::choice)
                            .map(|arrival_choice| PendingTransition {
                                next_index: next + 1,
                                arrival_choice,
                            });
                        Next::Enter(next)
                    }
                    Some(QueueItem::Song { .. }) => Next::Enter(next),
                }
            }
            Phase::Bridge => match session.pending_transition.take() {
                Some(pending) => Next::Enter(pending.next_index),
                None => {
                    warn!(index = session.index, "Bridge ended without a pending transition");
                    Next::Finish
                }
            },
        };

        match next {
            Next::Enter(index) => self.enter(index),
            Next::Finish => self.finish(),
        }
    }

    fn skip_failed(&mut self, index: usize, reason: String) {
        self.pending_events
            .push(PlaybackEvent::ItemSkipped { index, reason });

        let Some(session) = self.session.as_mut() else {
            return;
        };
        let next = match session.queue.get(index) {
            Some(QueueItem::Bridge { .. }) => session.pending_transition.map(|p| p.next_index),
            // The song's outgoing bridge leads nowhere without it
            Some(QueueItem::Song { .. }) => Some(index + 2).filter(|&n| n < session.queue.len()),
            None => None,
        };
        session.pending_transition = None;

        match next {
            Some(next) => self.enter(next),
            None => self.finish(),
        }
    }

    fn enter(&mut self, index: usize) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(item) = session.queue.get(index).cloned() else {
            self.finish();
            return;
        };

        session.index = index;
        session.phase = item.phase();
        let upcoming = match &item {
            QueueItem::Bridge { .. } => session
                .pending_transition
                .and_then(|p| session.queue.get(p.next_index))
                .and_then(|next| match next {
                    QueueItem::Song { slot, title, .. } => Some((*slot, title.clone())),
                    QueueItem::Bridge { .. } => None,
                }),
            QueueItem::Song { .. } => {
                session.pending_transition = None;
                None
            }
        };

        debug!(index, phase = ?item.phase(), key = item.source_key(), "Entering item");
        self.pending_events.push(PlaybackEvent::PhaseEntered {
            phase: item.phase(),
            index,
            item: item.clone(),
            upcoming,
        });
        self.swap_to(index, item.source_key());
    }

    fn swap_to(&mut self, index: usize, source_key: &str) {
        self.swap_token += 1;
        self.loaded = false;
        self.play_in_flight = None;
        self.device_playing = false;
        self.autoplay_blocked = false;
        self.ready_retry_used = false;
        self.guard.disarm();
        self.preview.rearm();
        self.set_state(EngineState::Loading);

        match self.resolved.get(&index).cloned() {
            Some(url) => {
                debug!(index, "Using cached source URL");
                self.load(url);
            }
            None => self.pending_commands.push(DeviceCommand::Resolve {
                token: self.swap_token,
                index,
                source_key: source_key.to_string(),
            }),
        }
    }

    fn load(&mut self, url: String) {
        let token = self.swap_token;
        self.pending_commands.push(DeviceCommand::Load { token, url });
        self.loaded = true;
        self.guard.arm(token);

        if self.wants_playing {
            self.request_play();
        } else {
            self.set_state(EngineState::Paused);
        }
    }

    fn request_play(&mut self) {
        let token = self.swap_token;
        self.play_in_flight = Some(token);
        self.pending_commands.push(DeviceCommand::Play { token });
    }

    fn prefetch(&mut self) {
        if !self.prefetch_next {
            return;
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let next = session.index + 1;
        let Some(item) = session.queue.get(next) else {
            return;
        };
        if self.resolved.contains_key(&next) || self.prefetching == Some(next) {
            return;
        }

        self.prefetching = Some(next);
        self.pending_commands.push(DeviceCommand::Prefetch {
            session: self.session_id,
            index: next,
            source_key: item.source_key().to_string(),
        });
    }

    fn finish(&mut self) {
        self.swap_token += 1;
        self.loaded = false;
        self.play_in_flight = None;
        self.device_playing = false;
        self.wants_playing = false;
        self.autoplay_blocked = false;
        self.guard.disarm();
        if let Some(session) = self.session.as_mut() {
            session.pending_transition = None;
        }

        info!(session = self.session_id, "Adaptive session finished");
        self.pending_commands.push(DeviceCommand::Pause);
        self.set_state(EngineState::Finished);
        self.pending_events.push(PlaybackEvent::Finished);
    }

    fn set_state(&mut self, state: EngineState) {
        if self.state != state {
            self.state = state;
            self.pending_events
                .push(PlaybackEvent::StateChanged { state });
        }
    }

    fn playing_state(&self) -> EngineState {
        match self.phase() {
            Some(Phase::Bridge) => EngineState::PlayingBridge,
            _ => EngineState::PlayingSong,
        }
    }

    // ===== State Queries =====

    /// Engine state
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Running session, if any
    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    /// Phase of the current item
    pub fn phase(&self) -> Option<Phase> {
        self.session.as_ref().map(PlaybackSession::phase)
    }

    /// Current item
    pub fn current_item(&self) -> Option<&QueueItem> {
        self.session.as_ref().and_then(PlaybackSession::current_item)
    }

    fn current_index(&self) -> Option<usize> {
        self.session.as_ref().map(PlaybackSession::index)
    }

    fn index(&self) -> usize {
        self.current_index().unwrap_or_default()
    }

    /// Whether playback is wanted
    pub fn wants_playing(&self) -> bool {
        self.wants_playing
    }

    /// Whether the device is audibly playing
    pub fn is_playing(&self) -> bool {
        self.device_playing
    }

    /// Whether the last start was refused and a user gesture is awaited
    pub fn autoplay_blocked(&self) -> bool {
        self.autoplay_blocked
    }

    /// Current swap token
    pub fn swap_token(&self) -> u64 {
        self.swap_token
    }

    /// Whether `token` belongs to the current source
    pub fn is_current(&self, token: u64) -> bool {
        token == self.swap_token
    }

    /// Listening mode
    pub fn listening_mode(&self) -> ListeningMode {
        self.listening_mode
    }

    /// Cached URL of a queue item
    pub fn resolved_url(&self, index: usize) -> Option<&str> {
        self.resolved.get(&index).map(String::as_str)
    }

    // ===== Output Queues =====

    /// Take queued device commands
    pub fn drain_commands(&mut self) -> Vec<DeviceCommand> {
        std::mem::take(&mut self.pending_commands)
    }

    /// Take queued events
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Whether output is waiting to be drained
    pub fn has_pending_output(&self) -> bool {
        !self.pending_commands.is_empty() || !self.pending_events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===== Test Helpers =====

    fn song(slot: u32) -> QueueItem {
        QueueItem::Song {
            slot,
            title: format!("Song {}", slot),
            choice: Choice::A,
            source_key: format!("song-{}", slot),
        }
    }

    fn bridge(from: u32, to: u32) -> QueueItem {
        QueueItem::Bridge {
            from_slot: from,
            to_slot: to,
            source_key: format!("bridge-{}-{}", from, to),
        }
    }

    fn queue_123() -> Vec<QueueItem> {
        vec![song(1), bridge(1, 2), song(2), bridge(2, 3), song(3)]
    }

    fn config() -> PlaybackConfig {
        PlaybackConfig {
            prefetch_next: false,
            ..PlaybackConfig::default()
        }
    }

    fn machine() -> SessionMachine {
        SessionMachine::new(&config())
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    /// Answer the pending resolve and play of the current item
    fn load_and_play(m: &mut SessionMachine) -> u64 {
        let (token, index) = m
            .drain_commands()
            .into_iter()
            .find_map(|c| match c {
                DeviceCommand::Resolve { token, index, .. } => Some((token, index)),
                _ => None,
            })
            .expect("resolve command");
        m.on_resolved(token, index, Ok(format!("https://cdn/{}", index)));
        let cmds = m.drain_commands();
        assert!(cmds.contains(&DeviceCommand::Play { token }));
        m.on_play_settled(token, Ok(()));
        token
    }

    /// Play the current item to its natural end
    fn play_to_end(m: &mut SessionMachine, now: &mut Instant) {
        m.time_update(secs(30), *now);
        m.item_ended(secs(30), *now);
        *now += secs(1);
    }

    // ===== Lifecycle =====

    #[test]
    fn test_start_resolves_first_item() {
        let mut m = machine();
        m.start(queue_123()).unwrap();

        assert_eq!(m.state(), EngineState::Loading);
        assert!(m.wants_playing());
        let cmds = m.drain_commands();
        assert_eq!(
            cmds,
            vec![DeviceCommand::Resolve {
                token: m.swap_token(),
                index: 0,
                source_key: "song-1".to_string()
            }]
        );
    }

    #[test]
    fn test_start_rejects_malformed_queue() {
        let mut m = machine();
        assert!(m.start(vec![]).is_err());
        assert!(m.start(vec![song(1), bridge(1, 2)]).is_err());
        assert_eq!(m.state(), EngineState::Idle);
    }

    #[test]
    fn test_resolve_then_play_reaches_playing_song() {
        let mut m = machine();
        m.start(queue_123()).unwrap();
        load_and_play(&mut m);

        assert_eq!(m.state(), EngineState::PlayingSong);
        assert!(m.is_playing());
        assert_eq!(m.resolved_url(0), Some("https://cdn/0"));
    }

    // ===== Transitions =====

    #[test]
    fn test_full_traversal_finishes_without_wraparound() {
        let mut m = machine();
        let mut now = Instant::now();
        m.start(queue_123()).unwrap();

        let mut phases = Vec::new();
        for _ in 0..5 {
            load_and_play(&mut m);
            phases.push((m.session().unwrap().index(), m.state()));
            play_to_end(&mut m, &mut now);
        }

        assert_eq!(
            phases,
            vec![
                (0, EngineState::PlayingSong),
                (1, EngineState::PlayingBridge),
                (2, EngineState::PlayingSong),
                (3, EngineState::PlayingBridge),
                (4, EngineState::PlayingSong),
            ]
        );
        assert_eq!(m.state(), EngineState::Finished);
        assert!(!m.wants_playing());
        assert!(m.drain_commands().contains(&DeviceCommand::Pause));

        // Further end signals do nothing
        m.item_ended(secs(30), now);
        assert_eq!(m.state(), EngineState::Finished);
        assert_eq!(m.session().unwrap().index(), 4);
    }

    #[test]
    fn test_bridge_entry_records_pending_transition() {
        let mut m = machine();
        let mut now = Instant::now();
        m.start(queue_123()).unwrap();
        load_and_play(&mut m);
        m.drain_events();
        play_to_end(&mut m, &mut now);

        let session = m.session().unwrap();
        assert_eq!(session.phase(), Phase::Bridge);
        assert_eq!(
            session.pending_transition(),
            Some(PendingTransition {
                next_index: 2,
                arrival_choice: Choice::A
            })
        );

        let events = m.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            PlaybackEvent::PhaseEntered { phase: Phase::Bridge, index: 1, upcoming: Some((2, _)), .. }
        )));
    }

    #[test]
    fn test_duplicate_end_within_cooldown_accepted_once() {
        let mut m = machine();
        let now = Instant::now();
        m.start(queue_123()).unwrap();
        load_and_play(&mut m);

        m.time_update(secs(30), now);
        m.item_ended(secs(30), now);
        m.item_ended(secs(30), now + Duration::from_millis(100));

        let ended = m
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, PlaybackEvent::ItemEnded { .. }))
            .count();
        assert_eq!(ended, 1);
        assert_eq!(m.session().unwrap().index(), 1);
    }

    #[test]
    fn test_ghost_end_after_swap_ignored() {
        let mut m = machine();
        let now = Instant::now();
        m.start(queue_123()).unwrap();
        load_and_play(&mut m);
        m.time_update(secs(30), now);
        m.item_ended(secs(30), now);

        // Bridge loads; the device fires a spurious end right away
        load_and_play(&mut m);
        m.item_ended(Duration::ZERO, now + secs(1));
        assert_eq!(m.session().unwrap().index(), 1);
        assert_eq!(m.state(), EngineState::PlayingBridge);
    }

    #[test]
    fn test_end_while_resolving_ignored() {
        let mut m = machine();
        m.start(queue_123()).unwrap();
        m.item_ended(secs(30), Instant::now());
        assert_eq!(m.state(), EngineState::Loading);
        assert_eq!(m.session().unwrap().index(), 0);
    }

    // ===== Soft Failures =====

    #[test]
    fn test_bridge_resolution_failure_skips_to_next_song() {
        let mut m = machine();
        let mut now = Instant::now();
        m.start(queue_123()).unwrap();
        load_and_play(&mut m);
        play_to_end(&mut m, &mut now);

        let token = m.swap_token();
        m.on_resolved(
            token,
            1,
            Err(PlaybackError::ResolutionFailed {
                source_key: "bridge-1-2".to_string(),
                reason: "403".to_string(),
            }),
        );

        let session = m.session().unwrap();
        assert_eq!(session.index(), 2);
        assert_eq!(session.phase(), Phase::Song);
        assert!(session.pending_transition().is_none());
        assert!(m
            .drain_events()
            .iter()
            .any(|e| matches!(e, PlaybackEvent::ItemSkipped { index: 1, .. })));
    }

    #[test]
    fn test_song_resolution_failure_skips_song_and_bridge() {
        let mut m = machine();
        m.start(queue_123()).unwrap();

        let token = m.swap_token();
        m.on_resolved(
            token,
            0,
            Err(PlaybackError::ResolutionFailed {
                source_key: "song-1".to_string(),
                reason: "404".to_string(),
            }),
        );
        assert_eq!(m.session().unwrap().index(), 2);
        assert_eq!(m.state(), EngineState::Loading);
    }

    #[test]
    fn test_last_song_resolution_failure_finishes() {
        let mut m = machine();
        m.start(vec![song(1)]).unwrap();
        let token = m.swap_token();
        m.on_resolved(
            token,
            0,
            Err(PlaybackError::ResolutionFailed {
                source_key: "song-1".to_string(),
                reason: "404".to_string(),
            }),
        );
        assert_eq!(m.state(), EngineState::Finished);
    }

    #[test]
    fn test_bridge_play_failure_skips_to_next_song() {
        let mut m = machine();
        let mut now = Instant::now();
        m.start(queue_123()).unwrap();
        load_and_play(&mut m);
        play_to_end(&mut m, &mut now);

        let token = m.swap_token();
        m.on_resolved(token, 1, Ok("https://cdn/1".to_string()));
        m.on_play_settled(token, Err(DeviceError::new("decode error")));

        assert_eq!(m.session().unwrap().index(), 2);
        assert_eq!(m.phase(), Some(Phase::Song));
    }

    // ===== Autoplay =====

    #[test]
    fn test_blocked_autoplay_keeps_intent_and_retries_on_play() {
        let mut m = machine();
        m.start(queue_123()).unwrap();
        let token = m.swap_token();
        m.on_resolved(token, 0, Ok("https://cdn/0".to_string()));
        m.drain_commands();

        m.on_play_settled(token, Err(DeviceError::new("NotAllowedError")));
        assert_eq!(m.state(), EngineState::Paused);
        assert!(m.wants_playing());
        assert!(!m.is_playing());
        assert!(m.autoplay_blocked());

        m.user_play();
        assert_eq!(m.drain_commands(), vec![DeviceCommand::Play { token }]);
        m.on_play_settled(token, Ok(()));
        assert_eq!(m.state(), EngineState::PlayingSong);
        assert_eq!(m.session().unwrap().index(), 0);
    }

    #[test]
    fn test_stale_play_settlement_is_noop() {
        let mut m = machine();
        let now = Instant::now();
        m.start(queue_123()).unwrap();

        // X = song 1: resolved, play requested but not settled
        let x = m.swap_token();
        m.on_resolved(x, 0, Ok("https://cdn/0".to_string()));
        m.drain_commands();

        // Superseded by Y before X settles
        m.user_skip(now);
        let y = m.swap_token();
        assert_ne!(x, y);
        m.on_resolved(y, 1, Ok("https://cdn/1".to_string()));
        m.drain_commands();

        m.on_play_settled(x, Ok(()));
        assert!(!m.is_playing());
        assert_eq!(m.state(), EngineState::Loading);
        assert!(m.drain_commands().is_empty());

        m.on_play_settled(y, Ok(()));
        assert_eq!(m.state(), EngineState::PlayingBridge);
    }

    #[test]
    fn test_stale_resolution_is_noop() {
        let mut m = machine();
        m.start(queue_123()).unwrap();
        let old = m.swap_token();
        m.start(queue_123()).unwrap();
        m.drain_commands();

        m.on_resolved(old, 0, Ok("https://old".to_string()));
        assert!(m.drain_commands().is_empty());
        assert_eq!(m.resolved_url(0), None);
    }

    #[test]
    fn test_pause_during_pending_play() {
        let mut m = machine();
        m.start(queue_123()).unwrap();
        let token = m.swap_token();
        m.on_resolved(token, 0, Ok("https://cdn/0".to_string()));
        m.drain_commands();

        m.user_pause();
        assert_eq!(m.state(), EngineState::Paused);
        m.drain_commands();

        m.on_play_settled(token, Ok(()));
        assert_eq!(m.drain_commands(), vec![DeviceCommand::Pause]);
        assert_eq!(m.state(), EngineState::Paused);
        assert!(!m.is_playing());
    }

    #[test]
    fn test_device_ready_retries_once() {
        let mut m = machine();
        m.start(queue_123()).unwrap();
        let token = m.swap_token();
        m.on_resolved(token, 0, Ok("https://cdn/0".to_string()));
        m.drain_commands();
        m.on_play_settled(token, Err(DeviceError::new("not ready")));

        m.on_device_ready();
        assert_eq!(m.drain_commands(), vec![DeviceCommand::Play { token }]);
        m.on_play_settled(token, Err(DeviceError::new("not ready")));

        m.on_device_ready();
        assert!(m.drain_commands().is_empty());
    }

    // ===== Preview Cap =====

    #[test]
    fn test_preview_cap_pauses_rewinds_and_advances_once() {
        let mut m = SessionMachine::new(&PlaybackConfig {
            listening_mode: ListeningMode::Preview,
            ..config()
        });
        let now = Instant::now();
        m.start(queue_123()).unwrap();
        load_and_play(&mut m);
        m.drain_events();

        m.time_update(secs(39), now);
        assert_eq!(m.session().unwrap().index(), 0);
        m.time_update(secs(40), now);
        m.time_update(Duration::from_millis(40_250), now);

        let cmds = m.drain_commands();
        assert_eq!(cmds[0], DeviceCommand::Pause);
        assert_eq!(cmds[1], DeviceCommand::Seek(Duration::ZERO));
        let ended: Vec<_> = m
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, PlaybackEvent::ItemEnded { .. }))
            .collect();
        assert_eq!(
            ended,
            vec![PlaybackEvent::ItemEnded {
                index: 0,
                origin: EndOrigin::PreviewCap
            }]
        );
        assert_eq!(m.session().unwrap().index(), 1);
    }

    #[test]
    fn test_preview_cap_ignores_updates_from_previous_source() {
        let mut m = SessionMachine::new(&PlaybackConfig {
            listening_mode: ListeningMode::Preview,
            prefetch_next: true,
            ..PlaybackConfig::default()
        });
        let now = Instant::now();
        m.start(queue_123()).unwrap();
        load_and_play(&mut m);

        // Bridge URL prefetched while song 1 plays
        let cmds = m.drain_commands();
        let session = match &cmds[..] {
            [DeviceCommand::Prefetch { session, index: 1, .. }] => *session,
            other => panic!("expected prefetch of index 1, got {:?}", other),
        };
        m.on_prefetched(session, 1, Ok("https://cdn/1".to_string()));
        m.drain_events();

        m.time_update(secs(40), now);
        assert_eq!(m.session().unwrap().index(), 1);
        let bridge_token = m.swap_token();
        assert!(m
            .drain_commands()
            .contains(&DeviceCommand::Play { token: bridge_token }));

        // Late tick of song 1 lands before the bridge's play settles
        m.time_update(Duration::from_millis(40_250), now);

        let ends = m
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, PlaybackEvent::ItemEnded { .. }))
            .count();
        assert_eq!(ends, 1, "cap fired more than once for one song");
        assert_eq!(m.session().unwrap().index(), 1);

        // The stale tick did not count as bridge progress
        m.on_play_settled(bridge_token, Ok(()));
        m.item_ended(Duration::ZERO, now + secs(1));
        assert_eq!(m.session().unwrap().index(), 1);
    }

    #[test]
    fn test_full_mode_ignores_cap() {
        let mut m = machine();
        m.start(queue_123()).unwrap();
        load_and_play(&mut m);
        m.time_update(secs(120), Instant::now());
        assert_eq!(m.session().unwrap().index(), 0);
    }

    // ===== Reset =====

    #[test]
    fn test_reset_stops_device_and_invalidates() {
        let mut m = machine();
        m.start(queue_123()).unwrap();
        let token = m.swap_token();
        m.drain_commands();

        m.reset();
        assert_eq!(m.state(), EngineState::Idle);
        assert!(m.session().is_none());
        assert_eq!(m.drain_commands(), vec![DeviceCommand::Stop]);

        m.on_resolved(token, 0, Ok("https://late".to_string()));
        assert!(m.drain_commands().is_empty());
        m.drain_events();

        m.reset();
        assert!(!m.has_pending_output());
    }

    #[test]
    fn test_user_input_ignored_when_idle() {
        let mut m = machine();
        m.user_play();
        m.user_pause();
        m.user_seek(secs(3));
        m.user_skip(Instant::now());
        assert!(!m.has_pending_output());
        assert!(!m.wants_playing());
    }

    // ===== Prefetch =====

    #[test]
    fn test_prefetch_next_item_is_used_on_entry() {
        let mut m = SessionMachine::new(&PlaybackConfig::default());
        let now = Instant::now();
        m.start(queue_123()).unwrap();
        let token = m.swap_token();
        m.on_resolved(token, 0, Ok("https://cdn/0".to_string()));
        m.drain_commands();
        m.on_play_settled(token, Ok(()));

        let cmds = m.drain_commands();
        let (session, index) = cmds
            .iter()
            .find_map(|c| match c {
                DeviceCommand::Prefetch { session, index, .. } => Some((*session, *index)),
                _ => None,
            })
            .expect("prefetch");
        assert_eq!(index, 1);
        m.on_prefetched(session, index, Ok("https://cdn/bridge".to_string()));

        m.time_update(secs(30), now);
        m.item_ended(secs(30), now);
        let cmds = m.drain_commands();
        assert!(cmds.iter().all(|c| !matches!(c, DeviceCommand::Resolve { .. })));
        assert!(cmds.contains(&DeviceCommand::Load {
            token: m.swap_token(),
            url: "https://cdn/bridge".to_string()
        }));
    }

    #[test]
    fn test_prefetch_from_old_session_dropped() {
        let mut m = SessionMachine::new(&PlaybackConfig::default());
        m.start(queue_123()).unwrap();
        m.start(queue_123()).unwrap();
        m.on_prefetched(1, 1, Ok("https://old".to_string()));
        assert_eq!(m.resolved_url(1), None);
    }
}
