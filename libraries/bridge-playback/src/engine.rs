//! Adaptive playback engine
//!
//! A single actor task owns the [`SessionMachine`], the
//! [`HighlightScheduler`], the device and the resolver. Everything that
//! happens (user calls, device events, resolver and play completions, label
//! timers) arrives as a message on one channel and is handled to completion
//! in arrival order. After each message the machine's queued commands are
//! executed and a [`PlaybackSnapshot`] is published if anything observable
//! changed.

use crate::device::{DeviceError, DeviceEvent, DeviceEventSink, PlaybackDevice};
use crate::error::PlaybackError;
use crate::events::{DeviceCommand, PlaybackEvent};
use crate::highlight::{HighlightAction, HighlightScheduler, TimerRequest};
use crate::machine::SessionMachine;
use crate::queue::{plan_queue, validate_alternation};
use crate::resolver::ResolverClient;
use crate::types::{ListeningMode, Phase, PlaybackConfig, PlaybackSnapshot, QueueItem, StartOutcome};
use bridge_core::{Catalog, SourceResolver};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Reason reported when no queue can be built
pub const UNAVAILABLE_REASON: &str = "adaptive playback unavailable for this release";

/// Messages processed by the engine task
#[derive(Debug)]
pub(crate) enum Message {
    Start(Vec<QueueItem>),
    Play,
    Pause,
    Seek(Duration),
    Skip,
    Stop,
    SetListeningMode(ListeningMode),
    Device(DeviceEvent),
    Resolved {
        token: u64,
        index: usize,
        result: Result<String, PlaybackError>,
    },
    Prefetched {
        session: u64,
        index: usize,
        result: Result<String, PlaybackError>,
    },
    PlaySettled {
        token: u64,
        result: Result<(), DeviceError>,
    },
    HighlightTimer {
        generation: u64,
        action: HighlightAction,
    },
    Shutdown,
}

/// Handle to a running adaptive playback engine
///
/// Cheap to clone; every clone talks to the same engine task.
#[derive(Clone)]
pub struct AdaptivePlayer {
    tx: mpsc::UnboundedSender<Message>,
    snapshot: watch::Receiver<PlaybackSnapshot>,
    rng: Arc<Mutex<StdRng>>,
}

impl std::fmt::Debug for AdaptivePlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptivePlayer")
            .field("snapshot", &*self.snapshot.borrow())
            .finish_non_exhaustive()
    }
}

impl AdaptivePlayer {
    /// Spawn the engine task on the current tokio runtime
    pub fn spawn(
        mut device: Box<dyn PlaybackDevice>,
        resolver: Arc<dyn SourceResolver>,
        config: PlaybackConfig,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot) = watch::channel(PlaybackSnapshot::default());

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let actor_rng = StdRng::seed_from_u64(rng.gen());

        device.attach(DeviceEventSink::new(tx.clone()));
        let actor = EngineActor {
            machine: SessionMachine::new(&config),
            highlight: HighlightScheduler::new(&config),
            resolver: ResolverClient::from_config(resolver, &config),
            device,
            rng: actor_rng,
            tx: tx.clone(),
            snapshot_tx,
            timers: Vec::new(),
            resolutions: Vec::new(),
        };
        let handle = tokio::spawn(actor.run(rx));

        let player = Self {
            tx,
            snapshot,
            rng: Arc::new(Mutex::new(rng)),
        };
        (player, handle)
    }

    /// Build a queue for `catalog` and start playing it
    ///
    /// Queue building happens synchronously; `ok` is false (with a reason)
    /// when the drawn route needs a missing edge.
    pub fn start_adaptive_playback(&self, catalog: &Catalog) -> StartOutcome {
        let planned = plan_queue(catalog, &mut *self.rng.lock(), 1);
        match planned {
            Ok(queue) => self.start_queue(queue),
            Err(e) => {
                info!(release = %catalog.release_id(), error = %e, "Adaptive playback unavailable");
                StartOutcome::unavailable(format!("{}: {}", UNAVAILABLE_REASON, e))
            }
        }
    }

    /// Start playing an already built queue
    pub fn start_queue(&self, queue: Vec<QueueItem>) -> StartOutcome {
        if queue.is_empty() {
            return StartOutcome::unavailable(UNAVAILABLE_REASON);
        }
        if !validate_alternation(&queue) {
            warn!(queue_len = queue.len(), "Rejected queue that does not alternate song/bridge");
            return StartOutcome::unavailable(format!(
                "{}: queue must alternate song/bridge and start and end on a song",
                UNAVAILABLE_REASON
            ));
        }
        match self.send(Message::Start(queue)) {
            Ok(()) => StartOutcome::started(),
            Err(e) => StartOutcome::unavailable(e.to_string()),
        }
    }

    /// Express intent to play
    ///
    /// # Errors
    /// Returns `EngineStopped` if the engine task has exited.
    pub fn play(&self) -> crate::Result<()> {
        self.send(Message::Play)
    }

    /// Express intent to pause
    ///
    /// # Errors
    /// Returns `EngineStopped` if the engine task has exited.
    pub fn pause(&self) -> crate::Result<()> {
        self.send(Message::Pause)
    }

    /// Seek within the current item
    ///
    /// # Errors
    /// Returns `EngineStopped` if the engine task has exited.
    pub fn seek(&self, position: Duration) -> crate::Result<()> {
        self.send(Message::Seek(position))
    }

    /// Move past the current item
    ///
    /// # Errors
    /// Returns `EngineStopped` if the engine task has exited.
    pub fn skip(&self) -> crate::Result<()> {
        self.send(Message::Skip)
    }

    /// Leave adaptive mode: reset the session and stop the device
    ///
    /// # Errors
    /// Returns `EngineStopped` if the engine task has exited.
    pub fn stop_adaptive_playback(&self) -> crate::Result<()> {
        self.send(Message::Stop)
    }

    /// Switch between full and preview listening
    ///
    /// # Errors
    /// Returns `EngineStopped` if the engine task has exited.
    pub fn set_listening_mode(&self, mode: ListeningMode) -> crate::Result<()> {
        self.send(Message::SetListeningMode(mode))
    }

    /// Stop the engine task
    pub fn shutdown(&self) {
        let _ = self.tx.send(Message::Shutdown);
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch snapshots
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshot.clone()
    }

    /// Invoke `listener` on every observable change
    ///
    /// The returned task ends when the engine shuts down.
    pub fn on_playback_state_change<F>(&self, mut listener: F) -> JoinHandle<()>
    where
        F: FnMut(&PlaybackSnapshot) + Send + 'static,
    {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                listener(&snapshot);
            }
        })
    }

    fn send(&self, msg: Message) -> crate::Result<()> {
        self.tx.send(msg).map_err(|_| PlaybackError::EngineStopped)
    }
}

struct EngineActor {
    machine: SessionMachine,
    highlight: HighlightScheduler,
    resolver: ResolverClient,
    device: Box<dyn PlaybackDevice>,
    rng: StdRng,
    tx: mpsc::UnboundedSender<Message>,
    snapshot_tx: watch::Sender<PlaybackSnapshot>,
    timers: Vec<JoinHandle<()>>,
    resolutions: Vec<JoinHandle<()>>,
}

impl EngineActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        debug!("Playback engine started");
        while let Some(msg) = rx.recv().await {
            if matches!(msg, Message::Shutdown) {
                break;
            }
            self.handle(msg);
        }

        self.cancel_timers();
        self.cancel_resolutions();
        self.device.pause();
        debug!("Playback engine stopped");
    }

    fn handle(&mut self, msg: Message) {
        let now = tokio::time::Instant::now().into_std();

        match msg {
            Message::Start(queue) => {
                if let Err(e) = self.machine.start(queue) {
                    warn!(error = %e, "Rejected queue");
                }
            }
            Message::Play => self.machine.user_play(),
            Message::Pause => self.machine.user_pause(),
            Message::Seek(position) => self.machine.user_seek(position),
            Message::Skip => self.machine.user_skip(now),
            Message::Stop => self.machine.reset(),
            Message::SetListeningMode(mode) => self.machine.set_listening_mode(mode),
            Message::Device(DeviceEvent::Ended) => {
                let position = self.device.current_time();
                self.machine.item_ended(position, now);
            }
            Message::Device(DeviceEvent::TimeUpdate(position)) => {
                self.machine.time_update(position, now);
            }
            Message::Device(DeviceEvent::MetadataReady) => self.machine.on_device_ready(),
            Message::Resolved {
                token,
                index,
                result,
            } => self.machine.on_resolved(token, index, result),
            Message::Prefetched {
                session,
                index,
                result,
            } => self.machine.on_prefetched(session, index, result),
            Message::PlaySettled { token, result } => self.machine.on_play_settled(token, result),
            Message::HighlightTimer { generation, action } => {
                if !self.highlight.fire(generation, action) {
                    trace!(generation, ?action, "Stale highlight timer");
                }
            }
            Message::Shutdown => {}
        }

        self.flush();
        self.publish();
    }

    /// Execute queued commands and apply queued events
    fn flush(&mut self) {
        while self.machine.has_pending_output() {
            for command in self.machine.drain_commands() {
                self.execute(command);
            }
            for event in self.machine.drain_events() {
                self.apply(event);
            }
        }
    }

    fn execute(&mut self, command: DeviceCommand) {
        match command {
            DeviceCommand::Resolve {
                token,
                index,
                source_key,
            } => {
                let resolver = self.resolver.clone();
                let tx = self.tx.clone();
                self.track_resolution(tokio::spawn(async move {
                    let result = resolver.resolve(&source_key).await;
                    let _ = tx.send(Message::Resolved {
                        token,
                        index,
                        result,
                    });
                }));
            }
            DeviceCommand::Prefetch {
                session,
                index,
                source_key,
            } => {
                let resolver = self.resolver.clone();
                let tx = self.tx.clone();
                self.track_resolution(tokio::spawn(async move {
                    let result = resolver.resolve(&source_key).await;
                    let _ = tx.send(Message::Prefetched {
                        session,
                        index,
                        result,
                    });
                }));
            }
            DeviceCommand::Load { token, url } => {
                debug!(token, %url, "Loading source");
                self.device.set_source(&url);
            }
            DeviceCommand::Play { token } => {
                if !self.machine.is_current(token) {
                    debug!(token, "Dropping superseded play");
                    return;
                }
                let play = self.device.play();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = play.await;
                    let _ = tx.send(Message::PlaySettled { token, result });
                });
            }
            DeviceCommand::Pause => self.device.pause(),
            DeviceCommand::Seek(position) => self.device.seek(position),
            DeviceCommand::Stop => {
                self.cancel_resolutions();
                self.device.pause();
                self.device.clear_source();
            }
        }
    }

    fn apply(&mut self, event: PlaybackEvent) {
        trace!(?event, "Playback event");
        match event {
            PlaybackEvent::PhaseEntered {
                phase: Phase::Song,
                item: QueueItem::Song { slot, title, .. },
                ..
            } => {
                let requests = self.highlight.enter_song(slot, &title);
                self.arm(requests);
            }
            PlaybackEvent::PhaseEntered {
                phase: Phase::Bridge,
                upcoming,
                ..
            } => {
                let upcoming = upcoming.as_ref().map(|(slot, title)| (*slot, title.as_str()));
                let requests = self.highlight.enter_bridge(upcoming, &mut self.rng);
                self.arm(requests);
            }
            PlaybackEvent::Finished => {
                self.cancel_timers();
                self.highlight.finish();
            }
            PlaybackEvent::SessionReset => {
                self.cancel_timers();
                self.highlight.reset();
            }
            PlaybackEvent::ItemSkipped { index, reason } => {
                debug!(index, %reason, "Item skipped");
            }
            _ => {}
        }
    }

    fn arm(&mut self, requests: Vec<TimerRequest>) {
        self.cancel_timers();
        for request in requests {
            let tx = self.tx.clone();
            self.timers.push(tokio::spawn(async move {
                tokio::time::sleep(request.delay).await;
                let _ = tx.send(Message::HighlightTimer {
                    generation: request.generation,
                    action: request.action,
                });
            }));
        }
    }

    fn cancel_timers(&mut self) {
        for timer in self.timers.drain(..) {
            timer.abort();
        }
    }

    fn track_resolution(&mut self, handle: JoinHandle<()>) {
        self.resolutions.retain(|h| !h.is_finished());
        self.resolutions.push(handle);
    }

    fn cancel_resolutions(&mut self) {
        for resolution in self.resolutions.drain(..) {
            resolution.abort();
        }
    }

    fn publish(&self) {
        let now_playing = self.highlight.now_playing();
        let session = self.machine.session();
        let next = PlaybackSnapshot {
            state: self.machine.state(),
            phase: self.machine.phase().unwrap_or_default(),
            current_queue_item: self.machine.current_item().cloned(),
            index: session.map(|s| s.index()),
            queue_len: session.map_or(0, |s| s.queue().len()),
            is_playing: self.machine.is_playing(),
            wants_playing: self.machine.wants_playing(),
            now_playing_label: now_playing.label.clone(),
            active_song_slot: now_playing.active_slot,
            highlight_visible: now_playing.highlight_visible,
        };

        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
