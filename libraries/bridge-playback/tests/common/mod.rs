//! Shared fixtures for engine tests

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_core::{Catalog, Choice, Connection, CoreError, Song, SourceResolver, Variants};
use bridge_playback::{
    AdaptivePlayer, DeviceError, DeviceEvent, DeviceEventSink, PlayFuture, PlaybackConfig,
    PlaybackDevice,
};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

// ===== Device =====

/// Calls the engine made on the device
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    SetSource(String),
    ClearSource,
    Play,
    Pause,
    Seek(Duration),
}

/// How `play()` settles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayMode {
    /// Resolve immediately
    Immediate,
    /// Wait for `settle_next_play`
    Manual,
}

struct DeviceInner {
    sink: Option<DeviceEventSink>,
    calls: Vec<DeviceCall>,
    position: Duration,
    mode: PlayMode,
    rejections_left: usize,
    pending_plays: VecDeque<oneshot::Sender<Result<(), DeviceError>>>,
}

/// Device driven by the test
#[derive(Clone)]
pub struct ScriptedDevice {
    inner: Arc<Mutex<DeviceInner>>,
}

impl ScriptedDevice {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(DeviceInner {
                sink: None,
                calls: Vec::new(),
                position: Duration::ZERO,
                mode: PlayMode::Immediate,
                rejections_left: 0,
                pending_plays: VecDeque::new(),
            })),
        }
    }

    pub fn with_mode(mode: PlayMode) -> Self {
        let device = Self::new();
        device.inner.lock().mode = mode;
        device
    }

    /// Reject the next `n` play requests
    pub fn reject_next_plays(&self, n: usize) {
        self.inner.lock().rejections_left = n;
    }

    /// Settle the oldest pending play (manual mode)
    pub fn settle_next_play(&self, result: Result<(), DeviceError>) -> bool {
        let sender = self.inner.lock().pending_plays.pop_front();
        sender.is_some_and(|tx| tx.send(result).is_ok())
    }

    pub fn pending_plays(&self) -> usize {
        self.inner.lock().pending_plays.len()
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.inner.lock().calls.clone()
    }

    /// URLs loaded so far, in order
    pub fn sources(&self) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                DeviceCall::SetSource(url) => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn emit(&self, event: DeviceEvent) {
        let sink = self.inner.lock().sink.clone();
        if let Some(sink) = sink {
            sink.send(event);
        }
    }

    /// Advance the position and report it
    pub fn progress_to(&self, position: Duration) {
        self.inner.lock().position = position;
        self.emit(DeviceEvent::TimeUpdate(position));
    }

    /// Play the loaded source to its end
    pub fn finish_current(&self) {
        self.progress_to(Duration::from_secs(30));
        self.emit(DeviceEvent::Ended);
    }
}

impl PlaybackDevice for ScriptedDevice {
    fn attach(&mut self, events: DeviceEventSink) {
        self.inner.lock().sink = Some(events);
    }

    fn set_source(&mut self, url: &str) {
        let mut inner = self.inner.lock();
        inner.position = Duration::ZERO;
        inner.calls.push(DeviceCall::SetSource(url.to_string()));
    }

    fn clear_source(&mut self) {
        self.inner.lock().calls.push(DeviceCall::ClearSource);
    }

    fn play(&mut self) -> PlayFuture {
        let mut inner = self.inner.lock();
        inner.calls.push(DeviceCall::Play);

        if inner.rejections_left > 0 {
            inner.rejections_left -= 1;
            return Box::pin(async { Err(DeviceError::new("NotAllowedError")) });
        }

        match inner.mode {
            PlayMode::Immediate => Box::pin(async { Ok(()) }),
            PlayMode::Manual => {
                let (tx, rx) = oneshot::channel();
                inner.pending_plays.push_back(tx);
                Box::pin(async move {
                    rx.await
                        .unwrap_or_else(|_| Err(DeviceError::new("play abandoned")))
                })
            }
        }
    }

    fn pause(&mut self) {
        self.inner.lock().calls.push(DeviceCall::Pause);
    }

    fn seek(&mut self, position: Duration) {
        let mut inner = self.inner.lock();
        inner.position = position;
        inner.calls.push(DeviceCall::Seek(position));
    }

    fn current_time(&self) -> Duration {
        self.inner.lock().position
    }
}

// ===== Resolver =====

/// Signs every key except the ones marked failing
#[derive(Default)]
pub struct MapResolver {
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl MapResolver {
    pub fn failing(keys: &[&str]) -> Self {
        Self {
            failing: keys.iter().map(|k| k.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl SourceResolver for MapResolver {
    async fn resolve(&self, source_key: &str) -> bridge_core::Result<String> {
        self.calls.lock().push(source_key.to_string());
        if self.failing.contains(source_key) {
            return Err(CoreError::resolution(format!("{} denied", source_key)));
        }
        Ok(signed(source_key))
    }
}

pub fn signed(key: &str) -> String {
    format!("https://cdn.test/{}", key)
}

// ===== Catalogs =====

fn song(slot: u32) -> Song {
    Song::new(
        slot,
        format!("Song {}", slot),
        Variants::pair(format!("s{}a", slot), format!("s{}b", slot)),
    )
}

/// Slots 1, 2, 3 with only edges 1-2 and 2-3
pub fn catalog_123() -> Catalog {
    Catalog::new(
        "release-123",
        vec![song(1), song(2), song(3)],
        vec![
            Connection::new(1, 2, Choice::A, Choice::B, "B12"),
            Connection::new(2, 3, Choice::A, Choice::B, "B23"),
        ],
    )
    .unwrap()
}

/// Every ordered pair connected
pub fn fully_connected(n: u32) -> Catalog {
    let songs = (1..=n).map(song).collect();
    let mut connections = Vec::new();
    for from in 1..=n {
        for to in 1..=n {
            if from != to {
                connections.push(Connection::new(
                    from,
                    to,
                    Choice::A,
                    Choice::A,
                    format!("B{}{}", from, to),
                ));
            }
        }
    }
    Catalog::new("release-full", songs, connections).unwrap()
}

// ===== Engine =====

pub struct Harness {
    pub player: AdaptivePlayer,
    pub device: ScriptedDevice,
    pub resolver: Arc<MapResolver>,
    pub task: JoinHandle<()>,
}

pub fn harness(device: ScriptedDevice, resolver: MapResolver, config: PlaybackConfig) -> Harness {
    let resolver = Arc::new(resolver);
    let (player, task) = AdaptivePlayer::spawn(
        Box::new(device.clone()),
        resolver.clone(),
        PlaybackConfig {
            seed: Some(42),
            ..config
        },
    );
    Harness {
        player,
        device,
        resolver,
        task,
    }
}

pub fn quiet_config() -> PlaybackConfig {
    PlaybackConfig {
        prefetch_next: false,
        ..PlaybackConfig::default()
    }
}

/// Let the engine drain its channel
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Let wall-clock time pass (paused runtime)
pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
}
