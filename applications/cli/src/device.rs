//! Virtual playback device
//!
//! Stands in for a real audio output: every source "plays" for a fixed
//! simulated length, reporting progress on a (possibly accelerated) clock.

use crate::config::DeviceSettings;
use bridge_playback::{DeviceError, DeviceEvent, DeviceEventSink, PlayFuture, PlaybackDevice};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

struct Inner {
    sink: Option<DeviceEventSink>,
    source: Option<String>,
    position: Duration,
    ticker: Option<JoinHandle<()>>,
}

impl Inner {
    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    fn emit(&self, event: DeviceEvent) {
        if let Some(sink) = &self.sink {
            sink.send(event);
        }
    }
}

/// Device that simulates playback of fixed-length items
#[derive(Clone)]
pub struct VirtualDevice {
    inner: Arc<Mutex<Inner>>,
    item_length: Duration,
    tick: Duration,
    real_tick: Duration,
}

impl VirtualDevice {
    pub fn new(settings: &DeviceSettings) -> Self {
        let tick = settings.tick();
        let speed = if settings.speed.is_finite() && settings.speed > 0.0 {
            settings.speed
        } else {
            1.0
        };

        Self {
            inner: Arc::new(Mutex::new(Inner {
                sink: None,
                source: None,
                position: Duration::ZERO,
                ticker: None,
            })),
            item_length: settings.item_length(),
            tick,
            real_tick: tick.div_f64(speed),
        }
    }

    /// Currently loaded source
    pub fn source(&self) -> Option<String> {
        self.inner.lock().source.clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .lock()
            .ticker
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    fn spawn_ticker(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let item_length = self.item_length;
        let tick = self.tick;
        let real_tick = self.real_tick;

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(real_tick).await;

                let mut guard = inner.lock();
                guard.position = (guard.position + tick).min(item_length);
                let position = guard.position;
                trace!(position_ms = position.as_millis() as u64, "Virtual tick");
                guard.emit(DeviceEvent::TimeUpdate(position));

                if position >= item_length {
                    guard.emit(DeviceEvent::Ended);
                    guard.ticker = None;
                    break;
                }
            }
        })
    }
}

impl PlaybackDevice for VirtualDevice {
    fn attach(&mut self, events: DeviceEventSink) {
        self.inner.lock().sink = Some(events);
    }

    fn set_source(&mut self, url: &str) {
        let mut inner = self.inner.lock();
        inner.stop_ticker();
        inner.position = Duration::ZERO;
        inner.source = Some(url.to_string());
        debug!(url = %url, "Virtual device loaded source");
        inner.emit(DeviceEvent::MetadataReady);
    }

    fn clear_source(&mut self) {
        let mut inner = self.inner.lock();
        inner.stop_ticker();
        inner.source = None;
        inner.position = Duration::ZERO;
    }

    fn play(&mut self) -> PlayFuture {
        let has_source = self.inner.lock().source.is_some();
        if !has_source {
            return Box::pin(async { Err(DeviceError::new("no source loaded")) });
        }

        if !self.is_running() {
            let ticker = self.spawn_ticker();
            let mut inner = self.inner.lock();
            inner.stop_ticker();
            if inner.position >= self.item_length {
                inner.position = Duration::ZERO;
            }
            inner.ticker = Some(ticker);
        }

        Box::pin(async { Ok(()) })
    }

    fn pause(&mut self) {
        self.inner.lock().stop_ticker();
    }

    fn seek(&mut self, position: Duration) {
        let mut inner = self.inner.lock();
        inner.position = position.min(self.item_length);
    }

    fn current_time(&self) -> Duration {
        self.inner.lock().position
    }
}
