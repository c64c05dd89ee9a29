//! Playback device abstraction
//!
//! Exactly one device is shared by songs and bridges, and only the engine
//! commands it. Platform code implements [`PlaybackDevice`] and reports what
//! happens through the [`DeviceEventSink`] handed to it on attach.

use crate::engine::Message;
use futures_util::future::BoxFuture;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Device failure (rejected play, unsupported source)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct DeviceError(pub String);

impl DeviceError {
    /// Create a device error
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Pending result of a play request
pub type PlayFuture = BoxFuture<'static, Result<(), DeviceError>>;

/// Events a device reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The loaded source completed (may be spurious around swaps)
    Ended,

    /// Playback position advanced
    TimeUpdate(Duration),

    /// The loaded source can start playing
    MetadataReady,
}

/// Channel through which a device reports events to the engine
///
/// Events are processed in the order they are sent.
#[derive(Debug, Clone)]
pub struct DeviceEventSink {
    tx: mpsc::UnboundedSender<Message>,
}

impl DeviceEventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self { tx }
    }

    /// Report an event; returns false once the engine has shut down
    pub fn send(&self, event: DeviceEvent) -> bool {
        self.tx.send(Message::Device(event)).is_ok()
    }
}

/// Shared playback device
pub trait PlaybackDevice: Send {
    /// Receive the event sink; called once when the engine starts
    fn attach(&mut self, events: DeviceEventSink);

    /// Load a new source, replacing the current one
    fn set_source(&mut self, url: &str);

    /// Unload the current source
    fn clear_source(&mut self);

    /// Start playback of the loaded source
    ///
    /// The future may reject (autoplay restrictions, unsupported media).
    fn play(&mut self) -> PlayFuture;

    /// Pause playback
    fn pause(&mut self);

    /// Move the playback position
    fn seek(&mut self, position: Duration);

    /// Current playback position
    fn current_time(&self) -> Duration;
}
