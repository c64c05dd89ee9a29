//! Smart Bridge - Adaptive Playback
//!
//! Turns a catalog of songs and authored bridges into a randomized
//! song/bridge/song sequence and drives a single shared playback device
//! through it.
//!
//! This crate provides:
//! - Queue building over authored edges only (fail-closed on a missing edge)
//! - A synchronous session state machine with race-safe source swapping
//! - End-signal deduplication (cooldown, per-source, minimum progress)
//! - Now-playing label and highlight scheduling with randomized bridge delays
//! - A preview cap for non-owned releases
//! - An async engine (`AdaptivePlayer`) built on tokio
//!
//! # Architecture
//!
//! The decision logic (`queue`, `machine`, `guard`, `preview`, `highlight`)
//! is synchronous and clock-injected, so it is tested without a runtime.
//! `engine` owns the device and the resolver and turns the machine's queued
//! commands into device calls and spawned tasks.
//!
//! Platform code supplies a [`PlaybackDevice`] and a
//! [`bridge_core::SourceResolver`].
//!
//! # Example: Planning a Queue
//!
//! ```rust
//! use bridge_core::{Catalog, Choice, Connection, Song, Variants};
//! use bridge_playback::queue::queue_for_route;
//!
//! let catalog = Catalog::new(
//!     "release-1",
//!     vec![
//!         Song::new(1, "Opening", Variants::single("storage/1a.mp3")),
//!         Song::new(2, "Glass", Variants::pair("storage/2a.mp3", "storage/2b.mp3")),
//!     ],
//!     vec![Connection::new(1, 2, Choice::A, Choice::B, "storage/b12.mp3")],
//! )
//! .unwrap();
//!
//! let queue = queue_for_route(&catalog, &[1, 2]).unwrap();
//! assert_eq!(queue.len(), 3);
//! assert_eq!(queue[2].source_key(), "storage/2b.mp3");
//!
//! assert!(queue_for_route(&catalog, &[2, 1]).is_err());
//! ```
//!
//! # Example: Running the Engine
//!
//! ```rust,no_run
//! use bridge_playback::{AdaptivePlayer, PlaybackConfig, PlaybackDevice};
//! use bridge_core::{Catalog, SourceResolver};
//! use std::sync::Arc;
//!
//! # async fn run(device: Box<dyn PlaybackDevice>, resolver: Arc<dyn SourceResolver>, catalog: Catalog) {
//! let (player, _task) = AdaptivePlayer::spawn(device, resolver, PlaybackConfig::default());
//!
//! let outcome = player.start_adaptive_playback(&catalog);
//! if !outcome.ok {
//!     println!("{}", outcome.reason.unwrap_or_default());
//! }
//!
//! player.on_playback_state_change(|snapshot| {
//!     println!("{:?} {}", snapshot.state, snapshot.now_playing_label);
//! });
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod device;
pub mod engine;
pub mod error;
pub mod events;
pub mod guard;
pub mod highlight;
pub mod machine;
pub mod preview;
pub mod queue;
pub mod resolver;
pub mod types;

pub use device::{DeviceError, DeviceEvent, DeviceEventSink, PlayFuture, PlaybackDevice};
pub use engine::{AdaptivePlayer, UNAVAILABLE_REASON};
pub use error::{PlaybackError, Result};
pub use events::{DeviceCommand, EndOrigin, PlaybackEvent};
pub use guard::{EndRejection, EndSignalGuard};
pub use highlight::{HighlightAction, HighlightScheduler, NowPlaying, TimerRequest};
pub use machine::{PendingTransition, PlaybackSession, SessionMachine};
pub use preview::PreviewCap;
pub use queue::{build_queue, build_route, plan_queue, queue_for_route, validate_alternation};
pub use resolver::ResolverClient;
pub use types::{
    EngineState, ListeningMode, Phase, PlaybackConfig, PlaybackSnapshot, QueueItem, StartOutcome,
};
