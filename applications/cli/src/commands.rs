//! Subcommand implementations
//!
//! Each command takes its collaborators as trait objects so the binary can
//! wire HTTP implementations and tests can wire in-memory ones.

use crate::device::VirtualDevice;
use crate::error::Result;
use bridge_core::{Catalog, CatalogLoader, CollectionStore, ReleaseId, SourceResolver};
use bridge_playback::{
    plan_queue, AdaptivePlayer, EngineState, ListeningMode, PlaybackConfig, PlaybackSnapshot,
    QueueItem, StartOutcome, UNAVAILABLE_REASON,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of `plan`
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    Planned(Vec<QueueItem>),
    Unavailable(String),
}

/// Load a catalog and draw a queue for it
pub async fn plan(
    loader: &dyn CatalogLoader,
    release: &ReleaseId,
    attempts: u32,
    seed: Option<u64>,
) -> Result<(Catalog, PlanOutcome)> {
    let catalog = loader.load_catalog(release).await?;

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let outcome = match plan_queue(&catalog, &mut rng, attempts) {
        Ok(queue) => PlanOutcome::Planned(queue),
        Err(e) => {
            info!(release = %release, attempts, error = %e, "No buildable route");
            PlanOutcome::Unavailable(format!("{}: {}", UNAVAILABLE_REASON, e))
        }
    };

    Ok((catalog, outcome))
}

/// Listening mode for a release: full when owned, unless preview is forced
pub fn listening_mode_for(
    store: &dyn CollectionStore,
    release: &ReleaseId,
    force_preview: bool,
) -> Result<ListeningMode> {
    if force_preview {
        return Ok(ListeningMode::Preview);
    }
    Ok(if store.contains(release)? {
        ListeningMode::Full
    } else {
        ListeningMode::Preview
    })
}

/// How a playback run ended
#[derive(Debug, Clone, PartialEq)]
pub enum PlayOutcome {
    /// Start refused; nothing played
    Unavailable(StartOutcome),
    /// Queue played through
    Finished(PlaybackSnapshot),
    /// Interrupted before the end
    Interrupted(PlaybackSnapshot),
}

/// Run adaptive playback of `catalog` on a virtual device until the queue
/// finishes or `interrupt` resolves
pub async fn play<F, I>(
    catalog: &Catalog,
    resolver: Arc<dyn SourceResolver>,
    device: VirtualDevice,
    config: PlaybackConfig,
    on_change: F,
    interrupt: I,
) -> Result<PlayOutcome>
where
    F: FnMut(&PlaybackSnapshot) + Send + 'static,
    I: std::future::Future<Output = ()>,
{
    let (player, task) = AdaptivePlayer::spawn(Box::new(device), resolver, config);
    let listener = player.on_playback_state_change(on_change);
    let mut snapshots = player.subscribe();

    let started = player.start_adaptive_playback(catalog);
    if !started.ok {
        warn!(
            release = %catalog.release_id(),
            reason = started.reason.as_deref().unwrap_or(""),
            "Adaptive playback unavailable"
        );
        player.shutdown();
        let _ = task.await;
        let _ = listener.await;
        return Ok(PlayOutcome::Unavailable(started));
    }

    tokio::pin!(interrupt);
    let outcome = loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break PlayOutcome::Interrupted(player.snapshot());
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if snapshot.state == EngineState::Finished {
                    break PlayOutcome::Finished(snapshot);
                }
            }
            () = &mut interrupt => {
                info!("Playback interrupted");
                let snapshot = player.snapshot();
                player.stop_adaptive_playback()?;
                break PlayOutcome::Interrupted(snapshot);
            }
        }
    };

    player.shutdown();
    let _ = task.await;
    let _ = listener.await;
    Ok(outcome)
}

/// Record ownership of a release; returns false when already owned
pub fn collect(store: &dyn CollectionStore, release: &ReleaseId) -> Result<bool> {
    if store.contains(release)? {
        return Ok(false);
    }
    store.upsert(release)?;
    info!(release = %release, "Added to collection");
    Ok(true)
}
