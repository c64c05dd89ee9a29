//! Queue builder
//!
//! Draws a random route over the playable songs of a catalog and expands it
//! into an alternating song/bridge queue. Only authored edges are used: a
//! route that needs a missing edge fails as a whole.

use crate::error::{PlaybackError, Result};
use crate::types::QueueItem;
use bridge_core::{Catalog, Choice, Song};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

/// Draw a uniformly random permutation of the catalog's song slots
pub fn build_route<R: Rng + ?Sized>(catalog: &Catalog, rng: &mut R) -> Vec<u32> {
    let mut route: Vec<u32> = catalog.songs().iter().map(|s| s.slot).collect();
    route.shuffle(rng);
    route
}

/// Expand a route into a queue
///
/// The first song plays the variant its outgoing edge leaves from; every
/// later song plays the variant its incoming edge arrives at. A route of one
/// song plays variant A.
///
/// # Errors
/// `RouteUnbuildable` names the first missing directed edge;
/// `CatalogInvalid` is returned for an empty route or an unknown slot.
pub fn queue_for_route(catalog: &Catalog, route: &[u32]) -> Result<Vec<QueueItem>> {
    let Some(&last) = route.last() else {
        return Err(PlaybackError::CatalogInvalid("empty route".to_string()));
    };

    let mut queue = Vec::with_capacity(route.len() * 2 - 1);
    let mut arrival: Option<Choice> = None;

    for pair in route.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let edge = catalog
            .connection(from, to)
            .ok_or(PlaybackError::RouteUnbuildable { from, to })?;

        let choice = arrival.unwrap_or(edge.from_choice);
        queue.push(song_item(lookup(catalog, from)?, choice)?);
        queue.push(QueueItem::Bridge {
            from_slot: from,
            to_slot: to,
            source_key: edge.bridge.source_key.clone(),
        });
        arrival = Some(edge.to_choice);
    }

    queue.push(song_item(
        lookup(catalog, last)?,
        arrival.unwrap_or_default(),
    )?);
    Ok(queue)
}

/// Build a queue from a freshly drawn route
///
/// Returns an empty queue when the route needs a missing edge. Callers treat
/// empty as "adaptive playback unavailable".
pub fn build_queue<R: Rng + ?Sized>(catalog: &Catalog, rng: &mut R) -> Vec<QueueItem> {
    let route = build_route(catalog, rng);
    match queue_for_route(catalog, &route) {
        Ok(queue) => queue,
        Err(e) => {
            debug!(release = %catalog.release_id(), ?route, error = %e, "Queue build failed");
            Vec::new()
        }
    }
}

/// Draw up to `attempts` routes and return the first buildable queue
///
/// # Errors
/// Returns the error of the last attempt when every route fails.
pub fn plan_queue<R: Rng + ?Sized>(
    catalog: &Catalog,
    rng: &mut R,
    attempts: u32,
) -> Result<Vec<QueueItem>> {
    let attempts = attempts.max(1);
    let mut last_err = None;

    for attempt in 1..=attempts {
        let route = build_route(catalog, rng);
        match queue_for_route(catalog, &route) {
            Ok(queue) => return Ok(queue),
            Err(e) => {
                debug!(attempt, ?route, error = %e, "Route rejected");
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| PlaybackError::CatalogInvalid("no route drawn".to_string())))
}

/// Check the strict `song, bridge, ..., song` alternation
pub fn validate_alternation(queue: &[QueueItem]) -> bool {
    !queue.is_empty()
        && queue.len() % 2 == 1
        && queue
            .iter()
            .enumerate()
            .all(|(i, item)| item.is_song() == (i % 2 == 0))
}

fn lookup(catalog: &Catalog, slot: u32) -> Result<&Song> {
    catalog
        .song(slot)
        .ok_or_else(|| PlaybackError::CatalogInvalid(format!("unknown slot {}", slot)))
}

fn song_item(song: &Song, choice: Choice) -> Result<QueueItem> {
    let (choice, media) = song.source_for(choice).ok_or_else(|| {
        PlaybackError::CatalogInvalid(format!("song {} has no playable variant", song.slot))
    })?;

    Ok(QueueItem::Song {
        slot: song.slot,
        title: song.title.clone(),
        choice,
        source_key: media.source_key.clone(),
    })
}
