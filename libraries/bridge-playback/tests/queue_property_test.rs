//! Property-based tests for the queue builder
//!
//! Uses proptest to check the structural guarantees of `build_queue` across
//! random catalogs and seeds.

use bridge_core::{Catalog, Choice, Connection, Song, Variants};
use bridge_playback::{build_queue, build_route, queue_for_route, validate_alternation, QueueItem};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;

// ===== Helpers =====

fn choice(b: bool) -> Choice {
    if b {
        Choice::B
    } else {
        Choice::A
    }
}

fn songs(n: u32) -> Vec<Song> {
    (1..=n)
        .map(|slot| {
            Song::new(
                slot,
                format!("Song {}", slot),
                Variants::pair(format!("s{}a", slot), format!("s{}b", slot)),
            )
        })
        .collect()
}

/// Catalog with `n` songs where edge (from, to) exists when `keep` says so
fn catalog(n: u32, keep: &[bool], choices: &[(bool, bool)]) -> Catalog {
    let mut connections = Vec::new();
    let mut i = 0;
    for from in 1..=n {
        for to in 1..=n {
            if from == to {
                continue;
            }
            if keep[i % keep.len()] {
                let (fc, tc) = choices[i % choices.len()];
                connections.push(Connection::new(
                    from,
                    to,
                    choice(fc),
                    choice(tc),
                    format!("B{}-{}", from, to),
                ));
            }
            i += 1;
        }
    }
    Catalog::new("release", songs(n), connections).unwrap()
}

fn arbitrary_choices() -> impl Strategy<Value = Vec<(bool, bool)>> {
    prop::collection::vec((any::<bool>(), any::<bool>()), 1..16)
}

fn song_slots(queue: &[QueueItem]) -> Vec<u32> {
    queue.iter().filter_map(QueueItem::song_slot).collect()
}

// ===== Property Tests =====

proptest! {
    /// Property: a fully connected catalog of N songs yields 2N-1 alternating items
    #[test]
    fn fully_connected_yields_alternating_queue(
        n in 1u32..9,
        seed in any::<u64>(),
        choices in arbitrary_choices(),
    ) {
        let catalog = catalog(n, &[true], &choices);
        let mut rng = StdRng::seed_from_u64(seed);

        let queue = build_queue(&catalog, &mut rng);

        prop_assert_eq!(queue.len(), 2 * n as usize - 1);
        prop_assert!(validate_alternation(&queue));

        let slots = song_slots(&queue);
        let unique: HashSet<_> = slots.iter().copied().collect();
        prop_assert_eq!(unique.len(), n as usize, "every song exactly once");
    }

    /// Property: bridges connect the songs around them, and choices follow edges
    #[test]
    fn bridges_match_adjacent_songs(
        n in 2u32..8,
        seed in any::<u64>(),
        choices in arbitrary_choices(),
    ) {
        let catalog = catalog(n, &[true], &choices);
        let mut rng = StdRng::seed_from_u64(seed);
        let queue = build_queue(&catalog, &mut rng);

        for (i, item) in queue.iter().enumerate() {
            if let QueueItem::Bridge { from_slot, to_slot, source_key } = item {
                prop_assert_eq!(queue[i - 1].song_slot(), Some(*from_slot));
                prop_assert_eq!(queue[i + 1].song_slot(), Some(*to_slot));

                let edge = catalog.connection(*from_slot, *to_slot).unwrap();
                prop_assert_eq!(source_key, &edge.bridge.source_key);
                prop_assert_eq!(queue[i + 1].choice(), Some(edge.to_choice));
                if i == 1 {
                    prop_assert_eq!(queue[0].choice(), Some(edge.from_choice));
                }
            }
        }
    }

    /// Property: with missing edges the queue is either empty or complete
    #[test]
    fn missing_edges_fail_closed(
        n in 2u32..7,
        seed in any::<u64>(),
        keep in prop::collection::vec(any::<bool>(), 1..20),
        choices in arbitrary_choices(),
    ) {
        let catalog = catalog(n, &keep, &choices);
        let mut rng = StdRng::seed_from_u64(seed);
        let route = build_route(&catalog, &mut rng.clone());
        let queue = build_queue(&catalog, &mut rng);

        let buildable = route
            .windows(2)
            .all(|pair| catalog.connection(pair[0], pair[1]).is_some());

        if buildable {
            prop_assert_eq!(queue.len(), 2 * n as usize - 1);
            prop_assert_eq!(song_slots(&queue), route);
        } else {
            prop_assert!(queue.is_empty(), "partial queue returned: {:?}", queue);
        }
    }

    /// Property: route is a permutation of the playable slots
    #[test]
    fn route_is_permutation(n in 1u32..12, seed in any::<u64>()) {
        let catalog = catalog(n, &[false], &[(false, false)]);
        let mut rng = StdRng::seed_from_u64(seed);

        let mut route = build_route(&catalog, &mut rng);
        route.sort_unstable();
        prop_assert_eq!(route, (1..=n).collect::<Vec<_>>());
    }

    /// Property: an explicit route over present edges always builds
    #[test]
    fn explicit_route_builds(n in 1u32..8, choices in arbitrary_choices()) {
        let catalog = catalog(n, &[true], &choices);
        let route: Vec<u32> = (1..=n).rev().collect();

        let queue = queue_for_route(&catalog, &route).unwrap();
        prop_assert_eq!(song_slots(&queue), route);
    }
}
