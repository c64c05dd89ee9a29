//! Terminal output formatting
use bridge_core::{Catalog, Choice};
use bridge_playback::{EngineState, PlaybackSnapshot, QueueItem};

fn choice_tag(choice: Choice) -> &'static str {
    match choice {
        Choice::A => "a",
        Choice::B => "b",
    }
}

/// One line per queue item
pub fn queue_lines(queue: &[QueueItem]) -> Vec<String> {
    queue
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            QueueItem::Song {
                slot,
                title,
                choice,
                ..
            } => format!("{:>3}  song    {}. {} ({})", i + 1, slot, title, choice_tag(*choice)),
            QueueItem::Bridge {
                from_slot, to_slot, ..
            } => format!("{:>3}  bridge  {} -> {}", i + 1, from_slot, to_slot),
        })
        .collect()
}

pub fn catalog_summary(catalog: &Catalog) -> String {
    let mut summary = String::new();
    if !catalog.title().is_empty() {
        summary.push_str(catalog.title());
    } else {
        summary.push_str(catalog.release_id().as_str());
    }
    if !catalog.artist().is_empty() {
        summary.push_str(" by ");
        summary.push_str(catalog.artist());
    }
    format!(
        "{} ({} songs, {} connections{})",
        summary,
        catalog.songs().len(),
        catalog.connection_count(),
        if catalog.is_fully_connected() {
            ", fully connected"
        } else {
            ""
        }
    )
}

fn state_tag(state: EngineState) -> &'static str {
    match state {
        EngineState::Idle => "idle",
        EngineState::Loading => "loading",
        EngineState::PlayingSong => "song",
        EngineState::PlayingBridge => "bridge",
        EngineState::Paused => "paused",
        EngineState::Finished => "finished",
    }
}

/// Status line for a snapshot
pub fn snapshot_line(snapshot: &PlaybackSnapshot) -> String {
    let position = match snapshot.index {
        Some(i) => format!("{}/{}", i + 1, snapshot.queue_len),
        None => "-".to_string(),
    };

    let label = if snapshot.now_playing_label.is_empty() {
        "...".to_string()
    } else {
        snapshot.now_playing_label.clone()
    };

    let marker = match (snapshot.active_song_slot, snapshot.highlight_visible) {
        (Some(slot), true) => format!(" [*{}]", slot),
        _ => String::new(),
    };

    format!(
        "[{:<8} {:>5}] {}{}",
        state_tag(snapshot.state),
        position,
        label,
        marker
    )
}
