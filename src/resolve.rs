//! Resolves a play event's free-text song, artist and length to catalog ids.
//!
//! Matching is exact: no case folding, no whitespace trimming, no duration
//! tolerance. A play of a song outside the catalog resolves to a miss, which
//! is a normal outcome and never an error.

use tracing::debug;

use crate::error::Result;
use crate::models::{PlayEvent, SongMatch};
use crate::store::Warehouse;

/// Look up (song_id, artist_id) for exactly this title, artist name and duration.
///
/// When several catalog rows match, the lowest (song_id, artist_id) wins.
pub fn resolve(warehouse: &Warehouse, title: &str, artist: &str, duration: f64) -> Result<SongMatch> {
    let mut matches = warehouse.find_songs(title, artist, duration)?;
    if matches.len() > 1 {
        debug!(
            title,
            artist,
            duration,
            candidates = matches.len(),
            "Ambiguous catalog match, taking the first"
        );
    }

    if matches.is_empty() {
        return Ok(SongMatch::miss());
    }
    let (song_id, artist_id) = matches.swap_remove(0);
    Ok(SongMatch {
        song_id: Some(song_id),
        artist_id: Some(artist_id),
    })
}

/// Resolve a play event. Events without a song, artist or length are a miss.
pub fn resolve_event(warehouse: &Warehouse, event: &PlayEvent) -> Result<SongMatch> {
    match (&event.song, &event.artist, event.length) {
        (Some(title), Some(artist), Some(length)) => resolve(warehouse, title, artist, length),
        _ => Ok(SongMatch::miss()),
    }
}
