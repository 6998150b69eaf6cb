//! Core data models for the Sparkify ETL.
//!
//! One plain struct per warehouse entity, built directly from parsed JSON.
//! Nothing here talks to the database.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Storage format of `start_time` keys (UTC, millisecond precision).
pub const START_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Render a timestamp the way it is stored in the `time` and `songplays` tables.
pub fn start_time_key(ts: &NaiveDateTime) -> String {
    ts.format(START_TIME_FORMAT).to_string()
}

// ============================================================================
// Song Metadata
// ============================================================================

/// Row of the `songs` dimension.
#[derive(Clone, Debug, PartialEq)]
pub struct SongRecord {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    pub year: Option<i32>,
    pub duration: f64,
}

/// Row of the `artists` dimension.
#[derive(Clone, Debug, PartialEq)]
pub struct ArtistRecord {
    pub artist_id: String,
    pub name: String,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

// ============================================================================
// Event Logs
// ============================================================================

/// A log entry whose page is the play marker. Everything else is dropped by the parser.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayEvent {
    pub ts: i64,
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
    pub song: Option<String>,
    pub artist: Option<String>,
    pub length: Option<f64>,
    pub session_id: Option<i64>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

impl PlayEvent {
    pub fn user(&self) -> UserRecord {
        UserRecord {
            user_id: self.user_id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            gender: self.gender.clone(),
            level: self.level.clone(),
        }
    }
}

/// Row of the `users` dimension. `level` changes over time (free/paid).
#[derive(Clone, Debug, PartialEq)]
pub struct UserRecord {
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
}

/// Row of the `time` dimension. Every field is derived from `start_time`.
///
/// `weekday` counts from Monday = 0 to Sunday = 6; `week` is the ISO-8601 week.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeEntry {
    pub start_time: NaiveDateTime,
    pub hour: u32,
    pub day: u32,
    pub week: u32,
    pub month: u32,
    pub year: i32,
    pub weekday: u32,
}

// ============================================================================
// Facts
// ============================================================================

/// Result of looking a play up in the catalog.
/// Both ids are `None` when the song is not in the catalog.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SongMatch {
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
}

impl SongMatch {
    pub fn miss() -> Self {
        Self::default()
    }

    pub fn is_resolved(&self) -> bool {
        self.song_id.is_some() && self.artist_id.is_some()
    }
}

/// Row of the `songplays` fact table.
/// Keyed by (start_time, user_id, song_id, artist_id).
#[derive(Clone, Debug, PartialEq)]
pub struct SongplayRecord {
    pub start_time: NaiveDateTime,
    pub user_id: String,
    pub level: Option<String>,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: Option<i64>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

impl SongplayRecord {
    pub fn new(event: &PlayEvent, start_time: NaiveDateTime, song: SongMatch) -> Self {
        Self {
            start_time,
            user_id: event.user_id.clone(),
            level: event.level.clone(),
            song_id: song.song_id,
            artist_id: song.artist_id,
            session_id: event.session_id,
            location: event.location.clone(),
            user_agent: event.user_agent.clone(),
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// A file that failed while `continue_on_error` was set.
#[derive(Clone, Debug, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Counters for one run, reported at the end.
#[derive(Default, Debug, Clone, Serialize)]
pub struct RunStats {
    // Song metadata tree
    pub song_files: usize,
    pub songs_written: usize,
    pub artists_written: usize,

    // Event log tree
    pub log_files: usize,
    pub events_skipped: usize,
    pub time_rows_written: usize,
    pub users_written: usize,
    pub songplays_written: usize,
    pub songplays_resolved: usize,
    pub songplays_unresolved: usize,

    pub failures: Vec<FileFailure>,

    pub elapsed_seconds: f64,
}

impl RunStats {
    /// Share of songplays that found a catalog match, as a percentage.
    pub fn resolve_rate(&self) -> f64 {
        if self.songplays_written == 0 {
            0.0
        } else {
            100.0 * self.songplays_resolved as f64 / self.songplays_written as f64
        }
    }

    pub fn record_failure(&mut self, path: &Path, error: impl ToString) {
        self.failures.push(FileFailure {
            path: path.to_path_buf(),
            error: error.to_string(),
        });
    }

    /// Log stats to stderr in JSON format
    pub fn log_summary(&self) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            eprintln!("[STATS]\n{}", json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
