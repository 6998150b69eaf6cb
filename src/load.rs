//! Transform-and-load for both input trees.
//!
//! Song-metadata files feed the `songs` and `artists` dimensions. Event-log
//! files are parsed in full first, then written in three passes: time rows,
//! users, then songplays with their catalog lookup.

use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::EtlConfig;
use crate::discover::find_json_files;
use crate::error::Result;
use crate::models::{PlayEvent, RunStats, SongplayRecord, TimeEntry};
use crate::parse::{for_each_line, parse_event_line, read_song_file};
use crate::progress::{create_progress_bar, report_file_done};
use crate::resolve::resolve_event;
use crate::store::{FactWrite, Warehouse};
use crate::time_dim::derive_time_entry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Songs,
    Logs,
}

impl InputKind {
    fn label(self) -> &'static str {
        match self {
            InputKind::Songs => "Song files",
            InputKind::Logs => "Log files",
        }
    }
}

/// Load one song-metadata file into `songs` and `artists`.
pub fn process_song_file(warehouse: &Warehouse, path: &Path, stats: &mut RunStats) -> Result<()> {
    for (song, artist) in read_song_file(path)? {
        warehouse.upsert_song(&song)?;
        stats.songs_written += 1;
        warehouse.upsert_artist(&artist)?;
        stats.artists_written += 1;
    }
    Ok(())
}

/// Load one event-log file into `time`, `users` and `songplays`.
///
/// A malformed line stops the file before anything from it is written.
pub fn process_log_file(warehouse: &mut Warehouse, path: &Path, stats: &mut RunStats) -> Result<()> {
    let mut plays: Vec<(PlayEvent, TimeEntry)> = Vec::new();
    let mut skipped = 0;
    for_each_line(path, |_, line| {
        match parse_event_line(line)? {
            Some(event) => {
                let time = derive_time_entry(event.ts)?;
                plays.push((event, time));
            }
            None => skipped += 1,
        }
        Ok(())
    })?;
    stats.events_skipped += skipped;

    for (_, time) in &plays {
        if warehouse.insert_time(time)? {
            stats.time_rows_written += 1;
        }
    }

    for (event, _) in &plays {
        warehouse.upsert_user(&event.user())?;
        stats.users_written += 1;
    }

    for (event, time) in &plays {
        let song = resolve_event(warehouse, event)?;
        if song.is_resolved() {
            stats.songplays_resolved += 1;
        } else {
            debug!(
                song = event.song.as_deref().unwrap_or(""),
                artist = event.artist.as_deref().unwrap_or(""),
                "No catalog match for play"
            );
            stats.songplays_unresolved += 1;
        }

        let record = SongplayRecord::new(event, time.start_time, song);
        if warehouse.upsert_songplay(&record)? == FactWrite::Updated {
            debug!(user_id = %record.user_id, ts = event.ts, "Songplay already present, refreshed user_agent");
        }
        stats.songplays_written += 1;
    }

    Ok(())
}

/// Process every JSON file under `root`, one at a time, in path order.
pub fn process_data(
    warehouse: &mut Warehouse,
    root: &Path,
    kind: InputKind,
    continue_on_error: bool,
    stats: &mut RunStats,
) -> Result<()> {
    let files = find_json_files(root)?;
    let total = files.len();
    println!("{} files found in {}", total, root.display());

    let pb = create_progress_bar(total as u64, kind.label());
    for (i, path) in files.iter().enumerate() {
        let outcome = match kind {
            InputKind::Songs => process_song_file(warehouse, path, stats),
            InputKind::Logs => process_log_file(warehouse, path, stats),
        };

        match outcome {
            Ok(()) => match kind {
                InputKind::Songs => stats.song_files += 1,
                InputKind::Logs => stats.log_files += 1,
            },
            Err(e) if continue_on_error => {
                warn!(path = %path.display(), error = %e, "File failed, continuing");
                stats.record_failure(path, &e);
            }
            Err(e) => {
                pb.abandon();
                return Err(e);
            }
        }

        report_file_done(&pb, i + 1, total);
    }
    pb.finish_with_message(format!("{}: {} processed", kind.label(), total));

    Ok(())
}

/// Run the whole job: song-metadata tree first, then the event-log tree.
pub fn run(config: &EtlConfig) -> Result<RunStats> {
    let start = Instant::now();
    let mut stats = RunStats::default();

    info!(database = %config.database.display(), "Opening warehouse");
    let mut warehouse = Warehouse::open(&config.database)?;
    warehouse.create_tables()?;

    process_data(
        &mut warehouse,
        &config.song_data,
        InputKind::Songs,
        config.continue_on_error,
        &mut stats,
    )?;
    process_data(
        &mut warehouse,
        &config.log_data,
        InputKind::Logs,
        config.continue_on_error,
        &mut stats,
    )?;

    stats.elapsed_seconds = start.elapsed().as_secs_f64();
    Ok(stats)
}
