//! Record parser for song-metadata and event-log JSON lines.
//!
//! Each physical line holds one JSON object. Song lines yield a song and an
//! artist record; event lines yield a [`PlayEvent`] only when `page` is the
//! play marker, and are dropped silently otherwise.

use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{EtlError, ParseError, Result};
use crate::models::{ArtistRecord, PlayEvent, SongRecord};

/// `page` value that marks a song playback.
pub const PLAY_PAGE: &str = "NextSong";

#[derive(Deserialize)]
struct RawSong {
    song_id: Option<String>,
    title: Option<String>,
    artist_id: Option<String>,
    year: Option<i32>,
    duration: Option<f64>,
    artist_name: Option<String>,
    artist_location: Option<String>,
    artist_latitude: Option<f64>,
    artist_longitude: Option<f64>,
}

/// Log files carry `userId` as a string, some exports as a number.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawUserId {
    Text(String),
    Number(i64),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    ts: Option<i64>,
    user_id: Option<RawUserId>,
    first_name: Option<String>,
    last_name: Option<String>,
    gender: Option<String>,
    level: Option<String>,
    song: Option<String>,
    artist: Option<String>,
    length: Option<f64>,
    session_id: Option<i64>,
    location: Option<String>,
    user_agent: Option<String>,
}

fn required<T>(value: Option<T>, field: &'static str) -> std::result::Result<T, ParseError> {
    value.ok_or(ParseError::MissingField(field))
}

/// Parse one song-metadata line into its song and artist records.
pub fn parse_song_line(line: &str) -> std::result::Result<(SongRecord, ArtistRecord), ParseError> {
    let raw: RawSong = serde_json::from_str(line)?;

    let artist_id = required(raw.artist_id, "artist_id")?;
    let song = SongRecord {
        song_id: required(raw.song_id, "song_id")?,
        title: required(raw.title, "title")?,
        artist_id: artist_id.clone(),
        year: raw.year,
        duration: required(raw.duration, "duration")?,
    };
    let artist = ArtistRecord {
        artist_id,
        name: required(raw.artist_name, "artist_name")?,
        location: raw.artist_location,
        latitude: raw.artist_latitude,
        longitude: raw.artist_longitude,
    };

    Ok((song, artist))
}

/// Parse one event-log line. `Ok(None)` means the line is not a play event.
///
/// Non-play lines are not validated beyond being a JSON object.
pub fn parse_event_line(line: &str) -> std::result::Result<Option<PlayEvent>, ParseError> {
    let value: Value = serde_json::from_str(line)?;
    if !value.is_object() {
        return Err(ParseError::WrongShape {
            field: "record",
            expected: "a JSON object",
        });
    }
    if value.get("page").and_then(Value::as_str) != Some(PLAY_PAGE) {
        return Ok(None);
    }

    let raw: RawEvent = serde_json::from_value(value)?;
    let user_id = match required(raw.user_id, "userId")? {
        RawUserId::Text(s) if s.trim().is_empty() => {
            return Err(ParseError::WrongShape {
                field: "userId",
                expected: "a non-empty id",
            })
        }
        RawUserId::Text(s) => s,
        RawUserId::Number(n) => n.to_string(),
    };

    Ok(Some(PlayEvent {
        ts: required(raw.ts, "ts")?,
        user_id,
        first_name: raw.first_name,
        last_name: raw.last_name,
        gender: raw.gender,
        level: raw.level,
        song: raw.song,
        artist: raw.artist,
        length: raw.length,
        session_id: raw.session_id,
        location: raw.location,
        user_agent: raw.user_agent,
    }))
}

/// Run `parse` over every non-blank line of `path`, stopping at the first failure.
/// The callback receives the 1-based line number.
pub fn for_each_line<F>(path: &Path, mut parse: F) -> Result<()>
where
    F: FnMut(usize, &str) -> std::result::Result<(), ParseError>,
{
    let file = File::open(path).map_err(|source| EtlError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| EtlError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        parse(idx + 1, &line).map_err(|source| EtlError::Parse {
            path: path.to_path_buf(),
            line: idx + 1,
            source,
        })?;
    }

    Ok(())
}

/// Read every record of a song-metadata file.
pub fn read_song_file(path: &Path) -> Result<Vec<(SongRecord, ArtistRecord)>> {
    let mut records = Vec::new();
    for_each_line(path, |_, line| {
        records.push(parse_song_line(line)?);
        Ok(())
    })?;
    Ok(records)
}
