//! SQLite-backed warehouse: dimension upserts, fact writes and the catalog lookup.
//!
//! Every write runs in autocommit mode and is durable as soon as the call
//! returns, so a failure part way through a file keeps the rows before it.

use rusqlite::{params, Connection};
use std::path::Path;

use crate::error::{EtlError, Result};
use crate::models::{start_time_key, ArtistRecord, SongRecord, SongplayRecord, TimeEntry, UserRecord};
use crate::schema;

/// Outcome of a songplay write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactWrite {
    Inserted,
    /// A row with the same key already existed; only `user_agent` was refreshed.
    Updated,
}

pub struct Warehouse {
    conn: Connection,
}

impl Warehouse {
    /// Open (or create) the warehouse database file.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Create any missing tables.
    pub fn create_tables(&self) -> Result<()> {
        for table in schema::CREATE_ORDER {
            self.conn.execute_batch(table.schema)?;
            for index in table.indices {
                self.conn.execute_batch(index)?;
            }
        }
        Ok(())
    }

    pub fn drop_tables(&self) -> Result<()> {
        for name in schema::DROP_ORDER {
            self.conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", name))?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn count_rows(&self, table: &schema::Table) -> Result<i64> {
        let count = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table.name), [], |row| row.get(0))?;
        Ok(count)
    }

    // ------------------------------------------------------------------------
    // Dimensions
    // ------------------------------------------------------------------------

    pub fn upsert_song(&self, song: &SongRecord) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(schema::SONG_UPSERT)?;
        stmt.execute(params![
            song.song_id,
            song.title,
            song.artist_id,
            song.year,
            song.duration,
        ])
        .map_err(|source| EtlError::DimensionWrite {
            table: "songs",
            source,
        })?;
        Ok(())
    }

    pub fn upsert_artist(&self, artist: &ArtistRecord) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(schema::ARTIST_UPSERT)?;
        stmt.execute(params![
            artist.artist_id,
            artist.name,
            artist.location,
            artist.latitude,
            artist.longitude,
        ])
        .map_err(|source| EtlError::DimensionWrite {
            table: "artists",
            source,
        })?;
        Ok(())
    }

    pub fn upsert_user(&self, user: &UserRecord) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(schema::USER_UPSERT)?;
        stmt.execute(params![
            user.user_id,
            user.first_name,
            user.last_name,
            user.gender,
            user.level,
        ])
        .map_err(|source| EtlError::DimensionWrite {
            table: "users",
            source,
        })?;
        Ok(())
    }

    /// Insert a time row unless one already exists for `start_time`.
    /// Returns `true` when a row was added.
    pub fn insert_time(&self, entry: &TimeEntry) -> Result<bool> {
        let mut stmt = self.conn.prepare_cached(schema::TIME_INSERT)?;
        let changed = stmt
            .execute(params![
                start_time_key(&entry.start_time),
                entry.hour,
                entry.day,
                entry.week,
                entry.month,
                entry.year,
                entry.weekday,
            ])
            .map_err(|source| EtlError::DimensionWrite {
                table: "time",
                source,
            })?;
        Ok(changed > 0)
    }

    // ------------------------------------------------------------------------
    // Facts
    // ------------------------------------------------------------------------

    /// Upsert a songplay keyed by (start_time, user_id, song_id, artist_id).
    /// NULL ids compare equal here, so replays of an unresolved play collapse too.
    pub fn upsert_songplay(&mut self, play: &SongplayRecord) -> Result<FactWrite> {
        let start_time = start_time_key(&play.start_time);
        let tx = self.conn.transaction().map_err(EtlError::FactWrite)?;
        let outcome = {
            let updated = tx
                .prepare_cached(schema::SONGPLAY_UPDATE)?
                .execute(params![
                    start_time,
                    play.user_id,
                    play.song_id,
                    play.artist_id,
                    play.user_agent,
                ])
                .map_err(EtlError::FactWrite)?;

            if updated > 0 {
                FactWrite::Updated
            } else {
                tx.prepare_cached(schema::SONGPLAY_INSERT)?
                    .execute(params![
                        start_time,
                        play.user_id,
                        play.level,
                        play.song_id,
                        play.artist_id,
                        play.session_id,
                        play.location,
                        play.user_agent,
                    ])
                    .map_err(EtlError::FactWrite)?;
                FactWrite::Inserted
            }
        };
        tx.commit().map_err(EtlError::FactWrite)?;
        Ok(outcome)
    }

    // ------------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------------

    /// All (song_id, artist_id) pairs whose title, artist name and duration match exactly.
    pub fn find_songs(&self, title: &str, artist: &str, duration: f64) -> Result<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare_cached(schema::SONG_SELECT)
            .map_err(EtlError::Lookup)?;
        let rows = stmt
            .query_map(params![title, artist, duration], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(EtlError::Lookup)?;

        let mut matches = Vec::new();
        for row in rows {
            matches.push(row.map_err(EtlError::Lookup)?);
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SongMatch;
    use crate::time_dim::derive_time_entry;

    fn warehouse() -> Warehouse {
        let wh = Warehouse::open_in_memory().unwrap();
        wh.create_tables().unwrap();
        wh
    }

    fn song() -> SongRecord {
        SongRecord {
            song_id: "S1".to_string(),
            title: "Test Song".to_string(),
            artist_id: "A1".to_string(),
            year: Some(2000),
            duration: 210.5,
        }
    }

    fn artist() -> ArtistRecord {
        ArtistRecord {
            artist_id: "A1".to_string(),
            name: "Test Artist".to_string(),
            location: Some("NYC".to_string()),
            latitude: Some(40.7),
            longitude: Some(-74.0),
        }
    }

    fn user(level: &str) -> UserRecord {
        UserRecord {
            user_id: "10".to_string(),
            first_name: Some("Lily".to_string()),
            last_name: Some("Koch".to_string()),
            gender: Some("F".to_string()),
            level: Some(level.to_string()),
        }
    }

    fn play(wh: &Warehouse, song: SongMatch, user_agent: &str) -> SongplayRecord {
        let entry = derive_time_entry(1541207073796).unwrap();
        wh.insert_time(&entry).unwrap();
        wh.upsert_user(&user("free")).unwrap();
        SongplayRecord {
            start_time: entry.start_time,
            user_id: "10".to_string(),
            level: Some("free".to_string()),
            song_id: song.song_id,
            artist_id: song.artist_id,
            session_id: Some(583),
            location: Some("X".to_string()),
            user_agent: Some(user_agent.to_string()),
        }
    }

    #[test]
    fn test_song_and_artist_upsert_idempotent() {
        let wh = warehouse();
        for _ in 0..2 {
            wh.upsert_song(&song()).unwrap();
            wh.upsert_artist(&artist()).unwrap();
        }
        assert_eq!(wh.count_rows(&schema::SONGS_TABLE).unwrap(), 1);
        assert_eq!(wh.count_rows(&schema::ARTISTS_TABLE).unwrap(), 1);

        let (title, year, duration): (String, i32, f64) = wh
            .connection()
            .query_row(
                "SELECT title, year, duration FROM songs WHERE song_id = 'S1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(title, "Test Song");
        assert_eq!(year, 2000);
        assert_eq!(duration, 210.5);

        let (name, location, lat, lon): (String, String, f64, f64) = wh
            .connection()
            .query_row(
                "SELECT name, location, latitude, longitude FROM artists WHERE artist_id = 'A1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .unwrap();
        assert_eq!(name, "Test Artist");
        assert_eq!(location, "NYC");
        assert_eq!(lat, 40.7);
        assert_eq!(lon, -74.0);
    }

    #[test]
    fn test_song_upsert_overwrites_attributes() {
        let wh = warehouse();
        wh.upsert_song(&song()).unwrap();
        let mut changed = song();
        changed.year = None;
        changed.duration = 211.0;
        wh.upsert_song(&changed).unwrap();

        let (year, duration): (Option<i32>, f64) = wh
            .connection()
            .query_row("SELECT year, duration FROM songs", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(year, None);
        assert_eq!(duration, 211.0);
    }

    #[test]
    fn test_song_id_reused_with_other_title_fails() {
        let wh = warehouse();
        wh.upsert_song(&song()).unwrap();
        let mut other = song();
        other.title = "Another Title".to_string();
        let err = wh.upsert_song(&other).unwrap_err();
        assert!(matches!(err, EtlError::DimensionWrite { table: "songs", .. }));
    }

    #[test]
    fn test_user_level_last_write_wins() {
        let wh = warehouse();
        wh.upsert_user(&user("free")).unwrap();
        wh.upsert_user(&user("paid")).unwrap();
        assert_eq!(wh.count_rows(&schema::USERS_TABLE).unwrap(), 1);
        let level: String = wh
            .connection()
            .query_row("SELECT level FROM users WHERE user_id = '10'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(level, "paid");
    }

    #[test]
    fn test_time_insert_if_absent() {
        let wh = warehouse();
        let entry = derive_time_entry(1541207073796).unwrap();
        assert!(wh.insert_time(&entry).unwrap());
        assert!(!wh.insert_time(&entry).unwrap());
        assert_eq!(wh.count_rows(&schema::TIME_TABLE).unwrap(), 1);

        let (start_time, hour, week, weekday): (String, u32, u32, u32) = wh
            .connection()
            .query_row("SELECT start_time, hour, week, weekday FROM time", [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })
            .unwrap();
        assert_eq!(start_time, "2018-11-03 01:04:33.796");
        assert_eq!(hour, 1);
        assert_eq!(week, 44);
        assert_eq!(weekday, 5);
    }

    #[test]
    fn test_songplay_upsert_keeps_latest_user_agent() {
        let mut wh = warehouse();
        let resolved = SongMatch {
            song_id: Some("S1".to_string()),
            artist_id: Some("A1".to_string()),
        };
        let first = play(&wh, resolved.clone(), "agent-1");
        let second = play(&wh, resolved, "agent-2");

        assert_eq!(wh.upsert_songplay(&first).unwrap(), FactWrite::Inserted);
        assert_eq!(wh.upsert_songplay(&second).unwrap(), FactWrite::Updated);
        assert_eq!(wh.count_rows(&schema::SONGPLAYS_TABLE).unwrap(), 1);

        let agent: String = wh
            .connection()
            .query_row("SELECT user_agent FROM songplays", [], |row| row.get(0))
            .unwrap();
        assert_eq!(agent, "agent-2");
    }

    #[test]
    fn test_unresolved_songplay_collapses() {
        let mut wh = warehouse();
        let first = play(&wh, SongMatch::miss(), "agent-1");
        let second = play(&wh, SongMatch::miss(), "agent-2");

        assert_eq!(wh.upsert_songplay(&first).unwrap(), FactWrite::Inserted);
        assert_eq!(wh.upsert_songplay(&second).unwrap(), FactWrite::Updated);
        assert_eq!(wh.count_rows(&schema::SONGPLAYS_TABLE).unwrap(), 1);

        let (song_id, artist_id, session_id): (Option<String>, Option<String>, String) = wh
            .connection()
            .query_row("SELECT song_id, artist_id, session_id FROM songplays", [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .unwrap();
        assert_eq!(song_id, None);
        assert_eq!(artist_id, None);
        assert_eq!(session_id, "583");
    }

    #[test]
    fn test_resolved_and_unresolved_plays_are_distinct() {
        let mut wh = warehouse();
        let resolved = SongMatch {
            song_id: Some("S1".to_string()),
            artist_id: Some("A1".to_string()),
        };
        let a = play(&wh, resolved, "agent");
        let b = play(&wh, SongMatch::miss(), "agent");
        wh.upsert_songplay(&a).unwrap();
        wh.upsert_songplay(&b).unwrap();
        assert_eq!(wh.count_rows(&schema::SONGPLAYS_TABLE).unwrap(), 2);
    }

    #[test]
    fn test_songplay_requires_time_row() {
        let mut wh = warehouse();
        wh.upsert_user(&user("free")).unwrap();
        let entry = derive_time_entry(1541207073796).unwrap();
        let orphan = SongplayRecord {
            start_time: entry.start_time,
            user_id: "10".to_string(),
            level: None,
            song_id: None,
            artist_id: None,
            session_id: None,
            location: None,
            user_agent: None,
        };
        assert!(matches!(
            wh.upsert_songplay(&orphan),
            Err(EtlError::FactWrite(_))
        ));
        assert_eq!(wh.count_rows(&schema::SONGPLAYS_TABLE).unwrap(), 0);
    }

    #[test]
    fn test_deleting_user_cascades_to_songplays() {
        let mut wh = warehouse();
        let unresolved = play(&wh, SongMatch::miss(), "agent");
        wh.upsert_songplay(&unresolved).unwrap();
        assert_eq!(wh.count_rows(&schema::SONGPLAYS_TABLE).unwrap(), 1);

        wh.connection()
            .execute("DELETE FROM users WHERE user_id = '10'", [])
            .unwrap();
        assert_eq!(wh.count_rows(&schema::USERS_TABLE).unwrap(), 0);
        assert_eq!(wh.count_rows(&schema::SONGPLAYS_TABLE).unwrap(), 0);
        // The time row has no cascade and stays put
        assert_eq!(wh.count_rows(&schema::TIME_TABLE).unwrap(), 1);
    }

    #[test]
    fn test_find_songs_exact_match_only() {
        let wh = warehouse();
        wh.upsert_song(&song()).unwrap();
        wh.upsert_artist(&artist()).unwrap();

        assert_eq!(
            wh.find_songs("Test Song", "Test Artist", 210.5).unwrap(),
            vec![("S1".to_string(), "A1".to_string())]
        );
        assert!(wh.find_songs("test song", "Test Artist", 210.5).unwrap().is_empty());
        assert!(wh.find_songs("Test Song", "Test Artist ", 210.5).unwrap().is_empty());
        assert!(wh.find_songs("Test Song", "Test Artist", 210.50001).unwrap().is_empty());
    }

    #[test]
    fn test_drop_and_recreate() {
        let wh = warehouse();
        wh.upsert_song(&song()).unwrap();
        wh.drop_tables().unwrap();
        wh.create_tables().unwrap();
        assert_eq!(wh.count_rows(&schema::SONGS_TABLE).unwrap(), 0);
    }
}
