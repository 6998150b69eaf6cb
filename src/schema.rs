//! Star schema for the Sparkify warehouse and the statements that write to it.

pub struct Table {
    pub name: &'static str,
    pub schema: &'static str,
    pub indices: &'static [&'static str],
}

pub const USERS_TABLE: Table = Table {
    name: "users",
    schema: "CREATE TABLE IF NOT EXISTS users (
        user_id varchar (18) PRIMARY KEY,
        first_name text,
        last_name text,
        gender varchar (1),
        level varchar (4)
    )",
    indices: &[],
};

pub const SONGS_TABLE: Table = Table {
    name: "songs",
    schema: "CREATE TABLE IF NOT EXISTS songs (
        song_id varchar (18) PRIMARY KEY,
        title text NOT NULL,
        artist_id varchar (18) NOT NULL,
        year int,
        duration decimal NOT NULL,
        UNIQUE(song_id, title, artist_id)
    )",
    indices: &["CREATE INDEX IF NOT EXISTS songs_title_duration ON songs (title, duration)"],
};

pub const ARTISTS_TABLE: Table = Table {
    name: "artists",
    schema: "CREATE TABLE IF NOT EXISTS artists (
        artist_id varchar (18) PRIMARY KEY,
        name text NOT NULL,
        location text,
        latitude decimal,
        longitude decimal,
        UNIQUE(artist_id, name)
    )",
    indices: &[],
};

pub const TIME_TABLE: Table = Table {
    name: "time",
    schema: "CREATE TABLE IF NOT EXISTS time (
        start_time timestamp PRIMARY KEY,
        hour int,
        day int,
        week int,
        month int,
        year int,
        weekday int
    )",
    indices: &[],
};

// song_id/artist_id are logical references only: both may be NULL.
pub const SONGPLAYS_TABLE: Table = Table {
    name: "songplays",
    schema: "CREATE TABLE IF NOT EXISTS songplays (
        songplay_id INTEGER PRIMARY KEY,
        start_time timestamp NOT NULL,
        user_id varchar (18) NOT NULL,
        level varchar (4),
        song_id varchar (18),
        artist_id varchar (18),
        session_id varchar (18),
        location text,
        user_agent text,
        UNIQUE(start_time, user_id, song_id, artist_id),
        CONSTRAINT fk_time FOREIGN KEY(start_time) REFERENCES time(start_time) ON DELETE NO ACTION,
        CONSTRAINT fk_user FOREIGN KEY(user_id) REFERENCES users(user_id) ON DELETE CASCADE
    )",
    indices: &[],
};

/// Creation order: dimensions before the fact table that references them.
pub const CREATE_ORDER: &[Table] = &[
    USERS_TABLE,
    SONGS_TABLE,
    ARTISTS_TABLE,
    TIME_TABLE,
    SONGPLAYS_TABLE,
];

/// Drop order: fact table first.
pub const DROP_ORDER: &[&str] = &["songplays", "users", "songs", "artists", "time"];

// ============================================================================
// Writes
// ============================================================================

pub const SONG_UPSERT: &str = "
    INSERT INTO songs (song_id, title, artist_id, year, duration)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT (song_id, title, artist_id)
    DO UPDATE SET (year, duration) = (excluded.year, excluded.duration)";

pub const ARTIST_UPSERT: &str = "
    INSERT INTO artists (artist_id, name, location, latitude, longitude)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT (artist_id, name)
    DO UPDATE SET (location, latitude, longitude) = (excluded.location, excluded.latitude, excluded.longitude)";

pub const USER_UPSERT: &str = "
    INSERT INTO users (user_id, first_name, last_name, gender, level)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT (user_id)
    DO UPDATE SET (first_name, last_name, gender, level) = (excluded.first_name, excluded.last_name, excluded.gender, excluded.level)";

pub const TIME_INSERT: &str = "
    INSERT INTO time (start_time, hour, day, week, month, year, weekday)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    ON CONFLICT (start_time)
    DO NOTHING";

// The unique constraint never fires when song_id/artist_id are NULL, so the
// songplay upsert is an IS-based update followed by an insert.
pub const SONGPLAY_UPDATE: &str = "
    UPDATE songplays SET user_agent = ?5
    WHERE start_time = ?1 AND user_id = ?2 AND song_id IS ?3 AND artist_id IS ?4";

pub const SONGPLAY_INSERT: &str = "
    INSERT INTO songplays (start_time, user_id, level, song_id, artist_id, session_id, location, user_agent)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

// ============================================================================
// Reads
// ============================================================================

pub const SONG_SELECT: &str = "
    SELECT s.song_id, a.artist_id
    FROM songs s JOIN artists a ON s.artist_id = a.artist_id
    WHERE s.title = ?1
      AND a.name = ?2
      AND s.duration = ?3
    ORDER BY s.song_id, a.artist_id";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_order_covers_every_table() {
        let mut created: Vec<&str> = CREATE_ORDER.iter().map(|t| t.name).collect();
        let mut dropped: Vec<&str> = DROP_ORDER.to_vec();
        created.sort();
        dropped.sort();
        assert_eq!(created, dropped);
    }

    #[test]
    fn test_fact_table_created_last_dropped_first() {
        assert_eq!(CREATE_ORDER.last().map(|t| t.name), Some("songplays"));
        assert_eq!(DROP_ORDER.first(), Some(&"songplays"));
    }
}
