//! Error types for the ETL library.
//!
//! Binaries wrap these in `anyhow`; library code returns them directly.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EtlError>;

/// A source record that cannot become a typed record.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` has the wrong shape, expected {expected}")]
    WrongShape {
        field: &'static str,
        expected: &'static str,
    },

    #[error("timestamp {0} ms is outside the representable range")]
    TimestampOutOfRange(i64),
}

#[derive(Debug, Error)]
pub enum EtlError {
    /// Also covers a `ts` that cannot be turned into a time row.
    #[error("{}:{line}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: ParseError,
    },

    #[error("failed to write {table} row: {source}")]
    DimensionWrite {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to write songplay row: {0}")]
    FactWrite(#[source] rusqlite::Error),

    #[error("catalog lookup failed: {0}")]
    Lookup(#[source] rusqlite::Error),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to scan {}: {source}", .path.display())]
    Discover {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "config {}: `{key}` is a database-server option and does not apply to the SQLite warehouse; set `database` to the file path instead",
        .path.display()
    )]
    ServerOption { path: PathBuf, key: &'static str },

    #[error("invalid config {}: {source}", .path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
