//! Run configuration.
//!
//! Built-in defaults, optionally overlaid by a TOML file. The binary applies
//! environment variables and flags on top of that.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Connection options of a database server. The warehouse is a single file.
pub const SERVER_OPTIONS: &[&str] = &["host", "port", "dbname", "user", "password", "sslmode"];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EtlConfig {
    /// SQLite database file holding the warehouse.
    pub database: PathBuf,
    /// Root of the song-metadata tree.
    pub song_data: PathBuf,
    /// Root of the event-log tree.
    pub log_data: PathBuf,
    /// Record a failed file and keep going instead of aborting the run.
    pub continue_on_error: bool,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("sparkify.sqlite3"),
            song_data: PathBuf::from("data/song_data"),
            log_data: PathBuf::from("data/log_data"),
            continue_on_error: false,
        }
    }
}

impl EtlConfig {
    pub fn from_toml_str(path: &Path, text: &str) -> Result<Self, ConfigError> {
        let toml_err = |source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        };
        let table: toml::Table = toml::from_str(text).map_err(toml_err)?;
        if let Some(key) = SERVER_OPTIONS.iter().find(|key| table.contains_key(**key)) {
            return Err(ConfigError::ServerOption {
                path: path.to_path_buf(),
                key: *key,
            });
        }
        toml::from_str(text).map_err(toml_err)
    }

    /// Load a TOML config file. Keys left out keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(path, &text)
    }
}
