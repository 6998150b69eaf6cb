//! Sparkify ETL library - shared modules for the loader and schema binaries.

pub mod config;
pub mod discover;
pub mod error;
pub mod load;
pub mod models;
pub mod parse;
pub mod progress;
pub mod resolve;
pub mod schema;
pub mod store;
pub mod time_dim;
