//! Error types for bglink-store.

use std::path::PathBuf;

/// Result type for bglink-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in bglink-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Reading that cannot be stored.
    #[error("Invalid reading: {0}")]
    InvalidReading(String),

    /// Settings (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
