// error.rs — Error types for the store subsystem.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to open or create the database file.
    #[error("failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: rusqlite::Error,
    },

    /// Failed to create the parent directory for the database file.
    #[error("failed to create database directory {path}: {source}")]
    DirFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A SQL statement failed for a reason other than a missing table.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored timestamp column does not parse as RFC 3339.
    #[error("corrupt timestamp '{value}' in table {table}")]
    CorruptTimestamp { table: &'static str, value: String },

    /// Failed to serialize or deserialize a JSON detail column.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
