//! Error types for glance-store.

use std::path::PathBuf;

/// Result type for glance-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in glance-store.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Database error from SQLite (includes "file is not a database").
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create the directory holding the store file.
    #[error("Failed to create store directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A stored row could not be turned back into a reading.
    #[error("Corrupt stored reading: {0}")]
    Decode(#[from] glance_types::ParseError),

    /// The file was written by a newer version of this crate.
    #[error("Unsupported store schema version {found} (supported up to {supported})")]
    UnsupportedSchema { found: i32, supported: i32 },
}
