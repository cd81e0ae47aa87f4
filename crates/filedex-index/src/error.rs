//! Error types for the index store and search.

use std::path::PathBuf;

use filedex_core::{QueryError, ScanError};
use thiserror::Error;

/// Errors raised by the index store, search and rebuild pipeline.
#[derive(Debug, Error)]
pub enum IndexError {
    /// SQLite failure. Any open rebuild transaction has been rolled back.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Filesystem failure around the database file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Another rebuild holds the store.
    #[error("A rebuild is already in progress")]
    RebuildInProgress,

    /// The rebuild was cancelled; the previous index is unchanged.
    #[error("Rebuild cancelled")]
    Cancelled,

    /// The search term was rejected.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Scanning a root failed.
    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// Result alias for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;
