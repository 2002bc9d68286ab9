//! Storage error types.
//!
//! Every storage failure is recoverable from the guard's point of view:
//! logout still navigates away even if cleanup or broadcast fails.

use thiserror::Error;

/// Errors that can occur while reading or writing a key-value store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store is disabled or cannot be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The write exceeded the store's capacity.
    #[error("storage quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The backing file could not be read or written.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file holds data that is not a JSON object of strings.
    #[error("storage data is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// Returns true if the store itself could not be used.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "check that storage is enabled for this origin",
            Self::QuotaExceeded(_) => "free some stored data for this origin",
            Self::Io(_) => "check permissions of the state directory",
            Self::Serialization(_) => "delete the corrupt state file; it is recreated on next write",
        }
    }
}
