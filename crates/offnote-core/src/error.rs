//! Error types for Offnote core operations.
//!
//! Only fatal conditions are represented here. Recoverable conditions
//! (decrypt failures, unparseable mirror payloads, cache misses, network
//! outages behind a cache) are turned into benign values by the component
//! that observes them and never surface as an `Err`.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for Offnote operations.
pub type Result<T> = std::result::Result<T, OffnoteError>;

/// Core error type for Offnote operations.
#[derive(Debug, Error)]
pub enum OffnoteError {
    /// The platform crypto primitive failed (no entropy, unsupported cipher).
    #[error("Crypto unavailable: {0}")]
    CryptoUnavailable(String),

    /// Encryption error
    #[error("Encryption error: {0}")]
    Crypto(String),

    /// Durable storage is unavailable or full
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQLite-specific storage error
    #[error("SQLite error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    /// A network fetch was rejected
    #[error("Network error: {0}")]
    Network(String),

    /// A network fetch did not complete within the configured bound
    #[error("Network request timed out after {0:?}")]
    Timeout(Duration),

    /// Illegal cache worker lifecycle transition
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    /// Incorrect passphrase while opening a backup
    #[error("Incorrect passphrase")]
    IncorrectPassphrase,

    /// Backup file is not in a format this build understands
    #[error("Backup error: {0}")]
    Backup(String),

    /// Generic resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl OffnoteError {
    /// Whether a cache policy may fall back to a cached copy for this error.
    pub fn is_network_failure(&self) -> bool {
        matches!(self, OffnoteError::Network(_) | OffnoteError::Timeout(_))
    }
}
