//! # Offnote Core
//!
//! Offline support for a notes application: an encrypted on-device mirror of
//! each user's notes and a versioned request cache that keeps the app usable
//! without a network.
//!
//! ## Architecture
//!
//! - **storage**: durable string key-value stores
//! - **crypto**: per-user AES-256-GCM keys and the key store
//! - **mirror**: the encrypted note mirror
//! - **cache**: request interception, cache generations and worker lifecycle
//! - **sync**: offline-first coordination with a remote note service
//! - **backup**: passphrase-encrypted export and import
//! - **notification**: push payloads and their navigation targets

pub mod backup;
pub mod cache;
pub mod crypto;
pub mod error;
pub mod fs;
pub mod mirror;
pub mod notification;
pub mod storage;
pub mod sync;

pub use crypto::{CryptoKey, KeyStore};
pub use error::{OffnoteError, Result};
pub use mirror::{Decrypted, EncryptedBlob, EncryptedMirror, Note};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore};
pub use sync::{LoadSource, Loaded, OfflineFirstNotes, RemoteNotes, SyncStatus};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
