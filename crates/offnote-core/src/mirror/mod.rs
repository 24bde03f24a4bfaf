//! Encrypted local mirror of a user's notes.
//!
//! The mirror is a best-effort offline cache, never the system of record. The
//! whole collection is stored as one encrypted blob per user and rewritten on
//! every save.
//!
//! ## Failure model
//!
//! - A blob that does not decrypt (rotated key, corruption, data written
//!   before encryption existed) yields `Decrypted::Fallback` with the input
//!   unchanged.
//! - A decrypted payload that does not parse yields an empty collection.
//! - Key generation and storage failures are fatal and propagate.
//!
//! ## Concurrency
//!
//! `save_note` and `delete_note` are read-modify-write sequences with no
//! mutual exclusion. Two overlapping calls for the same user can interleave
//! and the later full-collection write wins, dropping the other caller's
//! change. Callers that need multi-writer safety must serialize externally.

pub mod blob;
pub mod types;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::crypto::KeyStore;
use crate::error::Result;
use crate::storage::KeyValueStore;

pub use blob::EncryptedBlob;
pub use types::Note;

const NOTES_STORAGE_PREFIX: &str = "offnote_notes_";

/// Storage key for a user's encrypted note collection.
pub fn notes_storage_key(user_id: &str) -> String {
    format!("{}{}", NOTES_STORAGE_PREFIX, user_id)
}

/// Storage key for the companion last-write timestamp.
pub fn timestamp_storage_key(user_id: &str) -> String {
    format!("{}{}_updated", NOTES_STORAGE_PREFIX, user_id)
}

/// Outcome of a decrypt attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decrypted {
    /// The blob authenticated and decrypted under the user's current key.
    Plaintext(String),
    /// Decryption failed; the original input is passed through unchanged.
    Fallback(String),
}

impl Decrypted {
    /// The decrypted text, or the original input on fallback.
    pub fn into_inner(self) -> String {
        match self {
            Decrypted::Plaintext(text) | Decrypted::Fallback(text) => text,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Decrypted::Fallback(_))
    }

    /// The plaintext, only if decryption actually succeeded.
    pub fn plaintext(&self) -> Option<&str> {
        match self {
            Decrypted::Plaintext(text) => Some(text),
            Decrypted::Fallback(_) => None,
        }
    }
}

/// Durable, encrypted copy of each user's note collection.
#[derive(Clone)]
pub struct EncryptedMirror {
    store: Arc<dyn KeyValueStore>,
    keys: Arc<KeyStore>,
}

impl EncryptedMirror {
    pub fn new(store: Arc<dyn KeyValueStore>, keys: Arc<KeyStore>) -> Self {
        Self { store, keys }
    }

    /// Build a mirror with its own key store over `store`.
    pub fn with_store(store: Arc<dyn KeyValueStore>) -> Self {
        let keys = Arc::new(KeyStore::new(Arc::clone(&store)));
        Self::new(store, keys)
    }

    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    /// Encrypt `plaintext` under the user's key.
    pub fn encrypt(&self, plaintext: &str, user_id: &str) -> Result<EncryptedBlob> {
        let key = self.keys.get_or_create_key(user_id)?;
        EncryptedBlob::seal(&key, plaintext.as_bytes())
    }

    /// Decrypt a stored blob.
    ///
    /// Never fails on bad input: anything that does not decrypt under the
    /// user's current key comes back as `Decrypted::Fallback(blob)`. Only a
    /// failure to obtain the key itself propagates.
    pub fn decrypt(&self, blob: &str, user_id: &str) -> Result<Decrypted> {
        let key = self.keys.get_or_create_key(user_id)?;
        match EncryptedBlob::from_text(blob).open(&key) {
            Some(plaintext) => Ok(Decrypted::Plaintext(plaintext)),
            None => {
                debug!(user_id, "decrypt failed, passing input through");
                Ok(Decrypted::Fallback(blob.to_string()))
            }
        }
    }

    /// Replace the user's mirrored collection with `notes`.
    pub fn save_notes(&self, notes: &[Note], user_id: &str) -> Result<()> {
        let serialized = serde_json::to_string(notes)?;
        let blob = self.encrypt(&serialized, user_id)?;
        self.store.set(&notes_storage_key(user_id), blob.as_str())?;
        self.store.set(
            &timestamp_storage_key(user_id),
            &Utc::now().timestamp_millis().to_string(),
        )?;
        debug!(user_id, count = notes.len(), "saved note mirror");
        Ok(())
    }

    /// Load the user's mirrored collection.
    ///
    /// Returns an empty vector when nothing was saved yet or when the stored
    /// payload is unusable.
    pub fn load_notes(&self, user_id: &str) -> Result<Vec<Note>> {
        let Some(stored) = self.store.get(&notes_storage_key(user_id))? else {
            return Ok(Vec::new());
        };

        let decrypted = self.decrypt(&stored, user_id)?;
        let was_fallback = decrypted.is_fallback();
        match serde_json::from_str::<Vec<Note>>(&decrypted.into_inner()) {
            Ok(notes) => {
                if was_fallback {
                    debug!(user_id, "loaded unencrypted legacy mirror");
                }
                Ok(notes)
            }
            Err(err) => {
                warn!(user_id, error = %err, "note mirror is unusable, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    /// Look up a single mirrored note.
    pub fn get_note(&self, note_id: &str, user_id: &str) -> Result<Option<Note>> {
        Ok(self
            .load_notes(user_id)?
            .into_iter()
            .find(|note| note.id == note_id))
    }

    /// Upsert one note: replace by id in place, or insert at the front.
    pub fn save_note(&self, note: &Note, user_id: &str) -> Result<()> {
        let mut notes = self.load_notes(user_id)?;
        match notes.iter_mut().find(|existing| existing.id == note.id) {
            Some(existing) => *existing = note.clone(),
            None => notes.insert(0, note.clone()),
        }
        self.save_notes(&notes, user_id)
    }

    /// Remove one note by id. Removing an unknown id rewrites the collection unchanged.
    pub fn delete_note(&self, note_id: &str, user_id: &str) -> Result<()> {
        let mut notes = self.load_notes(user_id)?;
        notes.retain(|note| note.id != note_id);
        self.save_notes(&notes, user_id)
    }

    /// Erase the mirror, its timestamp and the user's key.
    pub fn clear_user_data(&self, user_id: &str) -> Result<()> {
        self.store.remove(&notes_storage_key(user_id))?;
        self.store.remove(&timestamp_storage_key(user_id))?;
        self.keys.forget(user_id)
    }

    /// Time of the last successful `save_notes`, or the Unix epoch if none.
    pub fn last_sync_time(&self, user_id: &str) -> Result<DateTime<Utc>> {
        let stamp = self
            .store
            .get(&timestamp_storage_key(user_id))?
            .and_then(|value| value.trim().parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis);
        Ok(stamp.unwrap_or(DateTime::UNIX_EPOCH))
    }
}
