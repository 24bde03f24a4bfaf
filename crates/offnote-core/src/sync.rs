//! Offline-first coordination between a remote note service and the mirror.
//!
//! Remote first, mirror as fallback: reads try the remote and refresh the
//! mirror on success; writes land in the mirror first so they survive an
//! outage. The core never talks to a remote except through this type.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{OffnoteError, Result};
use crate::mirror::{EncryptedMirror, Note};

/// The system of record for notes.
#[async_trait]
pub trait RemoteNotes: Send + Sync {
    async fn fetch_notes(&self, user_id: &str) -> Result<Vec<Note>>;

    async fn push_note(&self, user_id: &str, note: &Note) -> Result<()>;

    async fn delete_note(&self, user_id: &str, note_id: &str) -> Result<()>;
}

/// Where a `load` got its notes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Remote,
    /// The remote failed or timed out; these are the last mirrored notes
    Mirror,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loaded {
    pub notes: Vec<Note>,
    pub source: LoadSource,
}

/// Outcome of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Mirrored locally and accepted by the remote
    Synced,
    /// Mirrored locally only; the remote must be retried later
    Pending,
}

pub struct OfflineFirstNotes<R> {
    remote: R,
    mirror: EncryptedMirror,
    timeout: Option<Duration>,
}

impl<R: RemoteNotes> OfflineFirstNotes<R> {
    pub fn new(remote: R, mirror: EncryptedMirror) -> Self {
        Self {
            remote,
            mirror,
            timeout: Some(Duration::from_secs(30)),
        }
    }

    /// Bound every remote call; `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn mirror(&self) -> &EncryptedMirror {
        &self.mirror
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    async fn bounded<T>(&self, call: impl std::future::Future<Output = Result<T>>) -> Result<T> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| OffnoteError::Timeout(limit))?,
            None => call.await,
        }
    }

    /// Load the user's notes, preferring the remote.
    ///
    /// # Errors
    ///
    /// Remote failures never surface here. Mirror failures (key or storage
    /// unavailable) do.
    pub async fn load(&self, user_id: &str) -> Result<Loaded> {
        match self.bounded(self.remote.fetch_notes(user_id)).await {
            Ok(notes) => {
                self.mirror.save_notes(&notes, user_id)?;
                debug!(user_id, count = notes.len(), "loaded notes from remote");
                Ok(Loaded {
                    notes,
                    source: LoadSource::Remote,
                })
            }
            Err(err) => {
                warn!(user_id, error = %err, "remote unavailable, reading mirror");
                Ok(Loaded {
                    notes: self.mirror.load_notes(user_id)?,
                    source: LoadSource::Mirror,
                })
            }
        }
    }

    /// Save one note locally, then push it.
    pub async fn save(&self, user_id: &str, note: &Note) -> Result<SyncStatus> {
        self.mirror.save_note(note, user_id)?;
        match self.bounded(self.remote.push_note(user_id, note)).await {
            Ok(()) => Ok(SyncStatus::Synced),
            Err(err) => {
                warn!(user_id, note_id = %note.id, error = %err, "push failed, note kept locally");
                Ok(SyncStatus::Pending)
            }
        }
    }

    /// Delete one note locally, then remotely.
    pub async fn delete(&self, user_id: &str, note_id: &str) -> Result<SyncStatus> {
        self.mirror.delete_note(note_id, user_id)?;
        match self.bounded(self.remote.delete_note(user_id, note_id)).await {
            Ok(()) => Ok(SyncStatus::Synced),
            Err(err) => {
                warn!(user_id, note_id, error = %err, "remote delete failed");
                Ok(SyncStatus::Pending)
            }
        }
    }

    /// Erase everything held locally for the user.
    pub fn sign_out(&self, user_id: &str) -> Result<()> {
        self.mirror.clear_user_data(user_id)
    }
}
