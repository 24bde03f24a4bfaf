//! Per-user key lifecycle.
//!
//! `KeyStore` hands out one stable key per user identity. Keys are cached in
//! memory for the lifetime of the store and mirrored to the durable key-value
//! store so they survive restarts without any server involvement.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use super::key::CryptoKey;
use crate::error::{OffnoteError, Result};
use crate::storage::KeyValueStore;

const KEY_STORAGE_PREFIX: &str = "offnote_key_";

/// Storage key holding the exported key material for `user_id`.
pub fn key_storage_key(user_id: &str) -> String {
    format!("{}{}", KEY_STORAGE_PREFIX, user_id)
}

/// Keyed cache of per-user encryption keys.
///
/// # Invariants
///
/// - At most one live key per user identity.
/// - A persisted record that cannot be imported is discarded and replaced,
///   never surfaced as an error.
/// - `forget` removes both the persisted record and the cached copy; data
///   encrypted under the old key becomes permanently undecryptable.
pub struct KeyStore {
    store: Arc<dyn KeyValueStore>,
    cache: Mutex<HashMap<String, CryptoKey>>,
}

impl KeyStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Return the key for `user_id`, loading or generating it as needed.
    ///
    /// # Errors
    ///
    /// - `OffnoteError::InvalidInput` for an empty user identity
    /// - `OffnoteError::CryptoUnavailable` if a key cannot be generated
    /// - Storage errors from the durable store (fatal)
    pub fn get_or_create_key(&self, user_id: &str) -> Result<CryptoKey> {
        validate_user_id(user_id)?;

        if let Some(key) = self.lock_cache()?.get(user_id) {
            return Ok(key.clone());
        }

        let storage_key = key_storage_key(user_id);
        if let Some(material) = self.store.get(&storage_key)? {
            match CryptoKey::from_material(&material) {
                Some(key) => {
                    debug!(user_id, "loaded persisted key");
                    let mut cache = self.lock_cache()?;
                    let live = cache.entry(user_id.to_string()).or_insert(key);
                    return Ok(live.clone());
                }
                None => {
                    warn!(user_id, "discarding malformed persisted key material");
                    self.store.remove(&storage_key)?;
                }
            }
        }

        // Another caller may have created the key while the store was read.
        // Generation and persistence happen under the cache lock so only one
        // key per user is ever written.
        let mut cache = self.lock_cache()?;
        if let Some(key) = cache.get(user_id) {
            debug!(user_id, "reusing key created during lookup");
            return Ok(key.clone());
        }
        let key = CryptoKey::generate()?;
        self.store.set(&storage_key, &key.to_material())?;
        cache.insert(user_id.to_string(), key.clone());
        info!(user_id, "generated new encryption key");
        Ok(key)
    }

    /// Delete the persisted key material and the cached key for `user_id`.
    pub fn forget(&self, user_id: &str) -> Result<()> {
        validate_user_id(user_id)?;
        self.store.remove(&key_storage_key(user_id))?;
        self.lock_cache()?.remove(user_id);
        info!(user_id, "forgot encryption key");
        Ok(())
    }

    /// Whether a key for `user_id` is currently held in memory.
    pub fn has_cached_key(&self, user_id: &str) -> bool {
        self.cache
            .lock()
            .map(|cache| cache.contains_key(user_id))
            .unwrap_or(false)
    }

    fn lock_cache(&self) -> Result<MutexGuard<'_, HashMap<String, CryptoKey>>> {
        self.cache
            .lock()
            .map_err(|_| OffnoteError::Storage("Key cache poisoned".to_string()))
    }
}

fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(OffnoteError::InvalidInput(
            "User identity cannot be empty".to_string(),
        ));
    }
    Ok(())
}
