//! Durable key-value store trait definition.
//!
//! The `KeyValueStore` trait is the only persistence the key store and the
//! note mirror depend on. It mirrors a string-only, synchronous store: no
//! transactions, no size guarantee, last write wins.

use crate::error::Result;

/// String-keyed, string-valued durable storage.
///
/// All implementations must ensure:
/// - Each individual `get`/`set`/`remove` is atomic on its own
/// - `set` fully replaces any previous value for the key
/// - Failures (storage full, backend unavailable) are returned as errors and
///   are fatal to the caller; no retry happens at this layer
///
/// Multi-step sequences (read, modify, write) are *not* serialized by the
/// store. Callers that need that must serialize externally.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trait_is_object_safe() {
        fn _accepts_dyn(_store: &dyn KeyValueStore) {}
    }
}
