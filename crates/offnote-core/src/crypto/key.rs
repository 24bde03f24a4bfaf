//! Per-user symmetric key material.
//!
//! A `CryptoKey` is 256 bits of CSPRNG output used with AES-256-GCM. Its raw
//! bytes are exported as standard base64 for the string-only key-value store
//! and validated on import.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::error::{OffnoteError, Result};

/// Length of a key in bytes (32 bytes = 256 bits for AES-256-GCM).
pub const KEY_LENGTH: usize = 32;

/// A symmetric encryption key owned by the key store.
///
/// Key bytes are zeroized from memory when the last copy is dropped.
#[derive(Clone, ZeroizeOnDrop)]
pub struct CryptoKey {
    key: [u8; KEY_LENGTH],
}

impl CryptoKey {
    /// Generate a fresh key from the operating system CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns `OffnoteError::CryptoUnavailable` if the entropy source fails.
    pub fn generate() -> Result<Self> {
        let mut key = [0u8; KEY_LENGTH];
        OsRng
            .try_fill_bytes(&mut key)
            .map_err(|e| OffnoteError::CryptoUnavailable(format!("Key generation failed: {}", e)))?;
        Ok(Self { key })
    }

    /// Create a key from raw bytes.
    ///
    /// # Security
    ///
    /// The caller is responsible for ensuring the bytes come from a secure source.
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self { key: bytes }
    }

    /// Import exported key material.
    ///
    /// Returns `None` when the material is not valid base64 or does not decode
    /// to exactly `KEY_LENGTH` bytes. Malformed material is never trusted.
    pub fn from_material(material: &str) -> Option<Self> {
        let decoded = Zeroizing::new(STANDARD.decode(material.trim().as_bytes()).ok()?);
        let bytes: [u8; KEY_LENGTH] = decoded.as_slice().try_into().ok()?;
        Some(Self { key: bytes })
    }

    /// Export the raw key bytes as base64 for persistence.
    pub fn to_material(&self) -> Zeroizing<String> {
        Zeroizing::new(STANDARD.encode(self.key))
    }

    /// Get a reference to the raw key bytes.
    ///
    /// # Security
    ///
    /// Avoid storing or logging this value. Use only for immediate encryption operations.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl std::fmt::Debug for CryptoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_differ() {
        let key1 = CryptoKey::generate().unwrap();
        let key2 = CryptoKey::generate().unwrap();
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_material_round_trip() {
        let key = CryptoKey::generate().unwrap();
        let material = key.to_material();
        let restored = CryptoKey::from_material(&material).unwrap();
        assert_eq!(key.as_bytes(), restored.as_bytes());
    }

    #[test]
    fn test_malformed_material_rejected() {
        assert!(CryptoKey::from_material("not base64 !!").is_none());
        assert!(CryptoKey::from_material("").is_none());
        // Valid base64, wrong length (16 bytes).
        let short = STANDARD.encode([7u8; 16]);
        assert!(CryptoKey::from_material(&short).is_none());
        let long = STANDARD.encode([7u8; 33]);
        assert!(CryptoKey::from_material(&long).is_none());
    }

    #[test]
    fn test_debug_redacts() {
        let key = CryptoKey::from_bytes([0xAB; KEY_LENGTH]);
        let debug_output = format!("{:?}", key);
        assert!(debug_output.contains("REDACTED"));
        assert!(!debug_output.contains(&hex::encode(&key.as_bytes()[..4])));
    }
}
