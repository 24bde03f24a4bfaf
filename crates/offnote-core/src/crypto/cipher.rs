//! AES-256-GCM cipher operations.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;

use super::key::CryptoKey;
use crate::error::{OffnoteError, Result};

/// Nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// Authentication tag appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// Draw a fresh random nonce from the OS CSPRNG.
///
/// Uniqueness is probabilistic: nonces are never tracked, a collision under
/// one key is treated as negligible.
pub fn generate_nonce() -> Result<[u8; NONCE_LEN]> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|e| OffnoteError::CryptoUnavailable(format!("Nonce generation failed: {}", e)))?;
    Ok(nonce)
}

/// Encrypt plaintext with AES-256-GCM.
///
/// Returns ciphertext with appended authentication tag (16 bytes).
pub fn seal(key: &CryptoKey, nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| OffnoteError::CryptoUnavailable(e.to_string()))?;

    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| OffnoteError::Crypto("AES-GCM encryption failed".to_string()))
}

/// Decrypt ciphertext with AES-256-GCM.
///
/// The ciphertext must include the authentication tag at the end. Any
/// failure (wrong key, tampered bytes, truncated input) is reported as
/// `OffnoteError::Crypto`; callers decide whether that is fatal.
pub fn open(key: &CryptoKey, nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| OffnoteError::CryptoUnavailable(e.to_string()))?;

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| OffnoteError::Crypto("AES-GCM decryption failed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> CryptoKey {
        CryptoKey::from_bytes([byte; 32])
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let nonce = [1u8; NONCE_LEN];
        let ciphertext = seal(&key(42), &nonce, b"Hello, World!").unwrap();
        let decrypted = open(&key(42), &nonce, &ciphertext).unwrap();
        assert_eq!(decrypted, b"Hello, World!");
    }

    #[test]
    fn test_ciphertext_carries_tag() {
        let nonce = [1u8; NONCE_LEN];
        let ciphertext = seal(&key(42), &nonce, b"Hello, World!").unwrap();
        assert_eq!(ciphertext.len(), b"Hello, World!".len() + TAG_LEN);
    }

    #[test]
    fn test_open_wrong_key_fails() {
        let nonce = [1u8; NONCE_LEN];
        let ciphertext = seal(&key(42), &nonce, b"Secret data").unwrap();
        let result = open(&key(99), &nonce, &ciphertext);
        assert!(matches!(result, Err(OffnoteError::Crypto(_))));
    }

    #[test]
    fn test_open_tampered_ciphertext_fails() {
        let nonce = [1u8; NONCE_LEN];
        let mut ciphertext = seal(&key(42), &nonce, b"Secret data").unwrap();
        ciphertext[0] ^= 0xFF;
        assert!(open(&key(42), &nonce, &ciphertext).is_err());
    }

    #[test]
    fn test_generate_nonce_is_random() {
        let nonce1 = generate_nonce().unwrap();
        let nonce2 = generate_nonce().unwrap();
        assert_ne!(nonce1, nonce2);
    }
}
