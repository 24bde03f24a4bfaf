//! Self-describing ciphertext units.
//!
//! Layout: `base64(nonce[12] || ciphertext || tag[16])`, standard alphabet,
//! so the blob fits a string-only store.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::crypto::{self, CryptoKey, NONCE_LEN};
use crate::error::Result;

/// Text-encoded nonce + AEAD ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBlob(String);

impl EncryptedBlob {
    /// Encrypt `plaintext` under `key` with a freshly drawn nonce.
    pub fn seal(key: &CryptoKey, plaintext: &[u8]) -> Result<Self> {
        let nonce = crypto::generate_nonce()?;
        let ciphertext = crypto::seal(key, &nonce, plaintext)?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);
        Ok(Self(STANDARD.encode(combined)))
    }

    /// Wrap stored text without validating it.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// The nonce prefix, if the blob is well-formed enough to carry one.
    pub fn nonce(&self) -> Option<[u8; NONCE_LEN]> {
        let raw = STANDARD.decode(self.0.as_bytes()).ok()?;
        raw.get(..NONCE_LEN)?.try_into().ok()
    }

    /// Decrypt under `key`.
    ///
    /// Returns `None` for anything that is not a valid blob for this key:
    /// bad encoding, truncated input, failed authentication, non-UTF-8 plaintext.
    pub fn open(&self, key: &CryptoKey) -> Option<String> {
        let raw = STANDARD.decode(self.0.as_bytes()).ok()?;
        if raw.len() < NONCE_LEN {
            return None;
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let nonce: [u8; NONCE_LEN] = nonce.try_into().ok()?;
        let plaintext = crypto::open(key, &nonce, ciphertext).ok()?;
        String::from_utf8(plaintext).ok()
    }
}

impl std::fmt::Display for EncryptedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
