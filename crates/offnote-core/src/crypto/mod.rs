//! Cryptographic operations for Offnote.
//!
//! - **AES-256-GCM**: authenticated encryption of the local note mirror
//! - **KeyStore**: one random 256-bit key per user identity, persisted in the
//!   durable key-value store
//!
//! ## Threat Model
//!
//! We defend against:
//! - Reading note contents out of a copied storage file without the key record
//! - Recovering notes after sign-out (the key record is deleted)
//!
//! We do NOT defend against:
//! - An attacker who can read the key-value store (key and data live together)
//! - Compromised OS / access to process memory

pub mod cipher;
pub mod key;
pub mod keystore;

pub use cipher::{generate_nonce, open, seal, NONCE_LEN};
pub use key::{CryptoKey, KEY_LENGTH};
pub use keystore::{key_storage_key, KeyStore};
