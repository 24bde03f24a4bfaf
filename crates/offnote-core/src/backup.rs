//! Passphrase-encrypted export and import of a note collection.
//!
//! A backup is an age file (scrypt passphrase recipient) wrapping a JSON
//! document:
//!
//! ```json
//! { "format": "offnote-backup", "version": 1, "exportedAt": "...", "notes": [...] }
//! ```
//!
//! Unlike the mirror, a backup is meant to leave the device, so it is keyed by
//! a passphrase the user knows rather than by the per-user device key.

use std::io::{Read, Write};
use std::iter;
use std::path::Path;

use age::secrecy::SecretString;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{OffnoteError, Result};
use crate::fs::write_atomic;
use crate::mirror::Note;

pub const BACKUP_FORMAT: &str = "offnote-backup";
pub const BACKUP_VERSION: u32 = 1;

const MIN_PASSPHRASE_LENGTH: usize = 8;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupDocument {
    format: String,
    version: u32,
    exported_at: DateTime<Utc>,
    notes: Vec<Note>,
}

/// Reject passphrases that are empty or shorter than 8 characters.
pub fn validate_passphrase(passphrase: &str) -> Result<()> {
    if passphrase.trim().is_empty() {
        return Err(OffnoteError::InvalidInput(
            "Passphrase cannot be empty".to_string(),
        ));
    }
    if passphrase.chars().count() < MIN_PASSPHRASE_LENGTH {
        return Err(OffnoteError::InvalidInput(format!(
            "Passphrase must be at least {} characters",
            MIN_PASSPHRASE_LENGTH
        )));
    }
    Ok(())
}

fn encrypt(data: &[u8], passphrase: &str) -> Result<Vec<u8>> {
    let encryptor =
        age::Encryptor::with_user_passphrase(SecretString::from(passphrase.to_string()));

    let mut encrypted = Vec::new();
    let mut writer = encryptor
        .wrap_output(&mut encrypted)
        .map_err(|e| OffnoteError::Crypto(format!("Failed to create encryptor: {}", e)))?;
    writer
        .write_all(data)
        .map_err(|e| OffnoteError::Crypto(format!("Encryption write failed: {}", e)))?;
    writer
        .finish()
        .map_err(|e| OffnoteError::Crypto(format!("Encryption finish failed: {}", e)))?;

    Ok(encrypted)
}

fn decrypt(encrypted: &[u8], passphrase: &str) -> Result<Vec<u8>> {
    let decryptor = age::Decryptor::new(encrypted)
        .map_err(|e| OffnoteError::Backup(format!("Not an offnote backup: {}", e)))?;

    let identity = age::scrypt::Identity::new(SecretString::from(passphrase.to_string()));
    let mut reader = decryptor
        .decrypt(iter::once(&identity as &dyn age::Identity))
        .map_err(|e| match e {
            age::DecryptError::NoMatchingKeys
            | age::DecryptError::DecryptionFailed
            | age::DecryptError::KeyDecryptionFailed => OffnoteError::IncorrectPassphrase,
            _ => OffnoteError::Crypto(format!("Decryption failed: {}", e)),
        })?;

    let mut decrypted = Vec::new();
    reader
        .read_to_end(&mut decrypted)
        .map_err(|e| OffnoteError::Crypto(format!("Failed to read decrypted data: {}", e)))?;
    Ok(decrypted)
}

/// Serialize and encrypt `notes` under `passphrase`.
///
/// # Errors
///
/// `InvalidInput` for a weak passphrase, `Crypto` if encryption fails.
pub fn export_notes(notes: &[Note], passphrase: &str) -> Result<Vec<u8>> {
    validate_passphrase(passphrase)?;
    let document = BackupDocument {
        format: BACKUP_FORMAT.to_string(),
        version: BACKUP_VERSION,
        exported_at: Utc::now(),
        notes: notes.to_vec(),
    };
    let plaintext = serde_json::to_vec(&document)?;
    encrypt(&plaintext, passphrase)
}

/// Decrypt and parse a backup.
///
/// # Errors
///
/// - `IncorrectPassphrase` if `passphrase` does not open the file
/// - `Backup` if the file is not an age file or not a backup this build reads
pub fn import_notes(bytes: &[u8], passphrase: &str) -> Result<Vec<Note>> {
    let plaintext = decrypt(bytes, passphrase)?;
    let document: BackupDocument = serde_json::from_slice(&plaintext)
        .map_err(|e| OffnoteError::Backup(format!("Malformed backup document: {}", e)))?;

    if document.format != BACKUP_FORMAT {
        return Err(OffnoteError::Backup(format!(
            "Unexpected backup format '{}'",
            document.format
        )));
    }
    if document.version != BACKUP_VERSION {
        return Err(OffnoteError::Backup(format!(
            "Unsupported backup version {} (expected {})",
            document.version, BACKUP_VERSION
        )));
    }
    Ok(document.notes)
}

/// Export `notes` to `path`, replacing it atomically.
pub fn write_backup(path: &Path, notes: &[Note], passphrase: &str) -> Result<()> {
    let encrypted = export_notes(notes, passphrase)?;
    write_atomic(path, &encrypted)?;
    info!(path = %path.display(), count = notes.len(), "wrote backup");
    Ok(())
}

pub fn read_backup(path: &Path, passphrase: &str) -> Result<Vec<Note>> {
    let bytes = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            OffnoteError::NotFound(format!("Backup file not found: {}", path.display()))
        } else {
            OffnoteError::from(e)
        }
    })?;
    import_notes(&bytes, passphrase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PASSPHRASE: &str = "correct horse battery";

    #[test]
    fn test_export_import_round_trip() {
        let notes = vec![
            Note::new("a", "Groceries", "eggs"),
            Note::new("b", "Ideas", "offline first"),
        ];
        let encrypted = export_notes(&notes, PASSPHRASE).unwrap();
        assert!(!encrypted.windows(9).any(|w| w == b"Groceries"));

        assert_eq!(import_notes(&encrypted, PASSPHRASE).unwrap(), notes);
    }

    #[test]
    fn test_wrong_passphrase() {
        let encrypted = export_notes(&[Note::new("a", "A", "a")], PASSPHRASE).unwrap();
        let result = import_notes(&encrypted, "not the passphrase");
        assert!(matches!(result, Err(OffnoteError::IncorrectPassphrase)));
    }

    #[test]
    fn test_foreign_document_is_rejected() {
        let encrypted = encrypt(br#"{"hello":"world"}"#, PASSPHRASE).unwrap();
        assert!(matches!(
            import_notes(&encrypted, PASSPHRASE),
            Err(OffnoteError::Backup(_))
        ));
        assert!(matches!(
            import_notes(b"plain text", PASSPHRASE),
            Err(OffnoteError::Backup(_))
        ));
    }

    #[test]
    fn test_weak_passphrase_is_rejected() {
        assert!(matches!(
            export_notes(&[], "short"),
            Err(OffnoteError::InvalidInput(_))
        ));
        assert!(validate_passphrase("   ").is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("notes.age");

        write_backup(&path, &[Note::new("a", "A", "a")], PASSPHRASE).unwrap();
        let notes = read_backup(&path, PASSPHRASE).unwrap();

        assert_eq!(notes.len(), 1);
        assert!(matches!(
            read_backup(&dir.path().join("missing.age"), PASSPHRASE),
            Err(OffnoteError::NotFound(_))
        ));
    }
}
