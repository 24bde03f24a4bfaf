//! Filesystem helpers for writing backup files atomically.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{OffnoteError, Result};

/// Write `data` to `path` via a sibling temp file and a rename.
///
/// Readers observe either the previous file or the complete new one, never a
/// partially written file. Parent directories are created as needed.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| {
        OffnoteError::Storage(format!(
            "Failed to create directory {}: {}",
            parent.display(),
            e
        ))
    })?;

    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| OffnoteError::InvalidInput(format!("Invalid file path: {}", path.display())))?;
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| OffnoteError::Storage(format!("System time error: {}", e)))?
        .as_nanos();
    let temp_path = parent.join(format!(".{}.{}.tmp", filename, nanos));

    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .map_err(|e| OffnoteError::Storage(format!("Temp file create failed: {}", e)))?;
    discard_on_error(&temp_path, write_and_sync(file, data))?;

    rename_with_fallback(&temp_path, path)
        .map_err(|e| OffnoteError::Storage(format!("Atomic rename failed: {}", e)))
}

fn write_and_sync(mut file: File, data: &[u8]) -> Result<()> {
    file.write_all(data)
        .map_err(|e| OffnoteError::Storage(format!("Temp file write failed: {}", e)))?;
    file.sync_all()
        .map_err(|e| OffnoteError::Storage(format!("Temp file sync failed: {}", e)))
}

/// Remove the temp file when `result` failed, then pass `result` through.
fn discard_on_error<T>(temp_path: &Path, result: Result<T>) -> Result<T> {
    if result.is_err() {
        let _ = fs::remove_file(temp_path);
    }
    result
}

/// Rename a file, removing the destination first on platforms where rename
/// refuses to overwrite. The temp file is cleaned up if both attempts fail.
pub fn rename_with_fallback(temp_path: &Path, destination: &Path) -> io::Result<()> {
    if let Err(initial_err) = fs::rename(temp_path, destination) {
        let _ = fs::remove_file(destination);
        fs::rename(temp_path, destination).map_err(|retry_err| {
            let _ = fs::remove_file(temp_path);
            io::Error::new(
                retry_err.kind(),
                format!(
                    "Atomic rename failed (initial: {}, retry: {})",
                    initial_err, retry_err
                ),
            )
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_atomic_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("nested").join("backup.age");

        write_atomic(&dest, b"payload").unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"payload");
    }

    #[test]
    fn test_failed_temp_write_removes_temp_file() {
        let dir = tempdir().unwrap();
        let temp = dir.path().join(".backup.age.1.tmp");
        fs::write(&temp, b"partial").unwrap();

        let failed: Result<()> = Err(OffnoteError::Storage("disk full".to_string()));
        assert!(discard_on_error(&temp, failed).is_err());
        assert!(!temp.exists());

        fs::write(&temp, b"complete").unwrap();
        discard_on_error(&temp, Ok(())).unwrap();
        assert!(temp.exists());
    }

    #[test]
    fn test_write_atomic_replaces_existing_and_leaves_no_temp() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("backup.age");
        fs::write(&dest, b"old").unwrap();

        write_atomic(&dest, b"new").unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"new");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
