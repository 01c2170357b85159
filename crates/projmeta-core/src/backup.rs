//! Backup-before-overwrite step for the metadata writer
//!
//! The flush sequence copies the current document aside before opening the
//! target for writing, so a partial write can never destroy the only copy.
//! A backup failure aborts the whole flush.

use crate::error::CoreError;
use std::path::Path;
use tracing::debug;

/// Copy `file` to `backup` if it exists, replacing any previous backup.
///
/// Returns `true` if a backup was made, `false` if there was nothing to back
/// up. Absence of a prior file is not an error.
pub fn make_file_backup(file: &Path, backup: &Path) -> Result<bool, CoreError> {
    if !file.exists() {
        return Ok(false);
    }

    std::fs::copy(file, backup).map_err(|e| CoreError::Backup {
        path: backup.to_path_buf(),
        source: e,
    })?;

    debug!(file = %file.display(), backup = %backup.display(), "Backed up metadata file");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_backup_copies_content() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("data.json");
        let backup = dir.path().join("data.json.bak");
        std::fs::write(&file, "original").unwrap();

        assert!(make_file_backup(&file, &backup).unwrap());
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "original");
        // Source stays in place
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "original");
    }

    #[test]
    fn test_backup_replaces_previous_generation() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("data.json");
        let backup = dir.path().join("data.json.bak");

        std::fs::write(&file, "v1").unwrap();
        make_file_backup(&file, &backup).unwrap();

        std::fs::write(&file, "v2").unwrap();
        make_file_backup(&file, &backup).unwrap();

        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "v2");
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("absent.json");
        let backup = dir.path().join("absent.json.bak");

        assert!(!make_file_backup(&file, &backup).unwrap());
        assert!(!backup.exists());
    }
}
