//! On-disk layout of a project's metadata directory
//!
//! Every persisted artifact lives under `<root>/.projmeta/`:
//! `project-settings.json`, `project-metadata.json` and the fixed-name
//! backup written before each metadata overwrite.

use crate::error::CoreError;
use std::path::{Path, PathBuf};

/// Directory under the project root holding all persisted metadata
pub const METADATA_FOLDER: &str = ".projmeta";

/// Flat JSON object of scalar project properties
pub const SETTINGS_STORAGE_FILE: &str = "project-settings.json";

/// JSON document with the `"resources"` property map
pub const METADATA_STORAGE_FILE: &str = "project-metadata.json";

/// Scalar property key holding the persistent project UUID
pub const PROP_PROJECT_ID: &str = "id";

/// Default extension appended to the metadata file name for backups
pub const DEFAULT_BACKUP_SUFFIX: &str = "bak";

/// Resolves paths inside a project's metadata directory
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
    backup_suffix: String,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
        }
    }

    /// Override the backup file suffix (retention policy hook)
    pub fn with_backup_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.backup_suffix = suffix.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join(METADATA_FOLDER)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.metadata_dir().join(SETTINGS_STORAGE_FILE)
    }

    pub fn metadata_file(&self) -> PathBuf {
        self.metadata_dir().join(METADATA_STORAGE_FILE)
    }

    pub fn metadata_backup_file(&self) -> PathBuf {
        self.metadata_dir()
            .join(format!("{}.{}", METADATA_STORAGE_FILE, self.backup_suffix))
    }

    /// Create the metadata directory if missing and return its path
    pub fn ensure_metadata_dir(&self) -> Result<PathBuf, CoreError> {
        let dir = self.metadata_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| CoreError::DirectoryCreate {
                path: dir.clone(),
                source: e,
            })?;
        }
        Ok(dir)
    }
}
