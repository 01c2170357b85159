//! Error types and the store health signal
//!
//! Storage problems never surface through the property accessors; they are
//! logged and recorded in a [`HealthMonitor`] that embedders can poll.

use parking_lot::RwLock;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for projmeta operations
#[derive(Error, Debug)]
pub enum CoreError {
    // ===================
    // IO Errors
    // ===================
    #[error("Failed to read file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory: {path}")]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to back up file to {path}")]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ===================
    // Parse Errors
    // ===================
    #[error("Failed to parse JSON in {path}: {message}")]
    JsonParse {
        path: PathBuf,
        message: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize document: {message}")]
    JsonSerialize { message: String },

    // ===================
    // Identity / Lifecycle
    // ===================
    #[error("Stored project id {raw:?} is not a valid UUID")]
    ProjectIdCorrupt {
        raw: String,
        #[source]
        source: uuid::Error,
    },

    #[error("Project has been disposed")]
    Disposed,

    #[error("Another application is already active: {active}")]
    ApplicationAlreadyActive { active: String },
}

/// A single recorded storage problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthIssue {
    /// Component that hit the problem, e.g. `settings.load`
    pub source: String,
    pub message: String,
}

/// Snapshot of a project's storage health
///
/// Property operations swallow storage errors by design; this is the
/// out-of-band signal that something was swallowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreHealth {
    /// No storage problems observed
    Healthy,
    /// Some loads fell back to empty state or some writes failed
    Degraded { issues: Vec<HealthIssue> },
}

impl StoreHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, StoreHealth::Healthy)
    }

    pub fn is_degraded(&self) -> bool {
        !self.is_healthy()
    }
}

/// Accumulates [`HealthIssue`]s from the stores and the flush worker
#[derive(Debug, Default)]
pub struct HealthMonitor {
    issues: RwLock<Vec<HealthIssue>>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a swallowed storage problem
    pub fn record(&self, source: impl Into<String>, message: impl Into<String>) {
        self.issues.write().push(HealthIssue {
            source: source.into(),
            message: message.into(),
        });
    }

    pub fn is_healthy(&self) -> bool {
        self.issues.read().is_empty()
    }

    pub fn snapshot(&self) -> StoreHealth {
        let issues = self.issues.read();
        if issues.is_empty() {
            StoreHealth::Healthy
        } else {
            StoreHealth::Degraded {
                issues: issues.clone(),
            }
        }
    }
}
