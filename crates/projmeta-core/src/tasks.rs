//! Per-project task manager
//!
//! Thin collaborator owned by the project facade: an append-only list of
//! task records. Task execution and semantics live in the surrounding
//! application.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

/// One registered task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub id: Uuid,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

/// Task list belonging to one project
pub struct TaskManager {
    project_name: String,
    tasks: RwLock<Vec<TaskRecord>>,
}

impl TaskManager {
    pub(crate) fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            tasks: RwLock::new(Vec::new()),
        }
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Register a new task and return its record
    pub fn create_task(&self, label: impl Into<String>) -> TaskRecord {
        let record = TaskRecord {
            id: Uuid::new_v4(),
            label: label.into(),
            created_at: Utc::now(),
        };
        self.tasks.write().push(record.clone());
        record
    }

    pub fn tasks(&self) -> Vec<TaskRecord> {
        self.tasks.read().clone()
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }
}
