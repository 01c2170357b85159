//! Per-project data-source registry
//!
//! The store does not manage connections; it only owns the registry's
//! lifecycle (lazy creation, disposal with the project). Descriptors are
//! opaque connection metadata for the surrounding application.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Connection metadata for one registered data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceDescriptor {
    pub id: String,
    pub name: String,
    pub driver: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Registry of the data sources belonging to one project
pub struct DataSourceRegistry {
    project_name: String,
    data_sources: RwLock<BTreeMap<String, DataSourceDescriptor>>,
}

impl DataSourceRegistry {
    pub(crate) fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            data_sources: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register or replace a descriptor, returning the previous one
    pub fn register(&self, descriptor: DataSourceDescriptor) -> Option<DataSourceDescriptor> {
        self.data_sources
            .write()
            .insert(descriptor.id.clone(), descriptor)
    }

    pub fn data_source(&self, id: &str) -> Option<DataSourceDescriptor> {
        self.data_sources.read().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> bool {
        self.data_sources.write().remove(id).is_some()
    }

    pub fn data_sources(&self) -> Vec<DataSourceDescriptor> {
        self.data_sources.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.data_sources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_sources.read().is_empty()
    }

    pub(crate) fn dispose(&self) {
        let count = {
            let mut guard = self.data_sources.write();
            let count = guard.len();
            guard.clear();
            count
        };
        debug!(project = %self.project_name, count, "Data source registry disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str) -> DataSourceDescriptor {
        DataSourceDescriptor {
            id: id.to_string(),
            name: format!("source {}", id),
            driver: "postgres".to_string(),
            url: Some("postgres://localhost/db".to_string()),
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = DataSourceRegistry::new("demo");
        assert!(registry.is_empty());

        assert!(registry.register(descriptor("ds1")).is_none());
        assert!(registry.register(descriptor("ds2")).is_none());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.data_source("ds1"), Some(descriptor("ds1")));
        assert_eq!(registry.data_source("nope"), None);
    }

    #[test]
    fn test_replace_returns_previous() {
        let registry = DataSourceRegistry::new("demo");
        registry.register(descriptor("ds1"));

        let mut updated = descriptor("ds1");
        updated.name = "renamed".to_string();
        let previous = registry.register(updated.clone());
        assert_eq!(previous, Some(descriptor("ds1")));
        assert_eq!(registry.data_source("ds1"), Some(updated));
    }

    #[test]
    fn test_dispose_clears() {
        let registry = DataSourceRegistry::new("demo");
        registry.register(descriptor("ds1"));
        registry.dispose();
        assert!(registry.is_empty());
    }
}
