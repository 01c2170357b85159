//! Scalar project settings backed by `project-settings.json`
//!
//! A flat, ordered name → scalar map, loaded lazily on first access and
//! rewritten in full after every mutation. Writes are rare and small, so
//! this store trades throughput for simplicity and persists synchronously,
//! unlike the debounced resource cache.

use crate::error::{CoreError, HealthMonitor};
use crate::event::{EventBus, StoreEvent};
use crate::layout::ProjectLayout;
use crate::value::PropertyValue;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

type SettingsMap = BTreeMap<String, PropertyValue>;

/// Lazily-loaded scalar property store
pub struct SettingsStore {
    layout: ProjectLayout,
    in_memory: bool,
    health: Arc<HealthMonitor>,
    events: EventBus,
    properties: Mutex<Option<SettingsMap>>,
}

impl SettingsStore {
    pub(crate) fn new(
        layout: ProjectLayout,
        in_memory: bool,
        health: Arc<HealthMonitor>,
        events: EventBus,
    ) -> Self {
        Self {
            layout,
            in_memory,
            health,
            events,
            properties: Mutex::new(None),
        }
    }

    /// Look up a property, loading the settings file on first access.
    ///
    /// Never fails: a corrupt settings file degrades to an empty map.
    pub fn get(&self, name: &str) -> Option<PropertyValue> {
        let mut slot = self.properties.lock();
        let props = slot.get_or_insert_with(|| self.load_from_disk());
        props.get(name).cloned()
    }

    /// Set or remove (`None`) a property and persist the whole map.
    ///
    /// In-memory projects accept the mutation but skip the write.
    pub fn set(&self, name: &str, value: Option<PropertyValue>) {
        let mut slot = self.properties.lock();
        let props = slot.get_or_insert_with(|| self.load_from_disk());
        match value {
            Some(value) => {
                props.insert(name.to_string(), value);
            }
            None => {
                props.remove(name);
            }
        }
        self.save(props);
    }

    /// Defensive copy of the current property map
    pub fn snapshot(&self) -> SettingsMap {
        let mut slot = self.properties.lock();
        slot.get_or_insert_with(|| self.load_from_disk()).clone()
    }

    fn load_from_disk(&self) -> SettingsMap {
        if self.in_memory {
            return SettingsMap::new();
        }

        let path = self.layout.settings_file();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No settings file yet");
                return SettingsMap::new();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read project settings");
                self.health.record("settings.load", e.to_string());
                return SettingsMap::new();
            }
        };
        if content.trim().is_empty() {
            return SettingsMap::new();
        }

        match serde_json::from_str::<SettingsMap>(&content) {
            Ok(props) => {
                debug!(path = %path.display(), count = props.len(), "Loaded project settings");
                props
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to parse project settings, starting empty");
                self.health.record("settings.load", e.to_string());
                SettingsMap::new()
            }
        }
    }

    fn save(&self, props: &SettingsMap) {
        if self.in_memory {
            return;
        }

        if let Err(e) = self.write_settings_file(props) {
            warn!(error = %e, "Failed to write project settings");
            self.health.record("settings.save", e.to_string());
            return;
        }
        self.events.publish(StoreEvent::SettingsSaved);
    }

    fn write_settings_file(&self, props: &SettingsMap) -> Result<(), CoreError> {
        self.layout.ensure_metadata_dir()?;
        let path = self.layout.settings_file();
        let content =
            serde_json::to_string_pretty(props).map_err(|e| CoreError::JsonSerialize {
                message: e.to_string(),
            })?;
        std::fs::write(&path, content).map_err(|e| CoreError::FileWrite {
            path: path.clone(),
            source: e,
        })?;
        debug!(path = %path.display(), count = props.len(), "Saved project settings");
        Ok(())
    }
}
