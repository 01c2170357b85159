//! Resource property cache backed by `project-metadata.json`
//!
//! Maps project-relative resource paths to small scalar property maps. The
//! document is loaded once per project instance; after that the in-memory
//! map is the source of truth and disk is only a checkpoint, rewritten
//! out-of-band by the sync worker. Mutators report whether they changed
//! observable content so the facade can schedule a debounced flush —
//! no-op writes must not touch the disk.
//!
//! Document shape:
//!
//! ```json
//! { "resources": { "<path>": { "<name>": <scalar>, ... }, ... } }
//! ```
//!
//! Unrecognized top-level fields are tolerated and dropped on the next
//! flush. An entry for a path exists only while its property map is
//! non-empty; empty maps are pruned immediately on mutation and during load.

use crate::backup::make_file_backup;
use crate::error::{CoreError, HealthMonitor};
use crate::event::{EventBus, StoreEvent};
use crate::layout::ProjectLayout;
use crate::value::PropertyValue;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

type PropertyMap = BTreeMap<String, PropertyValue>;
type ResourceMap = BTreeMap<String, PropertyMap>;

#[derive(Debug, Default, Deserialize)]
struct MetadataDocument {
    #[serde(default)]
    resources: ResourceMap,
}

#[derive(Serialize)]
struct MetadataDocumentRef<'a> {
    resources: &'a ResourceMap,
}

/// Result of one flush attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing to write and no document on disk
    Skipped,
    /// Document written, after backing up any previous generation
    Written { resources: usize },
}

/// Lazily-loaded cache of per-resource property maps
pub struct ResourcePropertyCache {
    layout: ProjectLayout,
    in_memory: bool,
    health: Arc<HealthMonitor>,
    events: EventBus,
    resources: Mutex<Option<ResourceMap>>,
}

impl ResourcePropertyCache {
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
            resources: Mutex::new(None),
        }
    }

    /// Look up one property of one resource
    pub fn get_property(&self, path: &str, name: &str) -> Option<PropertyValue> {
        let mut slot = self.resources.lock();
        let resources = self.ensure_loaded(&mut slot);
        resources.get(path).and_then(|props| props.get(name)).cloned()
    }

    /// All properties of one resource, or `None` if the path has none cached
    pub fn get_properties(&self, path: &str) -> Option<PropertyMap> {
        let mut slot = self.resources.lock();
        let resources = self.ensure_loaded(&mut slot);
        resources.get(path).cloned()
    }

    /// Defensive deep copy of the whole cache
    pub fn all_properties(&self) -> ResourceMap {
        let mut slot = self.resources.lock();
        self.ensure_loaded(&mut slot).clone()
    }

    /// Set (`Some`) or remove (`None`) one property.
    ///
    /// Removing the last property drops the whole path entry. Returns `true`
    /// only when observable content changed: setting an equal value or
    /// removing an absent key reports `false` and must not cause a flush.
    pub fn set_property(&self, path: &str, name: &str, value: Option<PropertyValue>) -> bool {
        let mut slot = self.resources.lock();
        let resources = self.ensure_loaded(&mut slot);
        match value {
            None => {
                let Some(props) = resources.get_mut(path) else {
                    // No props and no new value
                    return false;
                };
                if props.remove(name).is_none() {
                    return false;
                }
                if props.is_empty() {
                    resources.remove(path);
                }
                true
            }
            Some(value) => {
                let props = resources.entry(path.to_string()).or_default();
                if props.get(name) == Some(&value) {
                    return false;
                }
                props.insert(name.to_string(), value);
                true
            }
        }
    }

    /// Bulk-merge properties for one resource.
    ///
    /// `None` entries delete, others upsert; comparison is by value. Returns
    /// `true` if any entry actually changed, so a changed call maps to
    /// exactly one flush request.
    pub fn set_properties(
        &self,
        path: &str,
        props: BTreeMap<String, Option<PropertyValue>>,
    ) -> bool {
        let mut slot = self.resources.lock();
        let resources = self.ensure_loaded(&mut slot);

        let mut changed = false;
        let entry = resources.entry(path.to_string()).or_default();
        for (name, value) in props {
            match value {
                None => {
                    if entry.remove(&name).is_some() {
                        changed = true;
                    }
                }
                Some(value) => {
                    if entry.get(&name) != Some(&value) {
                        entry.insert(name, value);
                        changed = true;
                    }
                }
            }
        }
        // Prune the entry if the merge emptied it (or never filled it)
        if entry.is_empty() {
            resources.remove(path);
        }
        changed
    }

    /// Drop a deleted resource's entry. Only touches an already-loaded
    /// cache; returns `true` if an entry was removed.
    pub fn remove_path(&self, path: &str) -> bool {
        let mut slot = self.resources.lock();
        match slot.as_mut() {
            Some(resources) => resources.remove(path).is_some(),
            None => false,
        }
    }

    /// Move a renamed resource's entry. Only touches an already-loaded
    /// cache; returns `true` if an entry moved.
    pub fn rename_path(&self, old_path: &str, new_path: &str) -> bool {
        let mut slot = self.resources.lock();
        let Some(resources) = slot.as_mut() else {
            return false;
        };
        match resources.remove(old_path) {
            Some(props) => {
                resources.insert(new_path.to_string(), props);
                true
            }
            None => false,
        }
    }

    /// Serialize a consistent snapshot and write it out, backing up any
    /// existing document first.
    ///
    /// Invoked only from the sync worker, never inline on a mutator. The
    /// cache lock is held for the snapshot-and-serialize step only; a failure
    /// anywhere leaves the in-memory cache untouched.
    pub(crate) fn flush_to_disk(&self) -> Result<FlushOutcome, CoreError> {
        if self.in_memory {
            return Ok(FlushOutcome::Skipped);
        }

        let md_file = self.layout.metadata_file();
        let snapshot = {
            let slot = self.resources.lock();
            let empty = ResourceMap::new();
            let resources = slot.as_ref().unwrap_or(&empty);
            if resources.is_empty() && !md_file.exists() {
                // Nothing to save and no document to supersede
                return Ok(FlushOutcome::Skipped);
            }
            let content = serde_json::to_string_pretty(&MetadataDocumentRef { resources })
                .map_err(|e| CoreError::JsonSerialize {
                    message: e.to_string(),
                })?;
            (content, resources.len())
        };
        let (content, count) = snapshot;

        make_file_backup(&md_file, &self.layout.metadata_backup_file())?;
        self.layout.ensure_metadata_dir()?;
        std::fs::write(&md_file, content).map_err(|e| CoreError::FileWrite {
            path: md_file.clone(),
            source: e,
        })?;

        debug!(path = %md_file.display(), resources = count, "Flushed resource metadata");
        Ok(FlushOutcome::Written { resources: count })
    }

    fn ensure_loaded<'a>(&self, slot: &'a mut Option<ResourceMap>) -> &'a mut ResourceMap {
        slot.get_or_insert_with(|| self.load_from_disk())
    }

    fn load_from_disk(&self) -> ResourceMap {
        if self.in_memory {
            return ResourceMap::new();
        }

        let path = self.layout.metadata_file();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No metadata file yet");
                return ResourceMap::new();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read resource metadata");
                self.health.record("metadata.load", e.to_string());
                return ResourceMap::new();
            }
        };
        if content.trim().is_empty() {
            return ResourceMap::new();
        }

        match serde_json::from_str::<MetadataDocument>(&content) {
            Ok(document) => {
                let mut resources = document.resources;
                // Entries that parse to an empty property map are dropped
                resources.retain(|_, props| !props.is_empty());
                debug!(path = %path.display(), resources = resources.len(), "Loaded resource metadata");
                self.events.publish(StoreEvent::MetadataLoaded {
                    resources: resources.len(),
                });
                resources
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to parse resource metadata, starting empty");
                self.health.record("metadata.load", e.to_string());
                ResourceMap::new()
            }
        }
    }
}
