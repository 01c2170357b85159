//! Project lifecycle facade
//!
//! A [`Project`] owns one scalar settings store, one resource property
//! cache and one flush worker, plus lazily-created collaborators (secure
//! storage handle, data-source registry, task manager). It exposes the
//! stable project UUID and the in-memory vs. persisted mode, and is the
//! only entry point the surrounding application talks to.

use crate::context::{ApplicationContext, SecureStorage};
use crate::error::{CoreError, HealthMonitor, StoreHealth};
use crate::event::EventBus;
use crate::layout::{ProjectLayout, PROP_PROJECT_ID};
use crate::metadata::ResourcePropertyCache;
use crate::registry::DataSourceRegistry;
use crate::settings::SettingsStore;
use crate::sync::{SyncConfig, SyncScheduler};
use crate::tasks::TaskManager;
use crate::value::PropertyValue;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Storage format of the project tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectFormat {
    /// Not yet determined, or corrupted
    #[default]
    Unknown,
    /// Tree predates the metadata-directory layout
    Legacy,
    /// Current layout with a `.projmeta` directory
    Modern,
}

/// What to do when the persisted project id fails to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdRecoveryPolicy {
    /// Surface [`CoreError::ProjectIdCorrupt`] to the caller
    #[default]
    Fail,
    /// Log, generate a fresh id and persist it over the corrupt one
    Regenerate,
}

/// Per-project configuration
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub sync: SyncConfig,
    /// Suffix of the fixed-name backup written before metadata overwrites
    pub backup_suffix: String,
    pub id_recovery: IdRecoveryPolicy,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            sync: SyncConfig::default(),
            backup_suffix: crate::layout::DEFAULT_BACKUP_SUFFIX.to_string(),
            id_recovery: IdRecoveryPolicy::default(),
        }
    }
}

/// A persistent identity unit owning the property stores
pub struct Project {
    context: Arc<ApplicationContext>,
    name: String,
    layout: ProjectLayout,
    config: ProjectConfig,
    in_memory: bool,
    format: RwLock<ProjectFormat>,
    health: Arc<HealthMonitor>,
    events: EventBus,
    settings: SettingsStore,
    metadata: Arc<ResourcePropertyCache>,
    scheduler: Option<SyncScheduler>,
    secure_storage: OnceCell<SecureStorage>,
    registry: OnceCell<Arc<DataSourceRegistry>>,
    task_manager: OnceCell<Arc<TaskManager>>,
    project_id: OnceCell<Uuid>,
    disposed: AtomicBool,
}

impl Project {
    /// Open a persisted project rooted at `root`.
    ///
    /// Spawns the background flush worker, so this must be called within a
    /// Tokio runtime.
    pub fn open(
        context: Arc<ApplicationContext>,
        name: impl Into<String>,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self::open_with_config(context, name, root, ProjectConfig::default())
    }

    /// [`open`](Self::open) with explicit configuration
    pub fn open_with_config(
        context: Arc<ApplicationContext>,
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        config: ProjectConfig,
    ) -> Self {
        Self::build(context, name.into(), root.into(), config, false)
    }

    /// Create an ephemeral project that never touches disk
    pub fn in_memory(context: Arc<ApplicationContext>, name: impl Into<String>) -> Self {
        Self::build(
            context,
            name.into(),
            PathBuf::new(),
            ProjectConfig::default(),
            true,
        )
    }

    fn build(
        context: Arc<ApplicationContext>,
        name: String,
        root: PathBuf,
        config: ProjectConfig,
        in_memory: bool,
    ) -> Self {
        let layout = ProjectLayout::new(root).with_backup_suffix(config.backup_suffix.clone());
        let health = Arc::new(HealthMonitor::new());
        let events = EventBus::default_capacity();

        let settings = SettingsStore::new(
            layout.clone(),
            in_memory,
            Arc::clone(&health),
            events.clone(),
        );
        let metadata = Arc::new(ResourcePropertyCache::new(
            layout.clone(),
            in_memory,
            Arc::clone(&health),
            events.clone(),
        ));
        let scheduler = if in_memory {
            None
        } else {
            Some(SyncScheduler::start(
                Arc::clone(&metadata),
                events.clone(),
                Arc::clone(&health),
                config.sync.clone(),
            ))
        };

        let format = if in_memory {
            ProjectFormat::Unknown
        } else {
            ProjectFormat::Modern
        };

        debug!(project = %name, root = %layout.root().display(), in_memory, "Project opened");

        Self {
            context,
            name,
            layout,
            config,
            in_memory,
            format: RwLock::new(format),
            health,
            events,
            settings,
            metadata,
            scheduler,
            secure_storage: OnceCell::new(),
            registry: OnceCell::new(),
            task_manager: OnceCell::new(),
            project_id: OnceCell::new(),
            disposed: AtomicBool::new(false),
        }
    }

    ////////////////////////////////////////////////////////
    // Identity & lifecycle

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn context(&self) -> &Arc<ApplicationContext> {
        &self.context
    }

    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }

    pub fn format(&self) -> ProjectFormat {
        *self.format.read()
    }

    pub fn set_format(&self, format: ProjectFormat) {
        *self.format.write() = format;
    }

    pub fn is_modern_project(&self) -> bool {
        self.format() == ProjectFormat::Modern
    }

    /// Stable project UUID, generated once and persisted under the scalar
    /// property key `"id"`.
    ///
    /// The result is memoized for the lifetime of this instance. A stored
    /// value that is not a valid UUID is handled per
    /// [`ProjectConfig::id_recovery`].
    pub fn project_id(&self) -> Result<Uuid, CoreError> {
        self.project_id
            .get_or_try_init(|| {
                let stored = self
                    .settings
                    .get(PROP_PROJECT_ID)
                    .filter(|v| !v.is_null())
                    .map(|v| v.to_string())
                    .filter(|raw| !raw.is_empty());
                match stored {
                    None => Ok(self.generate_project_id()),
                    Some(raw) => match Uuid::parse_str(&raw) {
                        Ok(id) => Ok(id),
                        Err(e) => match self.config.id_recovery {
                            IdRecoveryPolicy::Fail => {
                                error!(project = %self.name, raw = %raw, "Stored project id is not a valid UUID");
                                Err(CoreError::ProjectIdCorrupt { raw, source: e })
                            }
                            IdRecoveryPolicy::Regenerate => {
                                warn!(project = %self.name, raw = %raw, "Stored project id is not a valid UUID, regenerating");
                                Ok(self.generate_project_id())
                            }
                        },
                    },
                }
            })
            .copied()
    }

    fn generate_project_id(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.settings.set(
            PROP_PROJECT_ID,
            Some(PropertyValue::String(id.to_string())),
        );
        id
    }

    /// Storage health of this project; property operations swallow storage
    /// errors, this is where they surface.
    pub fn health(&self) -> StoreHealth {
        self.health.snapshot()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    /// Metadata directory of this project, optionally created
    pub fn metadata_folder(&self, create: bool) -> PathBuf {
        if create {
            if let Err(e) = self.layout.ensure_metadata_dir() {
                error!(project = %self.name, error = %e, "Error creating metadata folder");
            }
        }
        self.layout.metadata_dir()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Stop accepting flush work and release owned collaborators.
    ///
    /// Best-effort: a pending or in-flight flush is allowed to complete.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(scheduler) = &self.scheduler {
            scheduler.dispose();
        }
        if let Some(registry) = self.registry.get() {
            registry.dispose();
        }
        debug!(project = %self.name, "Project disposed");
    }

    ////////////////////////////////////////////////////////
    // Lazily-created collaborators

    /// Secure-storage handle for this project, created on first use
    pub fn secure_storage(&self) -> &SecureStorage {
        self.secure_storage
            .get_or_init(|| self.context.project_secure_storage(&self.layout))
    }

    pub fn is_registry_loaded(&self) -> bool {
        self.registry.get().is_some()
    }

    /// Data-source registry, created on first use
    pub fn data_source_registry(&self) -> Arc<DataSourceRegistry> {
        Arc::clone(
            self.registry
                .get_or_init(|| Arc::new(DataSourceRegistry::new(self.name.clone()))),
        )
    }

    /// Task manager, created on first use
    pub fn task_manager(&self) -> Arc<TaskManager> {
        Arc::clone(
            self.task_manager
                .get_or_init(|| Arc::new(TaskManager::new(self.name.clone()))),
        )
    }

    ////////////////////////////////////////////////////////
    // Scalar project properties

    pub fn get_project_property(&self, name: &str) -> Option<PropertyValue> {
        self.settings.get(name)
    }

    /// Set (`Some`) or remove (`None`) a scalar property; the settings file
    /// is rewritten synchronously.
    pub fn set_project_property(&self, name: &str, value: Option<PropertyValue>) {
        self.settings.set(name, value);
    }

    /// Defensive copy of all scalar properties
    pub fn project_properties(&self) -> BTreeMap<String, PropertyValue> {
        self.settings.snapshot()
    }

    ////////////////////////////////////////////////////////
    // Resource properties

    pub fn get_resource_property(&self, resource: &str, name: &str) -> Option<PropertyValue> {
        self.metadata.get_property(resource, name)
    }

    pub fn get_resource_properties(
        &self,
        resource: &str,
    ) -> Option<BTreeMap<String, PropertyValue>> {
        self.metadata.get_properties(resource)
    }

    /// Defensive deep copy of the whole resource property cache
    pub fn all_resource_properties(&self) -> BTreeMap<String, BTreeMap<String, PropertyValue>> {
        self.metadata.all_properties()
    }

    /// Set (`Some`) or remove (`None`) one resource property. Schedules a
    /// debounced flush only when observable content changed.
    pub fn set_resource_property(&self, resource: &str, name: &str, value: Option<PropertyValue>) {
        if self.metadata.set_property(resource, name, value) {
            self.flush_metadata();
        }
    }

    /// Bulk-merge resource properties; `None` entries delete. At most one
    /// flush is scheduled per changed call.
    pub fn set_resource_properties(
        &self,
        resource: &str,
        props: BTreeMap<String, Option<PropertyValue>>,
    ) {
        if self.metadata.set_properties(resource, props) {
            self.flush_metadata();
        }
    }

    /// Lifecycle hook: the resource was deleted
    pub fn remove_resource_from_cache(&self, path: &str) {
        if self.metadata.remove_path(path) {
            self.flush_metadata();
        }
    }

    /// Lifecycle hook: the resource moved from `old_path` to `new_path`
    pub fn update_resource_cache(&self, old_path: &str, new_path: &str) {
        if self.metadata.rename_path(old_path, new_path) {
            self.flush_metadata();
        }
    }

    fn flush_metadata(&self) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }
        if let Some(scheduler) = &self.scheduler {
            scheduler.mark_dirty();
        }
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        self.dispose();
    }
}
