//! Application context and per-project secure storage handles
//!
//! Replaces a process-wide application singleton with an explicit value
//! passed to [`Project::new`](crate::project::Project). "Exactly one active
//! application" stays a runtime-checked invariant via [`register_active`].
//!
//! [`register_active`]: ApplicationContext::register_active

use crate::error::CoreError;
use crate::layout::ProjectLayout;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

static ACTIVE_APPLICATION: OnceCell<String> = OnceCell::new();

/// Host-application description handed to every project
#[derive(Debug, Clone)]
pub struct ApplicationContext {
    app_id: String,
    headless: bool,
    standalone: bool,
    product_properties: HashMap<String, String>,
}

impl ApplicationContext {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            headless: false,
            standalone: true,
            product_properties: HashMap::new(),
        }
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_standalone(mut self, standalone: bool) -> Self {
        self.standalone = standalone;
        self
    }

    pub fn with_product_property(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.product_properties.insert(name.into(), value.into());
        self
    }

    /// Claim the process-wide active-application slot.
    ///
    /// Idempotent for the same `app_id`; a second application with a
    /// different id gets an error instead of silently coexisting.
    pub fn register_active(&self) -> Result<(), CoreError> {
        let active = ACTIVE_APPLICATION.get_or_init(|| self.app_id.clone());
        if *active == self.app_id {
            Ok(())
        } else {
            Err(CoreError::ApplicationAlreadyActive {
                active: active.clone(),
            })
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn is_headless(&self) -> bool {
        self.headless
    }

    pub fn is_standalone(&self) -> bool {
        self.standalone
    }

    pub fn product_property(&self, name: &str) -> Option<&str> {
        self.product_properties.get(name).map(String::as_str)
    }

    /// Product feature flags are properties named `feature.<name>`
    pub fn has_product_feature(&self, feature: &str) -> bool {
        self.product_property(&format!("feature.{}", feature))
            .map(|v| v == "true")
            .unwrap_or(false)
    }

    /// Manufacture the secure-storage handle for one project
    pub fn project_secure_storage(&self, layout: &ProjectLayout) -> SecureStorage {
        let dir = layout.metadata_dir().join("security");
        debug!(app = %self.app_id, dir = %dir.display(), "Creating project secure storage handle");
        SecureStorage { dir }
    }
}

/// Handle to a project's credential storage location.
///
/// The store treats credentials as an external concern; only the handle and
/// its location belong to this crate.
#[derive(Debug, Clone)]
pub struct SecureStorage {
    dir: PathBuf,
}

impl SecureStorage {
    pub fn storage_dir(&self) -> &Path {
        &self.dir
    }
}
