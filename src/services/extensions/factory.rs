//! Extension Factories
//!
//! Static id -> constructor registry. The host instantiates configured
//! extensions through it instead of loading code from arbitrary paths.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::services::extensions::models::Extension;
use crate::utils::error::{HostError, HostResult};

/// Constructor for one extension.
pub type ExtensionFactory = Arc<dyn Fn() -> Arc<dyn Extension> + Send + Sync>;

/// Registry of extension constructors compiled into the host.
#[derive(Default, Clone)]
pub struct ExtensionFactoryRegistry {
    factories: BTreeMap<String, ExtensionFactory>,
}

impl std::fmt::Debug for ExtensionFactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionFactoryRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

impl ExtensionFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constructor. Replaces any constructor with the same id.
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Extension> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Arc::new(factory));
    }

    /// Builder-style `register`.
    pub fn with<F>(mut self, id: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Extension> + Send + Sync + 'static,
    {
        self.register(id, factory);
        self
    }

    /// Construct the extension registered under `id`.
    pub fn create(&self, id: &str) -> HostResult<Arc<dyn Extension>> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| HostError::not_found(format!("No factory for extension: {}", id)))?;
        let extension = factory();

        let name = extension.metadata().name;
        if name != id {
            return Err(HostError::validation(format!(
                "Factory '{}' produced extension named '{}'",
                id, name
            )));
        }
        Ok(extension)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
