use std::sync::Arc;

use dashmap::DashMap;

use crate::contracts::Module;
use crate::sources::ModuleRegistration;

/// Instantiates one module.
pub type ModuleFactory = Arc<dyn Fn() -> anyhow::Result<Arc<dyn Module>> + Send + Sync>;

/// Entry name → factory.
///
/// Descriptors refer to factories through their `entry` field, so a
/// manifest on disk can activate code that is compiled into the host.
#[derive(Default, Clone)]
pub struct FactoryCatalog {
    factories: Arc<DashMap<String, ModuleFactory>>,
}

impl std::fmt::Debug for FactoryCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut entries: Vec<String> = self.factories.iter().map(|e| e.key().clone()).collect();
        entries.sort();
        f.debug_struct("FactoryCatalog").field("entries", &entries).finish()
    }
}

impl FactoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-filled with every compiled-in [`ModuleRegistration`].
    pub fn from_inventory() -> Self {
        let catalog = Self::new();
        for r in ::inventory::iter::<ModuleRegistration> {
            let entry = (r.descriptor)().entry;
            let factory = r.factory;
            catalog.register(entry, move || factory());
        }
        catalog
    }

    /// Register (or replace) the factory for `entry`.
    pub fn register<F>(&self, entry: impl Into<String>, factory: F)
    where
        F: Fn() -> anyhow::Result<Arc<dyn Module>> + Send + Sync + 'static,
    {
        let entry = entry.into();
        if self.factories.insert(entry.clone(), Arc::new(factory)).is_some() {
            tracing::debug!(%entry, "Replaced module factory");
        }
    }

    pub fn get(&self, entry: &str) -> Option<ModuleFactory> {
        self.factories.get(entry).map(|f| f.value().clone())
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.factories.contains_key(entry)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
