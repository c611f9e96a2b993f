use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;
use thiserror::Error;

use crate::descriptor::{Dependency, ModuleDescriptor};
use crate::sources::{Discovered, DiscoveryIssue, DiscoveryIssueKind, ModuleSource, SourceError};

/// Every module physically available to the host, keyed by id.
///
/// This is the source of truth for "what could be loaded". Items that could
/// not be described, and ids claimed by more than one item, are kept out and
/// recorded as [`DiscoveryIssue`]s.
#[derive(Default, Clone)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, Arc<ModuleDescriptor>>,
    duplicates: BTreeMap<String, Vec<String>>,
    issues: Vec<DiscoveryIssue>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .field("duplicates", &self.duplicates.keys().collect::<Vec<_>>())
            .field("issues", &self.issues.len())
            .finish()
    }
}

impl ModuleRegistry {
    /// Scan all sources and build the registry.
    ///
    /// Fails only when a source as a whole is inaccessible.
    pub fn discover(sources: &[Arc<dyn ModuleSource>]) -> Result<Self, RegistryError> {
        let mut b = RegistryBuilder::default();
        for source in sources {
            let items = source.scan()?;
            tracing::debug!(source = source.name(), items = items.len(), "Scanned module source");
            for item in items {
                b.add(item);
            }
        }
        Ok(b.build())
    }

    /// Registry over an explicit descriptor list (no sources involved).
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = ModuleDescriptor>) -> Self {
        let mut b = RegistryBuilder::default();
        for d in descriptors {
            b.add(d.validate().map(|()| d.clone()).map_err(|e| DiscoveryIssue {
                location: d.location.clone(),
                kind: DiscoveryIssueKind::Invalid(e.to_string()),
            }));
        }
        b.build()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<ModuleDescriptor>> {
        self.modules.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    /// Discovered ids, ascending.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<ModuleDescriptor>> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn issues(&self) -> &[DiscoveryIssue] {
        &self.issues
    }

    /// Ids excluded because several items claimed them, with their locations.
    pub fn duplicate_ids(&self) -> &BTreeMap<String, Vec<String>> {
        &self.duplicates
    }

    /// Ids a dependency refers to: the exact id, or every id the `regex:`
    /// pattern matches. Unknown ids yield nothing.
    pub fn matching(&self, dependency: &Dependency) -> Vec<&str> {
        match dependency.pattern() {
            Some(pattern) => match Regex::new(pattern) {
                Ok(rx) => self.ids().filter(|id| rx.is_match(id)).collect(),
                Err(_) => Vec::new(),
            },
            None => self
                .modules
                .get_key_value(&dependency.name)
                .map(|(k, _)| vec![k.as_str()])
                .unwrap_or_default(),
        }
    }

    /// Environment variables requested by modules. On collisions the module
    /// with the smallest id wins.
    pub fn environment_vars(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        for d in self.modules.values() {
            for (name, init) in &d.environment {
                vars.entry(name.clone()).or_insert_with(|| init.clone());
            }
        }
        vars
    }
}

/// Collects discovered items; ids are checked for uniqueness at build time.
#[derive(Default)]
pub struct RegistryBuilder {
    seen: BTreeMap<String, Vec<ModuleDescriptor>>,
    issues: Vec<DiscoveryIssue>,
}

impl RegistryBuilder {
    pub fn add(&mut self, item: Discovered) {
        match item {
            Ok(d) => self.seen.entry(d.id.clone()).or_default().push(d),
            Err(issue) => {
                tracing::warn!(%issue, "Module discovery issue");
                self.issues.push(issue);
            }
        }
    }

    pub fn build(mut self) -> ModuleRegistry {
        let mut modules = BTreeMap::new();
        let mut duplicates = BTreeMap::new();

        for (id, mut copies) in self.seen {
            if copies.len() == 1 {
                if let Some(d) = copies.pop() {
                    modules.insert(id, Arc::new(d));
                }
                continue;
            }
            let locations: Vec<String> = copies.into_iter().map(|d| d.location).collect();
            let issue = DiscoveryIssue {
                location: locations.join(", "),
                kind: DiscoveryIssueKind::DuplicateId {
                    id: id.clone(),
                    locations: locations.clone(),
                },
            };
            tracing::warn!(%issue, "Module discovery issue");
            self.issues.push(issue);
            duplicates.insert(id, locations);
        }

        tracing::info!(
            modules = ?modules.keys().collect::<Vec<_>>(),
            issues = self.issues.len(),
            "Module discovery finished"
        );

        ModuleRegistry {
            modules,
            duplicates,
            issues: self.issues,
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    SourceUnavailable(#[from] SourceError),
}
