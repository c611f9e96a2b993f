//! Discovery sources: where module descriptors come from.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::contracts::Module;
use crate::descriptor::{ManifestError, ModuleDescriptor};

/// One discovery problem. The affected item is skipped; discovery goes on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryIssue {
    pub location: String,
    pub kind: DiscoveryIssueKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryIssueKind {
    Unreadable(String),
    Malformed(String),
    Invalid(String),
    DuplicateId { id: String, locations: Vec<String> },
}

impl fmt::Display for DiscoveryIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DiscoveryIssueKind::Unreadable(e) => write!(f, "{}: unreadable ({e})", self.location),
            DiscoveryIssueKind::Malformed(e) => write!(f, "{}: malformed ({e})", self.location),
            DiscoveryIssueKind::Invalid(e) => write!(f, "{}: invalid ({e})", self.location),
            DiscoveryIssueKind::DuplicateId { id, locations } => {
                write!(f, "duplicate module id '{id}' in {}", locations.join(", "))
            }
        }
    }
}

impl DiscoveryIssue {
    fn from_manifest_error(location: &str, err: ManifestError) -> Self {
        let kind = match err {
            ManifestError::Malformed(e) => DiscoveryIssueKind::Malformed(e.to_string()),
            ManifestError::Invalid(e) => DiscoveryIssueKind::Invalid(e),
        };
        Self {
            location: location.to_string(),
            kind,
        }
    }
}

/// A whole source could not be read; this halts startup.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("module source '{source_name}' is not accessible at {}", path.display())]
    Unavailable {
        source_name: String,
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
}

pub type Discovered = Result<ModuleDescriptor, DiscoveryIssue>;

/// Enumerates modules physically available to the host.
pub trait ModuleSource: Send + Sync {
    fn name(&self) -> &str;

    /// Every item of the source, each either a descriptor or a per-item issue.
    fn scan(&self) -> Result<Vec<Discovered>, SourceError>;
}

/// Reads `*.json` manifests from a directory.
///
/// Files starting with `_` (such as `_exclude.json`) are not manifests.
/// A missing directory simply holds no modules.
#[derive(Debug, Clone)]
pub struct ManifestDirSource {
    dir: PathBuf,
}

impl ManifestDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn is_manifest(path: &Path) -> bool {
        let is_json = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let hidden = path
            .file_name()
            .and_then(|s| s.to_str())
            .is_some_and(|name| name.starts_with('_') || name.starts_with('.'));
        is_json && !hidden && path.is_file()
    }
}

impl ModuleSource for ManifestDirSource {
    fn name(&self) -> &str {
        "manifest-dir"
    }

    fn scan(&self) -> Result<Vec<Discovered>, SourceError> {
        if !self.dir.exists() {
            tracing::debug!(dir = %self.dir.display(), "Module directory does not exist");
            return Ok(Vec::new());
        }
        let unavailable = |error| SourceError::Unavailable {
            source_name: self.name().to_string(),
            path: self.dir.clone(),
            error,
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(unavailable)? {
            match entry {
                Ok(entry) => paths.push(entry.path()),
                Err(e) => tracing::warn!(dir = %self.dir.display(), error = %e, "Skipping unreadable directory entry"),
            }
        }
        paths.sort();

        let items = paths
            .into_iter()
            .filter(|p| Self::is_manifest(p))
            .map(|path| {
                let location = path.to_string_lossy().to_string();
                let raw = std::fs::read_to_string(&path).map_err(|e| DiscoveryIssue {
                    location: location.clone(),
                    kind: DiscoveryIssueKind::Unreadable(e.to_string()),
                })?;
                ModuleDescriptor::from_manifest_json(&raw, &location)
                    .map_err(|e| DiscoveryIssue::from_manifest_error(&location, e))
            })
            .collect();
        Ok(items)
    }
}

/// An explicit list of descriptors.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    descriptors: Vec<ModuleDescriptor>,
}

impl StaticSource {
    pub fn new(descriptors: impl IntoIterator<Item = ModuleDescriptor>) -> Self {
        Self {
            descriptors: descriptors.into_iter().collect(),
        }
    }
}

impl ModuleSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    fn scan(&self) -> Result<Vec<Discovered>, SourceError> {
        Ok(self
            .descriptors
            .iter()
            .cloned()
            .map(|d| match d.validate() {
                Ok(()) => Ok(d),
                Err(e) => Err(DiscoveryIssue::from_manifest_error(&d.location, e)),
            })
            .collect())
    }
}

/// Factory function type for compiled-in modules.
pub type FactoryFn = fn() -> anyhow::Result<Arc<dyn Module>>;

/// A module compiled into the host binary.
///
/// Submitted by module crates with `inventory::submit!`.
pub struct ModuleRegistration {
    pub descriptor: fn() -> ModuleDescriptor,
    pub factory: FactoryFn,
}

inventory::collect!(ModuleRegistration);

/// Modules registered through [`ModuleRegistration`].
#[derive(Debug, Clone, Copy, Default)]
pub struct InventorySource;

impl ModuleSource for InventorySource {
    fn name(&self) -> &str {
        "builtin"
    }

    fn scan(&self) -> Result<Vec<Discovered>, SourceError> {
        let mut items: Vec<Discovered> = ::inventory::iter::<ModuleRegistration>
            .into_iter()
            .map(|r| {
                let d = (r.descriptor)();
                match d.validate() {
                    Ok(()) => Ok(d),
                    Err(e) => Err(DiscoveryIssue::from_manifest_error(&d.location, e)),
                }
            })
            .collect();
        // inventory iteration order is link-order dependent
        items.sort_by(|a, b| location_of(a).cmp(location_of(b)));
        Ok(items)
    }
}

fn location_of(item: &Discovered) -> &str {
    match item {
        Ok(d) => &d.location,
        Err(issue) => &issue.location,
    }
}
