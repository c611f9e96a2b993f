//! Activation policy: which discovered modules take part in this run.
//!
//! The persisted configuration is the `_exclude.json`-style record
//! `{"modules": [{"id": "..."}]}`. Without a `"mode"` key the listed ids are
//! excluded; `"mode"` selects one of the other two behaviours.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::ModuleRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationMode {
    #[default]
    IncludeAll,
    ExcludeListed,
    IncludeOnlyListed,
}

/// Why a module is not part of the ordered activation set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    ExcludedByPolicy,
    NotInAllowList,
    DuplicateId,
    MissingDependency {
        dependency: String,
    },
    OutdatedDependency {
        dependency: String,
        required: Version,
        found: Version,
    },
    CircularDependency {
        cycle: Vec<String>,
    },
    Conflict {
        with: String,
    },
    /// Switched off by an active module it allows to do so.
    Suppressed {
        by: String,
    },
}

impl RejectReason {
    /// Stable, machine-comparable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::ExcludedByPolicy => "excluded by policy",
            RejectReason::NotInAllowList => "not in allow-list",
            RejectReason::DuplicateId => "duplicate id",
            RejectReason::MissingDependency { .. } => "missing dependency",
            RejectReason::OutdatedDependency { .. } => "outdated dependency",
            RejectReason::CircularDependency { .. } => "circular dependency",
            RejectReason::Conflict { .. } => "conflict",
            RejectReason::Suppressed { .. } => "suppressed",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MissingDependency { dependency } => {
                write!(f, "{} '{dependency}'", self.code())
            }
            RejectReason::OutdatedDependency {
                dependency,
                required,
                found,
            } => write!(
                f,
                "{} '{dependency}' (requires >= {required}, found {found})",
                self.code()
            ),
            RejectReason::CircularDependency { cycle } => {
                write!(f, "{} ({})", self.code(), cycle.join(" -> "))
            }
            RejectReason::Conflict { with } => write!(f, "{} with '{with}'", self.code()),
            RejectReason::Suppressed { by } => write!(f, "{} by '{by}'", self.code()),
            _ => f.write_str(self.code()),
        }
    }
}

/// Inclusion/exclusion configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActivationConfig {
    pub mode: ActivationMode,
    /// Ordered, de-duplicated ids the mode applies to.
    pub list: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ActivationFileError {
    #[error("cannot read activation file {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse activation file {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Unknown keys and entries without an id are ignored.
#[derive(Debug, Deserialize)]
struct ActivationFile {
    #[serde(default)]
    mode: Option<ActivationMode>,
    #[serde(default)]
    modules: Vec<ListedModule>,
}

#[derive(Debug, Deserialize)]
struct ListedModule {
    #[serde(default)]
    id: String,
}

impl ActivationConfig {
    pub fn include_all() -> Self {
        Self::default()
    }

    pub fn exclude_listed<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_mode(ActivationMode::ExcludeListed, ids)
    }

    pub fn include_only_listed<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_mode(ActivationMode::IncludeOnlyListed, ids)
    }

    pub fn with_mode<I, S>(mode: ActivationMode, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = BTreeSet::new();
        let list = ids
            .into_iter()
            .map(Into::into)
            .filter(|id: &String| seen.insert(id.clone()))
            .collect();
        Self { mode, list }
    }

    /// Parse the persisted JSON record.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let file: ActivationFile = serde_json::from_str(raw)?;
        let ids = file.modules.into_iter().enumerate().filter_map(|(index, m)| {
            let id = m.id.trim();
            if id.is_empty() {
                tracing::warn!(index, "Activation entry without a module id skipped");
                return None;
            }
            Some(id.to_string())
        });
        Ok(Self::with_mode(file.mode.unwrap_or(ActivationMode::ExcludeListed), ids))
    }

    /// Read the activation file; `Ok(None)` when it does not exist.
    pub fn read(path: &Path) -> Result<Option<Self>, ActivationFileError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ActivationFileError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        Self::from_json(&raw)
            .map(Some)
            .map_err(|source| ActivationFileError::Parse {
                path: path.display().to_string(),
                source,
            })
    }

    /// Read the activation file, falling back to [`ActivationMode::IncludeAll`]
    /// when it is missing or unusable.
    pub fn load(path: &Path) -> Self {
        match Self::read(path) {
            Ok(Some(config)) => {
                tracing::info!(
                    path = %path.display(),
                    mode = ?config.mode,
                    listed = config.list.len(),
                    "Loaded activation configuration"
                );
                config
            }
            Ok(None) => {
                tracing::debug!(path = %path.display(), "No activation file; including all modules");
                Self::include_all()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring activation file; including all modules");
                Self::include_all()
            }
        }
    }
}

/// Result of applying an [`ActivationConfig`] to a registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyOutcome {
    pub included: BTreeSet<String>,
    pub excluded: BTreeMap<String, RejectReason>,
    /// Listed ids that were never discovered.
    pub unknown_ids: Vec<String>,
}

pub struct ActivationPolicy;

impl ActivationPolicy {
    pub fn resolve(registry: &ModuleRegistry, config: &ActivationConfig) -> PolicyOutcome {
        let listed: BTreeSet<&str> = config.list.iter().map(String::as_str).collect();
        let mut outcome = PolicyOutcome::default();

        for id in registry.ids() {
            let keep = match config.mode {
                ActivationMode::IncludeAll => Ok(()),
                ActivationMode::ExcludeListed if listed.contains(id) => {
                    Err(RejectReason::ExcludedByPolicy)
                }
                ActivationMode::ExcludeListed => Ok(()),
                ActivationMode::IncludeOnlyListed if listed.contains(id) => Ok(()),
                ActivationMode::IncludeOnlyListed => Err(RejectReason::NotInAllowList),
            };
            match keep {
                Ok(()) => {
                    outcome.included.insert(id.to_string());
                }
                Err(reason) => {
                    outcome.excluded.insert(id.to_string(), reason);
                }
            }
        }

        for id in registry.duplicate_ids().keys() {
            outcome.excluded.insert(id.clone(), RejectReason::DuplicateId);
        }

        if config.mode != ActivationMode::IncludeAll {
            for id in &config.list {
                if !registry.contains(id) && !registry.duplicate_ids().contains_key(id) {
                    tracing::warn!(module = %id, mode = ?config.mode, "Activation list names an unknown module");
                    outcome.unknown_ids.push(id.clone());
                }
            }
        }

        tracing::debug!(
            included = outcome.included.len(),
            excluded = outcome.excluded.len(),
            "Applied activation policy"
        );
        outcome
    }
}
