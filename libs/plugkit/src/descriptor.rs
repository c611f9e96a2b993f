//! Module descriptors: static metadata for one discoverable module.
//!
//! Descriptors are built once at discovery time (from a JSON manifest, a
//! compiled-in registration or an explicit list) and never mutated afterwards.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use semver::Version;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Prefix marking a dependency name as a regular expression over module ids.
pub const REGEX_DEPENDENCY_PREFIX: &str = "regex:";

/// Capability interface a module may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Generic module interface.
    Module,
    /// Contributes data classes / a project package.
    Datamodel,
    /// Contributes MDI items, docks and UI objects.
    Mdi,
    /// Extended MDI interface. Implies [`Capability::Mdi`].
    MdiExt,
    /// Contributes calculators and tasks.
    Process,
}

impl Capability {
    /// Human-readable interface name.
    pub fn interface_name(self) -> &'static str {
        match self {
            Capability::Module => "Module Interface",
            Capability::Datamodel => "Datamodel Interface",
            Capability::Mdi => "Mdi Interface",
            Capability::MdiExt => "Mdi Interface Ext",
            Capability::Process => "Process Interface",
        }
    }

    /// Capabilities a module effectively provides when it declares `self`.
    pub fn implied(self) -> &'static [Capability] {
        match self {
            Capability::MdiExt => &[Capability::MdiExt, Capability::Mdi],
            Capability::Module => &[Capability::Module],
            Capability::Datamodel => &[Capability::Datamodel],
            Capability::Mdi => &[Capability::Mdi],
            Capability::Process => &[Capability::Process],
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.interface_name())
    }
}

/// Expand declared capabilities with the ones they imply.
pub fn effective_capabilities(declared: &BTreeSet<Capability>) -> BTreeSet<Capability> {
    declared
        .iter()
        .flat_map(|c| c.implied().iter().copied())
        .collect()
}

/// A dependency on another module (or on every module a pattern matches).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    /// Minimal required version of the provider.
    #[serde(
        default,
        rename = "version",
        deserialize_with = "deserialize_opt_version",
        skip_serializing_if = "Option::is_none"
    )]
    pub min_version: Option<Version>,
    #[serde(default)]
    pub optional: bool,
}

impl Dependency {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min_version: None,
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            optional: true,
            ..Self::required(name)
        }
    }

    pub fn at_least(mut self, version: Version) -> Self {
        self.min_version = Some(version);
        self
    }

    /// The regex pattern, if this dependency is pattern based.
    pub fn pattern(&self) -> Option<&str> {
        self.name.strip_prefix(REGEX_DEPENDENCY_PREFIX)
    }
}

/// Static metadata of one discoverable module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub id: String,
    pub display_name: String,
    pub version: Version,
    pub description: String,
    pub author: String,
    pub contact: String,
    pub license: String,
    pub capabilities: BTreeSet<Capability>,
    pub depends_on: Vec<Dependency>,
    pub conflicts_with: BTreeSet<String>,
    /// Modules this one switches off while both are active.
    pub suppresses: BTreeSet<String>,
    /// Modules allowed to switch this one off.
    pub allow_suppression_by: BTreeSet<String>,
    pub environment: BTreeMap<String, String>,
    pub standalone: bool,
    /// Factory name; defaults to `id`.
    pub entry: String,
    /// Where the descriptor was discovered.
    pub location: String,
}

impl ModuleDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            version: Version::new(0, 0, 0),
            description: String::new(),
            author: String::new(),
            contact: String::new(),
            license: String::new(),
            capabilities: BTreeSet::new(),
            depends_on: Vec::new(),
            conflicts_with: BTreeSet::new(),
            suppresses: BTreeSet::new(),
            allow_suppression_by: BTreeSet::new(),
            environment: BTreeMap::new(),
            standalone: false,
            entry: id.clone(),
            location: format!("builtin:{id}"),
            id,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>, contact: impl Into<String>) -> Self {
        self.author = author.into();
        self.contact = contact.into();
        self
    }

    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        self.license = license.into();
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.depends_on.push(dependency);
        self
    }

    /// Shorthand for a required, unversioned dependency.
    pub fn depends_on(self, id: impl Into<String>) -> Self {
        self.with_dependency(Dependency::required(id))
    }

    pub fn conflicts_with(mut self, id: impl Into<String>) -> Self {
        self.conflicts_with.insert(id.into());
        self
    }

    pub fn suppresses(mut self, id: impl Into<String>) -> Self {
        self.suppresses.insert(id.into());
        self
    }

    pub fn allow_suppression_by(mut self, id: impl Into<String>) -> Self {
        self.allow_suppression_by.insert(id.into());
        self
    }

    pub fn with_env(mut self, name: impl Into<String>, init: impl Into<String>) -> Self {
        self.environment.entry(name.into()).or_insert_with(|| init.into());
        self
    }

    pub fn standalone(mut self, standalone: bool) -> Self {
        self.standalone = standalone;
        self
    }

    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = entry.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn provides(&self, capability: Capability) -> bool {
        effective_capabilities(&self.capabilities).contains(&capability)
    }

    /// Structural checks applied to every discovered descriptor.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.id.trim().is_empty() {
            return Err(ManifestError::Invalid("module id must not be empty".into()));
        }
        if self.id.chars().any(char::is_whitespace) {
            return Err(ManifestError::Invalid(format!(
                "module id '{}' must not contain whitespace",
                self.id
            )));
        }
        for dep in &self.depends_on {
            if dep.name.trim().is_empty() {
                return Err(ManifestError::Invalid(format!(
                    "module '{}' declares a dependency without a name",
                    self.id
                )));
            }
            if let Some(pattern) = dep.pattern() {
                regex::Regex::new(pattern).map_err(|e| {
                    ManifestError::Invalid(format!(
                        "module '{}' has an invalid dependency pattern '{pattern}': {e}",
                        self.id
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Parse a JSON manifest.
    pub fn from_manifest_json(raw: &str, location: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_json::from_str(raw)?;
        let descriptor = manifest.into_descriptor(location);
        descriptor.validate()?;
        Ok(descriptor)
    }
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("malformed manifest: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid descriptor: {0}")]
    Invalid(String),
}

/// On-disk manifest layout (camelCase JSON).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Manifest {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_version")]
    version: Option<Version>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    contact: String,
    #[serde(default)]
    license: String,
    #[serde(default)]
    capabilities: BTreeSet<Capability>,
    #[serde(default)]
    dependencies: Vec<Dependency>,
    #[serde(default)]
    conflicts: BTreeSet<String>,
    #[serde(default)]
    suppresses: BTreeSet<String>,
    #[serde(default)]
    allow_suppression_by: BTreeSet<String>,
    #[serde(default)]
    environment: Vec<EnvVar>,
    #[serde(default)]
    standalone: bool,
    #[serde(default)]
    entry: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EnvVar {
    name: String,
    #[serde(default)]
    init: String,
}

impl Manifest {
    fn into_descriptor(self, location: &str) -> ModuleDescriptor {
        let mut environment = BTreeMap::new();
        for var in self.environment {
            environment.entry(var.name).or_insert(var.init);
        }
        ModuleDescriptor {
            display_name: self.display_name.unwrap_or_else(|| self.id.clone()),
            version: self.version.unwrap_or_else(|| Version::new(0, 0, 0)),
            description: self.description,
            author: self.author,
            contact: self.contact,
            license: self.license,
            capabilities: self.capabilities,
            depends_on: self.dependencies,
            conflicts_with: self.conflicts,
            suppresses: self.suppresses,
            allow_suppression_by: self.allow_suppression_by,
            environment,
            standalone: self.standalone,
            entry: self.entry.unwrap_or_else(|| self.id.clone()),
            location: location.to_string(),
            id: self.id,
        }
    }
}

/// Parse a version leniently: missing minor/patch components default to 0.
pub fn parse_version(raw: &str) -> Result<Version, semver::Error> {
    let raw = raw.trim().trim_start_matches('v');
    let (core, rest) = match raw.find(['-', '+']) {
        Some(i) => raw.split_at(i),
        None => (raw, ""),
    };
    let padded = match core.split('.').count() {
        1 => format!("{core}.0.0{rest}"),
        2 => format!("{core}.0{rest}"),
        _ => raw.to_string(),
    };
    Version::parse(&padded)
}

fn deserialize_opt_version<'de, D>(deserializer: D) -> Result<Option<Version>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_version(&s)
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("invalid version '{s}': {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_versions() {
        assert_eq!(parse_version("1").unwrap(), Version::new(1, 0, 0));
        assert_eq!(parse_version("1.2").unwrap(), Version::new(1, 2, 0));
        assert_eq!(parse_version("v2.3.4").unwrap(), Version::new(2, 3, 4));
        assert_eq!(
            parse_version("1.2-rc1").unwrap().pre.as_str(),
            "rc1"
        );
        assert!(parse_version("one.two").is_err());
    }

    #[test]
    fn manifest_full_roundtrip_into_descriptor() {
        let raw = r#"{
            "id": "process_tools",
            "displayName": "Process Tools",
            "version": "1.4",
            "description": "Calculators",
            "author": "someone",
            "capabilities": ["process", "mdi_ext"],
            "dependencies": [
                {"name": "datamodel_basic", "version": "1.0"},
                {"name": "regex:^plot_.*$", "optional": true}
            ],
            "conflicts": ["legacy_tools"],
            "suppresses": ["simple_tools"],
            "allowSuppressionBy": ["process_tools_pro"],
            "environment": [{"name": "TOOLS_HOME", "init": "/opt"}, {"name": "TOOLS_HOME", "init": "/ignored"}],
            "entry": "process_tools_v1"
        }"#;
        let d = ModuleDescriptor::from_manifest_json(raw, "/tmp/process_tools.json").unwrap();
        assert_eq!(d.id, "process_tools");
        assert_eq!(d.display_name, "Process Tools");
        assert_eq!(d.version, Version::new(1, 4, 0));
        assert_eq!(d.depends_on.len(), 2);
        assert_eq!(d.depends_on[0].min_version, Some(Version::new(1, 0, 0)));
        assert!(d.depends_on[1].optional);
        assert_eq!(d.depends_on[1].pattern(), Some("^plot_.*$"));
        assert!(d.conflicts_with.contains("legacy_tools"));
        assert!(d.suppresses.contains("simple_tools"));
        assert!(d.allow_suppression_by.contains("process_tools_pro"));
        assert_eq!(d.environment.get("TOOLS_HOME").map(String::as_str), Some("/opt"));
        assert_eq!(d.entry, "process_tools_v1");
        assert_eq!(d.location, "/tmp/process_tools.json");
        assert!(d.provides(Capability::Mdi));
        assert!(d.provides(Capability::Process));
        assert!(!d.provides(Capability::Datamodel));
    }

    #[test]
    fn manifest_defaults() {
        let d = ModuleDescriptor::from_manifest_json(r#"{"id": "bare"}"#, "bare.json").unwrap();
        assert_eq!(d.display_name, "bare");
        assert_eq!(d.entry, "bare");
        assert!(d.capabilities.is_empty());
        assert_eq!(d.version, Version::new(0, 0, 0));
    }

    #[test]
    fn manifest_errors_are_distinguishable() {
        let err = ModuleDescriptor::from_manifest_json("{not json", "x").unwrap_err();
        assert!(matches!(err, ManifestError::Malformed(_)));

        let err =
            ModuleDescriptor::from_manifest_json(r#"{"id": "a", "capabilities": ["gui"]}"#, "x")
                .unwrap_err();
        assert!(matches!(err, ManifestError::Malformed(_)));

        let err = ModuleDescriptor::from_manifest_json(r#"{"id": "  "}"#, "x").unwrap_err();
        assert!(matches!(err, ManifestError::Invalid(_)));

        let err = ModuleDescriptor::from_manifest_json(
            r#"{"id": "a", "dependencies": [{"name": "regex:(("}]}"#,
            "x",
        )
        .unwrap_err();
        assert!(matches!(err, ManifestError::Invalid(_)));
    }

    #[test]
    fn capability_names_are_stable() {
        assert_eq!(Capability::MdiExt.to_string(), "Mdi Interface Ext");
        assert_eq!(Capability::Process.to_string(), "Process Interface");
        let set: BTreeSet<_> = [Capability::MdiExt].into_iter().collect();
        let eff = effective_capabilities(&set);
        assert!(eff.contains(&Capability::Mdi));
        assert_eq!(eff.len(), 2);
    }
}
