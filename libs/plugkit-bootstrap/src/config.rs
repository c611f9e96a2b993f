use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths::home_dir::resolve_home_dir;

/// Name of the catch-all logging section.
pub const DEFAULT_SECTION: &str = "default";

const DEFAULT_HOME_SUBDIR: &str = ".plugkit";
const DEFAULT_ACTIVATION_FILE: &str = "_exclude.json";

/// Main application configuration: typed host settings plus a flexible
/// per-module configuration bag.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub host: HostConfig,
    /// Logging configuration (optional, uses defaults if None).
    pub logging: Option<LoggingConfig>,
    /// Directory with per-module YAML files merged into `modules` (optional).
    #[serde(default)]
    pub module_config_dir: Option<String>,
    /// Per-module configuration bag: module id → arbitrary JSON/YAML value.
    #[serde(default)]
    pub modules: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Normalized to an absolute path on load.
    pub home_dir: String,
    /// Where module manifests live; relative paths are under `home_dir`.
    pub modules_dir: String,
    /// Activation (exclude) list; empty means `<modules_dir>/_exclude.json`.
    #[serde(default)]
    pub activation_file: String,
    #[serde(with = "humantime_serde")]
    pub init_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
    pub parallel_init: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            // Empty => $HOME/.plugkit (%APPDATA%/.plugkit on Windows)
            home_dir: String::new(),
            modules_dir: "modules".to_string(),
            activation_file: String::new(),
            init_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(10),
            parallel_init: true,
        }
    }
}

impl HostConfig {
    pub fn modules_path(&self) -> PathBuf {
        under_home(&self.home_dir, &self.modules_dir)
    }

    pub fn activation_path(&self) -> PathBuf {
        if self.activation_file.trim().is_empty() {
            self.modules_path().join(DEFAULT_ACTIVATION_FILE)
        } else {
            under_home(&self.home_dir, &self.activation_file)
        }
    }
}

fn under_home(home: &str, p: &str) -> PathBuf {
    let p = Path::new(p);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        Path::new(home).join(p)
    }
}

/// Logging configuration - maps target prefixes to their logging settings.
/// Key "default" is the catch-all for logs that don't match explicit sections.
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Section {
    pub console_level: String, // "info", "debug", "error", "off"
    #[serde(default)]
    pub file: String, // "logs/plugkit.log"; empty disables the file sink
    #[serde(default)]
    pub file_level: String,
    #[serde(default)]
    pub max_age_days: Option<u32>,
    #[serde(default)]
    pub max_backups: Option<usize>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

pub fn default_logging_config() -> LoggingConfig {
    let mut logging = HashMap::new();
    logging.insert(
        DEFAULT_SECTION.to_string(),
        Section {
            console_level: "info".to_string(),
            file: "logs/plugkit.log".to_string(),
            file_level: "debug".to_string(),
            max_age_days: Some(7),
            max_backups: Some(3),
            max_size_mb: Some(100),
        },
    );
    logging
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: HostConfig::default(),
            logging: Some(default_logging_config()),
            module_config_dir: None,
            modules: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Layered loading: defaults → YAML file → `APP__*` environment variables.
    ///
    /// `host.home_dir` is normalized into an absolute path and created.
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        // optional sections stay None unless YAML/ENV provide them
        let base = AppConfig {
            logging: None,
            ..AppConfig::default()
        };

        let mut config: AppConfig = Figment::new()
            .merge(Serialized::defaults(base))
            .merge(Yaml::file(config_path.as_ref()))
            // APP__HOST__INIT_TIMEOUT=5s maps to host.init_timeout
            .merge(Env::prefixed("APP__").split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", config_path.as_ref().display()))?;

        normalize_home_dir_inplace(&mut config.host).context("Failed to resolve host.home_dir")?;

        if let Some(dir) = config.module_config_dir.clone() {
            let dir = under_home(&config.host.home_dir, &dir);
            merge_module_files(&mut config.modules, &dir)
                .with_context(|| format!("Failed to merge module configs from {}", dir.display()))?;
        }

        Ok(config)
    }

    /// Load configuration from file, or use defaults when no file is given.
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_layered(path),
            None => {
                let mut c = Self::default();
                normalize_home_dir_inplace(&mut c.host)
                    .context("Failed to resolve host.home_dir (defaults)")?;
                Ok(c)
            }
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config to YAML")
    }

    /// Apply overrides from command line arguments.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(dir) = &args.modules_dir {
            self.host.modules_dir = dir.clone();
        }
        if let Some(file) = &args.activation_file {
            self.host.activation_file = file.clone();
        }

        let logging = self.logging.get_or_insert_with(default_logging_config);
        if let Some(default_section) = logging.get_mut(DEFAULT_SECTION) {
            match args.verbose {
                0 => {}
                1 => default_section.console_level = "debug".to_string(),
                _ => default_section.console_level = "trace".to_string(),
            }
        }
    }
}

/// Command line arguments relevant to configuration.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config: Option<String>,
    pub modules_dir: Option<String>,
    pub activation_file: Option<String>,
    pub print_config: bool,
    pub verbose: u8,
}

fn normalize_home_dir_inplace(host: &mut HostConfig) -> Result<()> {
    let configured = Some(host.home_dir.clone()).filter(|h| !h.trim().is_empty());
    let resolved = resolve_home_dir(configured, DEFAULT_HOME_SUBDIR, true)
        .context("home_dir normalization failed")?;
    host.home_dir = resolved.to_string_lossy().to_string();
    Ok(())
}

/// `<dir>/<module>.yaml` (or `.yml`) becomes `modules.<module>`; files
/// override inline sections.
fn merge_module_files(bag: &mut HashMap<String, serde_json::Value>, dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        paths.push(entry?.path());
    }
    paths.sort();

    for path in paths {
        let is_yaml = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"));
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if !is_yaml || !path.is_file() {
            continue;
        }
        let raw = std::fs::read_to_string(&path)?;
        let value: serde_yaml::Value =
            serde_yaml::from_str(&raw).with_context(|| format!("Invalid YAML in {}", path.display()))?;
        bag.insert(name.to_string(), serde_json::to_value(value)?);
    }
    Ok(())
}
