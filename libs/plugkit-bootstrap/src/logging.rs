//! Logging setup: a console sink plus rotating JSON files routed by target
//! prefix. Sections are keyed by target prefix (`plugkit::runtime`,
//! `process_tools`, ...); the `default` section is the catch-all.

use std::collections::BTreeMap;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};
use parking_lot::Mutex;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::config::{LoggingConfig, Section, DEFAULT_SECTION};

// Keeps the non-blocking console worker alive for the whole process.
static CONSOLE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// `None` means the sink is switched off for that section.
fn parse_level(s: &str) -> Option<LevelFilter> {
    match s.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(LevelFilter::TRACE),
        "debug" => Some(LevelFilter::DEBUG),
        "info" | "" => Some(LevelFilter::INFO),
        "warn" | "warning" => Some(LevelFilter::WARN),
        "error" => Some(LevelFilter::ERROR),
        "off" | "none" => None,
        _ => Some(LevelFilter::INFO),
    }
}

/// `target` is `prefix` itself or lives below it (`prefix::...`).
fn is_under(target: &str, prefix: &str) -> bool {
    target
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

// ================= rotating files =================

#[derive(Clone)]
struct RotatingFile(Arc<Mutex<FileRotate<AppendTimestamp>>>);

impl RotatingFile {
    fn open(section: &Section, base_dir: &Path) -> std::io::Result<Self> {
        let path = resolve_log_path(&section.file, base_dir);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let limit = match section.max_backups {
            Some(n) => FileLimit::MaxFiles(n),
            None => FileLimit::Age(chrono::Duration::days(i64::from(section.max_age_days.unwrap_or(1)))),
        };
        let max_bytes = section.max_size_mb.unwrap_or(100) as usize * 1024 * 1024;
        let rot = FileRotate::new(
            path,
            AppendTimestamp::default(limit),
            ContentLimit::BytesSurpassed(max_bytes),
            Compression::None,
            None,
        );
        Ok(Self(Arc::new(Mutex::new(rot))))
    }
}

/// Writer for one record; `None` swallows the record.
struct FileHandle(Option<RotatingFile>);

impl Write for FileHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &self.0 {
            Some(f) => f.0.lock().write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &self.0 {
            Some(f) => f.0.lock().flush(),
            None => Ok(()),
        }
    }
}

/// Picks the file of the most specific matching section.
#[derive(Clone, Default)]
struct FileRouter {
    fallback: Option<RotatingFile>,
    // longest prefix first
    routes: Vec<(String, RotatingFile)>,
}

impl FileRouter {
    fn build(sections: &BTreeMap<&str, &Section>, base_dir: &Path) -> Self {
        let mut router = FileRouter::default();
        for (name, section) in sections {
            if section.file.trim().is_empty() {
                continue;
            }
            let file = match RotatingFile::open(section, base_dir) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Failed to open log file '{}' for section '{name}': {e}", section.file);
                    continue;
                }
            };
            if *name == DEFAULT_SECTION {
                router.fallback = Some(file);
            } else {
                router.routes.push((name.to_string(), file));
            }
        }
        router.routes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        router
    }

    fn route(&self, target: &str) -> Option<RotatingFile> {
        self.routes
            .iter()
            .find(|(prefix, _)| is_under(target, prefix))
            .map(|(_, f)| f.clone())
            .or_else(|| self.fallback.clone())
    }

    fn is_empty(&self) -> bool {
        self.fallback.is_none() && self.routes.is_empty()
    }
}

impl<'a> fmt::MakeWriter<'a> for FileRouter {
    type Writer = FileHandle;

    fn make_writer(&'a self) -> Self::Writer {
        FileHandle(self.fallback.clone())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        FileHandle(self.route(meta.target()))
    }
}

fn resolve_log_path(file: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

// ================= per-sink filters =================

fn console_targets(sections: &BTreeMap<&str, &Section>) -> Targets {
    let default = sections
        .get(DEFAULT_SECTION)
        .map_or(Some(LevelFilter::INFO), |s| parse_level(&s.console_level))
        .unwrap_or(LevelFilter::OFF);
    sections
        .iter()
        .filter(|(name, _)| **name != DEFAULT_SECTION)
        .fold(Targets::new().with_default(default), |t, (name, s)| {
            t.with_target(name.to_string(), parse_level(&s.console_level).unwrap_or(LevelFilter::OFF))
        })
}

fn file_targets(sections: &BTreeMap<&str, &Section>, router: &FileRouter) -> Targets {
    let default = match sections.get(DEFAULT_SECTION) {
        Some(s) if router.fallback.is_some() => parse_level(&s.file_level).unwrap_or(LevelFilter::OFF),
        _ => LevelFilter::OFF,
    };
    sections
        .iter()
        .filter(|(name, s)| **name != DEFAULT_SECTION && !s.file.trim().is_empty())
        .fold(Targets::new().with_default(default), |t, (name, s)| {
            t.with_target(name.to_string(), parse_level(&s.file_level).unwrap_or(LevelFilter::OFF))
        })
}

// ================= public init =================

/// Install the global subscriber. `RUST_LOG`, when set, caps every sink.
///
/// Relative log file paths are resolved against `base_dir`. Calling this
/// more than once keeps the first subscriber.
pub fn init_logging(cfg: &LoggingConfig, base_dir: &Path) {
    // bridge `log` records before the subscriber goes in
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("LogTracer init skipped: {e}");
    }

    let sections: BTreeMap<&str, &Section> = cfg.iter().map(|(k, v)| (k.as_str(), v)).collect();
    if sections.is_empty() {
        init_minimal();
        return;
    }

    let router = FileRouter::build(&sections, base_dir);
    let console_filter = console_targets(&sections);
    let file_filter = file_targets(&sections, &router);

    let (stderr, guard) = tracing_appender::non_blocking(std::io::stderr());
    let _ = CONSOLE_GUARD.set(guard);

    let console = fmt::layer()
        .with_writer(stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_filter(console_filter);

    let files = (!router.is_empty()).then(|| {
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(router)
            .with_filter(file_filter)
    });

    let _ = Registry::default()
        .with(EnvFilter::try_from_default_env().ok())
        .with(console)
        .with(files)
        .try_init();
}

/// INFO to stderr, honoring `RUST_LOG`.
pub fn init_minimal() {
    let _ = Registry::default()
        .with(EnvFilter::try_from_default_env().ok())
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_filter(LevelFilter::INFO),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(console: &str, file: &str) -> Section {
        Section {
            console_level: console.into(),
            file: file.into(),
            file_level: "debug".into(),
            max_age_days: None,
            max_backups: Some(2),
            max_size_mb: Some(1),
        }
    }

    #[test]
    fn prefix_matching_respects_path_segments() {
        assert!(is_under("plugkit", "plugkit"));
        assert!(is_under("plugkit::runtime::host", "plugkit::runtime"));
        assert!(!is_under("plugkit_bootstrap", "plugkit"));
    }

    #[test]
    fn levels_parse_leniently() {
        assert_eq!(parse_level("DEBUG"), Some(LevelFilter::DEBUG));
        assert_eq!(parse_level("off"), None);
        assert_eq!(parse_level("bogus"), Some(LevelFilter::INFO));
    }

    #[test]
    fn router_prefers_the_most_specific_section() {
        let dir = tempfile::tempdir().unwrap();
        let default = section("info", "logs/host.log");
        let engine = section("warn", "logs/engine.log");
        let runtime = section("debug", "logs/runtime.log");
        let quiet = section("info", "");
        let sections: BTreeMap<&str, &Section> = [
            (DEFAULT_SECTION, &default),
            ("plugkit", &engine),
            ("plugkit::runtime", &runtime),
            ("process_tools", &quiet),
        ]
        .into_iter()
        .collect();

        let router = FileRouter::build(&sections, dir.path());
        assert_eq!(router.routes.len(), 2);
        assert_eq!(router.routes[0].0, "plugkit::runtime");

        let runtime_file = router.route("plugkit::runtime::lifecycle").unwrap();
        let engine_file = router.route("plugkit::resolver").unwrap();
        let fallback = router.route("process_tools").unwrap();
        assert!(!Arc::ptr_eq(&runtime_file.0, &engine_file.0));
        assert!(Arc::ptr_eq(&fallback.0, &router.fallback.as_ref().unwrap().0));
        assert!(dir.path().join("logs").is_dir());
    }
}
