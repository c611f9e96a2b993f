//! Reporting of module problems to an operator-facing surface.

use std::fmt;

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// Receives `(module_id, reason, severity)` tuples for every module that was
/// disabled, misconfigured or failed to tear down.
pub trait FailureNotifier: Send + Sync {
    fn notify(&self, module_id: &str, reason: &str, severity: Severity);
}

/// Forwards notices to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl FailureNotifier for TracingNotifier {
    fn notify(&self, module_id: &str, reason: &str, severity: Severity) {
        match severity {
            Severity::Info => tracing::info!(module = %module_id, %reason, "module notice"),
            Severity::Warning => tracing::warn!(module = %module_id, %reason, "module notice"),
            Severity::Error => tracing::error!(module = %module_id, %reason, "module disabled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub module_id: String,
    pub reason: String,
    pub severity: Severity,
}

/// Keeps every notice in memory, e.g. to render a "disabled modules" dialog.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn for_module(&self, module_id: &str) -> Vec<Notice> {
        self.notices
            .lock()
            .iter()
            .filter(|n| n.module_id == module_id)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.notices.lock().clear();
    }
}

impl FailureNotifier for MemoryNotifier {
    fn notify(&self, module_id: &str, reason: &str, severity: Severity) {
        self.notices.lock().push(Notice {
            module_id: module_id.to_string(),
            reason: reason.to_string(),
            severity,
        });
    }
}
