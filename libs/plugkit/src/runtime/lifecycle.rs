//! Module loader / lifecycle manager.
//!
//! Instantiates and initializes the resolved modules, isolating every
//! per-module failure, and tears them down in reverse activation order.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use parking_lot::{RwLock, RwLockReadGuard};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::capabilities::{CapabilityRegistry, CapabilityView};
use crate::context::{ConfigProvider, ModuleCtx};
use crate::contracts::Module;
use crate::descriptor::ModuleDescriptor;
use crate::factory::FactoryCatalog;
use crate::notify::{FailureNotifier, Severity};
use crate::registry::ModuleRegistry;
use crate::resolver::ResolvedActivationSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Upper bound for a single `Module::init`.
    pub init_timeout: Duration,
    /// Upper bound for a single `Module::shutdown`.
    pub shutdown_timeout: Duration,
    /// Initialize modules of one dependency wave concurrently.
    pub parallel: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            init_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(10),
            parallel: true,
        }
    }
}

/// Why an ordered module ended up disabled at runtime.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuntimeFailure {
    #[error("no factory registered for entry '{entry}'")]
    NoFactory { entry: String },
    #[error("instantiation failed: {0}")]
    Instantiation(String),
    #[error("initialization failed: {0}")]
    Init(String),
    #[error("panicked: {0}")]
    Panicked(String),
    #[error("initialization timed out after {0:?}")]
    TimedOut(Duration),
}

/// One activated generation of modules.
pub struct ActivationOutcome {
    capabilities: Arc<RwLock<CapabilityRegistry>>,
    failures: BTreeMap<String, RuntimeFailure>,
    cancel: CancellationToken,
    finalized: AtomicBool,
}

impl std::fmt::Debug for ActivationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivationOutcome")
            .field("active", &self.capabilities.read().modules())
            .field("failures", &self.failures)
            .finish()
    }
}

impl ActivationOutcome {
    /// A generation with no modules (before the first start).
    pub(crate) fn empty() -> Self {
        Self {
            capabilities: Arc::new(RwLock::new(CapabilityRegistry::new())),
            failures: BTreeMap::new(),
            cancel: CancellationToken::new(),
            finalized: AtomicBool::new(true),
        }
    }

    /// Read access to the capability registry of this generation.
    pub fn capabilities(&self) -> RwLockReadGuard<'_, CapabilityRegistry> {
        self.capabilities.read()
    }

    pub fn view(&self) -> CapabilityView {
        CapabilityView::new(self.capabilities.clone())
    }

    /// Ordered modules disabled due to a runtime failure.
    pub fn failures(&self) -> &BTreeMap<String, RuntimeFailure> {
        &self.failures
    }

    /// Successfully initialized ids in activation order.
    pub fn active_ids(&self) -> Vec<String> {
        self.capabilities.read().modules().to_vec()
    }

    pub fn is_active(&self, module_id: &str) -> bool {
        self.capabilities.read().contains(module_id)
    }

    /// Cancelled when this generation is finalized.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }
}

/// Drives modules through init and shutdown.
pub struct LifecycleManager {
    factories: FactoryCatalog,
    config: Arc<dyn ConfigProvider>,
    notifier: Arc<dyn FailureNotifier>,
    options: LoaderOptions,
    cancel: CancellationToken,
}

impl LifecycleManager {
    pub fn new(
        factories: FactoryCatalog,
        config: Arc<dyn ConfigProvider>,
        notifier: Arc<dyn FailureNotifier>,
        options: LoaderOptions,
    ) -> Self {
        Self {
            factories,
            config,
            notifier,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Use `cancel` as the parent of every generation's token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// INIT phase: bring up `resolved.ordered`.
    ///
    /// Never fails as a whole; modules that cannot be brought up are recorded
    /// in [`ActivationOutcome::failures`] and reported with [`Severity::Error`].
    pub async fn activate(
        &self,
        resolved: &ResolvedActivationSet,
        registry: &ModuleRegistry,
    ) -> ActivationOutcome {
        tracing::info!(modules = resolved.ordered.len(), parallel = self.options.parallel, "Phase: init");

        let shared = Arc::new(RwLock::new(CapabilityRegistry::new()));
        let view = CapabilityView::new(shared.clone());
        let cancel = self.cancel.child_token();
        let position: HashMap<&str, usize> = resolved
            .ordered
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let batches: Vec<Vec<String>> = if self.options.parallel {
            resolved.waves()
        } else {
            resolved.ordered.iter().map(|id| vec![id.clone()]).collect()
        };

        let mut failures = BTreeMap::new();
        for batch in batches {
            let mut pending = Vec::with_capacity(batch.len());
            for id in &batch {
                match registry.get(id) {
                    Some(d) => pending.push(d.clone()),
                    None => tracing::warn!(module = %id, "Ordered module is not in the registry; skipping"),
                }
            }

            let results = if self.options.parallel && pending.len() > 1 {
                join_all(
                    pending
                        .iter()
                        .map(|d| self.init_one(d.clone(), view.clone(), cancel.clone())),
                )
                .await
            } else {
                let mut out = Vec::with_capacity(pending.len());
                for d in &pending {
                    out.push(self.init_one(d.clone(), view.clone(), cancel.clone()).await);
                }
                out
            };

            // single writer: registrations of one batch land together
            let mut w = shared.write();
            for (descriptor, result) in pending.iter().zip(results) {
                let id = descriptor.id.as_str();
                match result {
                    Ok(instance) => {
                        let index = position.get(id).copied().unwrap_or(usize::MAX);
                        w.register(id, index, &descriptor.capabilities, instance);
                    }
                    Err(failure) => {
                        tracing::error!(module = %id, error = %failure, "Module disabled due to runtime failure");
                        self.notifier.notify(id, &failure.to_string(), Severity::Error);
                        failures.insert(id.to_string(), failure);
                    }
                }
            }
        }

        tracing::info!(
            active = shared.read().len(),
            failed = failures.len(),
            "Module activation finished"
        );

        ActivationOutcome {
            capabilities: shared,
            failures,
            cancel,
            finalized: AtomicBool::new(false),
        }
    }

    async fn init_one(
        &self,
        descriptor: Arc<ModuleDescriptor>,
        view: CapabilityView,
        cancel: CancellationToken,
    ) -> Result<Arc<dyn Module>, RuntimeFailure> {
        let id = descriptor.id.clone();
        let factory = self
            .factories
            .get(&descriptor.entry)
            .ok_or_else(|| RuntimeFailure::NoFactory {
                entry: descriptor.entry.clone(),
            })?;

        let instance = match std::panic::catch_unwind(AssertUnwindSafe(|| factory())) {
            Ok(Ok(instance)) => instance,
            Ok(Err(e)) => return Err(RuntimeFailure::Instantiation(format!("{e:#}"))),
            Err(payload) => return Err(RuntimeFailure::Panicked(panic_message(payload.as_ref()))),
        };

        let ctx = ModuleCtx::new(descriptor, self.config.clone(), view, cancel);
        let module = instance.clone();
        let started = Instant::now();
        let handle = tokio::spawn(async move { module.init(&ctx).await });

        match tokio::time::timeout(self.options.init_timeout, handle).await {
            Ok(Ok(Ok(()))) => {
                tracing::debug!(module = %id, elapsed = ?started.elapsed(), "Module initialized");
                Ok(instance)
            }
            Ok(Ok(Err(e))) => Err(RuntimeFailure::Init(format!("{e:#}"))),
            Ok(Err(join)) if join.is_panic() => {
                Err(RuntimeFailure::Panicked(panic_message(join.into_panic().as_ref())))
            }
            Ok(Err(join)) => Err(RuntimeFailure::Init(join.to_string())),
            Err(_) => {
                // the init task keeps running detached; it is not aborted
                tracing::warn!(module = %id, timeout = ?self.options.init_timeout, "Abandoning unresponsive module init");
                Err(RuntimeFailure::TimedOut(self.options.init_timeout))
            }
        }
    }

    /// STOP phase: shut modules down in reverse activation order.
    ///
    /// Failures are logged and reported with [`Severity::Warning`]; they never
    /// stop the remaining modules from being finalized. Calling this twice
    /// for the same outcome is a no-op.
    pub async fn finalize(&self, outcome: &ActivationOutcome) {
        if outcome.finalized.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!("Phase: stop");
        outcome.cancel.cancel();

        let modules: Vec<(String, Arc<dyn Module>)> = {
            let reg = outcome.capabilities.read();
            reg.modules()
                .iter()
                .filter_map(|id| reg.instance(id).map(|m| (id.clone(), m)))
                .collect()
        };

        for (id, module) in modules.into_iter().rev() {
            let handle = tokio::spawn(async move { module.shutdown().await });
            let problem = match tokio::time::timeout(self.options.shutdown_timeout, handle).await {
                Ok(Ok(Ok(()))) => {
                    tracing::debug!(module = %id, "Module finalized");
                    continue;
                }
                Ok(Ok(Err(e))) => format!("shutdown failed: {e:#}"),
                Ok(Err(join)) if join.is_panic() => {
                    format!("shutdown panicked: {}", panic_message(join.into_panic().as_ref()))
                }
                Ok(Err(join)) => format!("shutdown failed: {join}"),
                Err(_) => format!("shutdown timed out after {:?}", self.options.shutdown_timeout),
            };
            tracing::warn!(module = %id, error = %problem, "Failed to finalize module");
            self.notifier.notify(&id, &problem, Severity::Warning);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
