//! Module host: owns the whole pipeline and the current generation.
//!
//! discover → policy → resolve → init, published as one [`HostSnapshot`].
//! `reload` builds the next generation completely before swapping it in, so
//! readers never observe a mix of old and new registrations.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::RwLockReadGuard;
use semver::Version;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::capabilities::CapabilityRegistry;
use crate::context::{ConfigProvider, EmptyConfigProvider};
use crate::descriptor::{Capability, ModuleDescriptor};
use crate::factory::FactoryCatalog;
use crate::notify::{FailureNotifier, Severity, TracingNotifier};
use crate::policy::{ActivationConfig, ActivationPolicy, RejectReason};
use crate::registry::{ModuleRegistry, RegistryError};
use crate::resolver::{DependencyResolver, ResolvedActivationSet};
use crate::runtime::lifecycle::{ActivationOutcome, LifecycleManager, LoaderOptions, RuntimeFailure};
use crate::sources::ModuleSource;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("module discovery failed")]
    Discovery(#[from] RegistryError),
    #[error("module host is already started")]
    AlreadyStarted,
    #[error("module host is not started")]
    NotStarted,
}

/// Where the activation configuration comes from on every pipeline run.
#[derive(Debug, Clone)]
pub enum ActivationSource {
    /// Read (once per run) from a JSON file.
    File(PathBuf),
    /// A fixed configuration.
    Fixed(ActivationConfig),
}

impl ActivationSource {
    pub fn load(&self) -> ActivationConfig {
        match self {
            ActivationSource::File(path) => ActivationConfig::load(path),
            ActivationSource::Fixed(config) => config.clone(),
        }
    }
}

impl Default for ActivationSource {
    fn default() -> Self {
        ActivationSource::Fixed(ActivationConfig::include_all())
    }
}

/// Why a module is not active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisableCause {
    Rejected(RejectReason),
    Runtime(RuntimeFailure),
}

impl DisableCause {
    pub fn code(&self) -> &'static str {
        match self {
            DisableCause::Rejected(r) => r.code(),
            DisableCause::Runtime(_) => "runtime failure",
        }
    }
}

impl fmt::Display for DisableCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisableCause::Rejected(r) => fmt::Display::fmt(r, f),
            DisableCause::Runtime(e) => write!(f, "runtime failure: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisabledModule {
    pub id: String,
    pub cause: DisableCause,
}

/// Discovery and resolution without activation.
#[derive(Debug, Clone)]
pub struct Plan {
    pub registry: ModuleRegistry,
    pub config: ActivationConfig,
    pub resolved: ResolvedActivationSet,
}

/// One consistent generation of the pipeline.
#[derive(Debug)]
pub struct HostSnapshot {
    /// 0 before the first start.
    pub generation: u64,
    pub registry: ModuleRegistry,
    pub resolved: ResolvedActivationSet,
    pub activation: ActivationOutcome,
}

impl HostSnapshot {
    fn empty() -> Self {
        Self {
            generation: 0,
            registry: ModuleRegistry::default(),
            resolved: ResolvedActivationSet::default(),
            activation: ActivationOutcome::empty(),
        }
    }

    pub fn capabilities(&self) -> RwLockReadGuard<'_, CapabilityRegistry> {
        self.activation.capabilities()
    }

    pub fn descriptor(&self, id: &str) -> Option<&ModuleDescriptor> {
        self.registry.get(id).map(Arc::as_ref)
    }

    /// Rejected modules followed by runtime failures, each group by id.
    pub fn disabled_modules(&self) -> Vec<DisabledModule> {
        let rejected = self.resolved.rejected.iter().map(|(id, r)| DisabledModule {
            id: id.clone(),
            cause: DisableCause::Rejected(r.clone()),
        });
        let failed = self.activation.failures().iter().map(|(id, f)| DisabledModule {
            id: id.clone(),
            cause: DisableCause::Runtime(f.clone()),
        });
        rejected.chain(failed).collect()
    }
}

pub struct ModuleHostBuilder {
    sources: Vec<Arc<dyn ModuleSource>>,
    activation: ActivationSource,
    factories: FactoryCatalog,
    config: Arc<dyn ConfigProvider>,
    notifier: Arc<dyn FailureNotifier>,
    options: LoaderOptions,
    cancel: CancellationToken,
}

impl Default for ModuleHostBuilder {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            activation: ActivationSource::default(),
            factories: FactoryCatalog::new(),
            config: Arc::new(EmptyConfigProvider),
            notifier: Arc::new(TracingNotifier),
            options: LoaderOptions::default(),
            cancel: CancellationToken::new(),
        }
    }
}

impl ModuleHostBuilder {
    pub fn source(mut self, source: Arc<dyn ModuleSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn activation(mut self, activation: ActivationSource) -> Self {
        self.activation = activation;
        self
    }

    pub fn factories(mut self, factories: FactoryCatalog) -> Self {
        self.factories = factories;
        self
    }

    pub fn config_provider(mut self, config: Arc<dyn ConfigProvider>) -> Self {
        self.config = config;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn FailureNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn options(mut self, options: LoaderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn build(self) -> ModuleHost {
        let lifecycle = LifecycleManager::new(self.factories, self.config, self.notifier.clone(), self.options)
            .with_cancellation(self.cancel);
        ModuleHost {
            sources: self.sources,
            activation: self.activation,
            lifecycle,
            notifier: self.notifier,
            current: ArcSwap::from_pointee(HostSnapshot::empty()),
            generation: AtomicU64::new(0),
            transitions: Mutex::new(()),
        }
    }
}

/// Owns the pipeline inputs and the current generation of modules.
pub struct ModuleHost {
    sources: Vec<Arc<dyn ModuleSource>>,
    activation: ActivationSource,
    lifecycle: LifecycleManager,
    notifier: Arc<dyn FailureNotifier>,
    current: ArcSwap<HostSnapshot>,
    generation: AtomicU64,
    // start / reload / shutdown never interleave
    transitions: Mutex<()>,
}

impl ModuleHost {
    pub fn builder() -> ModuleHostBuilder {
        ModuleHostBuilder::default()
    }

    /// Discover and resolve without initializing anything.
    pub fn plan(&self) -> Result<Plan, HostError> {
        tracing::info!("Phase: discover");
        let registry = ModuleRegistry::discover(&self.sources)?;

        tracing::info!("Phase: resolve");
        let config = self.activation.load();
        let outcome = ActivationPolicy::resolve(&registry, &config);
        let resolved = DependencyResolver::order(&outcome, &registry);
        Ok(Plan {
            registry,
            config,
            resolved,
        })
    }

    async fn next_generation(&self) -> Result<HostSnapshot, HostError> {
        let Plan {
            registry, resolved, ..
        } = self.plan()?;
        self.report(&registry, &resolved);

        let activation = self.lifecycle.activate(&resolved, &registry).await;
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        Ok(HostSnapshot {
            generation,
            registry,
            resolved,
            activation,
        })
    }

    fn report(&self, registry: &ModuleRegistry, resolved: &ResolvedActivationSet) {
        for issue in registry.issues() {
            self.notifier.notify(&issue.location, &issue.to_string(), Severity::Error);
        }
        for (id, reason) in &resolved.rejected {
            let severity = match reason {
                RejectReason::ExcludedByPolicy | RejectReason::NotInAllowList => Severity::Info,
                RejectReason::Suppressed { .. } => Severity::Warning,
                _ => Severity::Error,
            };
            self.notifier.notify(id, &reason.to_string(), severity);
        }
        for warning in &resolved.warnings {
            self.notifier
                .notify(warning.module_id(), &warning.to_string(), Severity::Warning);
        }
    }

    /// Run the pipeline once and publish the first generation.
    ///
    /// Only an inaccessible discovery source makes this fail.
    pub async fn start(&self) -> Result<Arc<HostSnapshot>, HostError> {
        let _guard = self.transitions.lock().await;
        if self.current.load().generation != 0 {
            return Err(HostError::AlreadyStarted);
        }
        let snapshot = Arc::new(self.next_generation().await?);
        self.current.store(snapshot.clone());
        tracing::info!(generation = snapshot.generation, "Module host started");
        Ok(snapshot)
    }

    /// Re-run the entire pipeline and atomically swap in the new generation.
    ///
    /// The previous generation is finalized only after the swap. If discovery
    /// fails the current generation stays in place.
    pub async fn reload(&self) -> Result<Arc<HostSnapshot>, HostError> {
        let _guard = self.transitions.lock().await;
        if self.current.load().generation == 0 {
            return Err(HostError::NotStarted);
        }
        let snapshot = Arc::new(self.next_generation().await?);
        let previous = self.current.swap(snapshot.clone());
        tracing::info!(
            from = previous.generation,
            to = snapshot.generation,
            "Module host reloaded"
        );
        self.lifecycle.finalize(&previous.activation).await;
        Ok(snapshot)
    }

    /// Finalize the current generation. The snapshot stays readable.
    pub async fn shutdown(&self) {
        let _guard = self.transitions.lock().await;
        let current = self.current.load_full();
        self.lifecycle.finalize(&current.activation).await;
        tracing::info!(generation = current.generation, "Module host stopped");
    }

    /// The current generation; readers keep it alive as long as they need.
    pub fn snapshot(&self) -> Arc<HostSnapshot> {
        self.current.load_full()
    }

    /// Active module ids in activation order.
    pub fn module_ids(&self) -> Vec<String> {
        self.current.load().activation.active_ids()
    }

    pub fn providers_of(&self, kind: Capability) -> Vec<String> {
        self.current.load().capabilities().providers_of(kind).to_vec()
    }

    pub fn has(&self, module_id: &str, kind: Capability) -> bool {
        self.current.load().capabilities().has(module_id, kind)
    }

    fn metadata<T>(&self, id: &str, f: impl FnOnce(&ModuleDescriptor) -> T) -> Option<T> {
        self.current.load().descriptor(id).map(f)
    }

    pub fn module_version(&self, id: &str) -> Option<Version> {
        self.metadata(id, |d| d.version.clone())
    }

    pub fn module_description(&self, id: &str) -> Option<String> {
        self.metadata(id, |d| d.description.clone())
    }

    pub fn module_author(&self, id: &str) -> Option<String> {
        self.metadata(id, |d| d.author.clone())
    }

    pub fn module_contact(&self, id: &str) -> Option<String> {
        self.metadata(id, |d| d.contact.clone())
    }

    pub fn module_license(&self, id: &str) -> Option<String> {
        self.metadata(id, |d| d.license.clone())
    }

    /// Active datamodel modules whose datamodel is a standalone package.
    pub fn standalone_datamodel_ids(&self) -> Vec<String> {
        let snap = self.current.load();
        snap.activation
            .active_ids()
            .into_iter()
            .filter(|id| {
                snap.descriptor(id)
                    .is_some_and(|d| d.standalone && d.provides(Capability::Datamodel))
            })
            .collect()
    }

    pub fn disabled_modules(&self) -> Vec<DisabledModule> {
        self.current.load().disabled_modules()
    }

    /// Environment variables requested by discovered modules.
    pub fn environment_vars(&self) -> BTreeMap<String, String> {
        self.current.load().registry.environment_vars()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::Module;
    use crate::notify::MemoryNotifier;
    use crate::sources::StaticSource;

    struct Noop;

    #[async_trait::async_trait]
    impl Module for Noop {
        async fn init(&self, _ctx: &crate::context::ModuleCtx) -> anyhow::Result<()> {
            Ok(())
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    fn catalog(ids: &[&str]) -> FactoryCatalog {
        let c = FactoryCatalog::new();
        for id in ids {
            c.register(*id, || Ok(Arc::new(Noop) as Arc<dyn Module>));
        }
        c
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let host = ModuleHost::builder()
            .source(Arc::new(StaticSource::new([ModuleDescriptor::new("a")])))
            .factories(catalog(&["a"]))
            .build();
        assert_eq!(host.snapshot().generation, 0);
        host.start().await.unwrap();
        assert!(matches!(host.start().await, Err(HostError::AlreadyStarted)));
        assert_eq!(host.module_ids(), ["a"]);
    }

    #[tokio::test]
    async fn reload_before_start_is_rejected() {
        let host = ModuleHost::builder().build();
        assert!(matches!(host.reload().await, Err(HostError::NotStarted)));
    }

    #[tokio::test]
    async fn queries_and_disabled_surface() {
        let notifier = Arc::new(MemoryNotifier::new());
        let source = StaticSource::new([
            ModuleDescriptor::new("dm")
                .with_capability(Capability::Datamodel)
                .standalone(true)
                .with_version(Version::new(2, 1, 0))
                .with_description("basic datamodel"),
            ModuleDescriptor::new("excluded"),
            ModuleDescriptor::new("orphan").depends_on("excluded"),
            ModuleDescriptor::new("broken"),
        ]);
        let host = ModuleHost::builder()
            .source(Arc::new(source))
            .activation(ActivationSource::Fixed(ActivationConfig::exclude_listed(["excluded"])))
            .factories(catalog(&["dm", "excluded", "orphan"]))
            .notifier(notifier.clone())
            .build();
        host.start().await.unwrap();

        assert_eq!(host.module_ids(), ["dm"]);
        assert_eq!(host.standalone_datamodel_ids(), ["dm"]);
        assert_eq!(host.module_version("dm"), Some(Version::new(2, 1, 0)));
        assert_eq!(host.module_description("dm").as_deref(), Some("basic datamodel"));
        assert_eq!(host.module_author("nope"), None);

        let disabled = host.disabled_modules();
        let codes: Vec<(&str, &str)> = disabled.iter().map(|d| (d.id.as_str(), d.cause.code())).collect();
        assert_eq!(
            codes,
            [
                ("excluded", "excluded by policy"),
                ("orphan", "missing dependency"),
                ("broken", "runtime failure"),
            ]
        );
        assert_eq!(notifier.for_module("broken")[0].severity, Severity::Error);
        assert_eq!(notifier.for_module("excluded")[0].severity, Severity::Info);
    }
}
