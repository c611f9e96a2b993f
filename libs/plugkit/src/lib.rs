//! # Plugkit - Plugin Host
//!
//! Discovers a variable set of modules, decides which of them take part in a
//! run, orders them by dependencies and brings them up with per-module
//! failure isolation.
//!
//! ## Pipeline
//!
//! - **Discovery**: [`ModuleRegistry::discover`] over one or more
//!   [`ModuleSource`]s (JSON manifests, compiled-in registrations, explicit lists)
//! - **Policy**: [`ActivationPolicy`] applies the persisted include/exclude list
//! - **Resolution**: [`DependencyResolver`] rejects missing, outdated, cyclic
//!   and conflicting modules and computes a deterministic load order
//! - **Lifecycle**: [`LifecycleManager`] initializes modules and fills the
//!   [`CapabilityRegistry`]
//!
//! [`ModuleHost`] drives the whole pipeline and supports atomic reloads.
//!
//! ## Basic Module Example
//!
//! ```rust,ignore
//! use plugkit::{Capability, Module, ModuleCtx, ModuleDescriptor, ModuleRegistration};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! pub struct Plotter;
//!
//! #[plugkit::async_trait]
//! impl Module for Plotter {
//!     async fn init(&self, ctx: &ModuleCtx) -> anyhow::Result<()> {
//!         let has_dm = !ctx.capabilities().providers_of(Capability::Datamodel).is_empty();
//!         tracing::info!(has_dm, "plotter ready");
//!         Ok(())
//!     }
//!     fn as_any(&self) -> &dyn std::any::Any { self }
//! }
//!
//! plugkit::inventory::submit! {
//!     ModuleRegistration {
//!         descriptor: || ModuleDescriptor::new("plotter").with_capability(Capability::Mdi),
//!         factory: || Ok(Arc::new(Plotter)),
//!     }
//! }
//! ```

pub use anyhow::Result;
pub use async_trait::async_trait;
pub use semver::Version;

// Re-export inventory for user convenience
pub use inventory;

pub mod capabilities;
pub mod context;
pub mod contracts;
pub mod descriptor;
pub mod factory;
pub mod notify;
pub mod policy;
pub mod registry;
pub mod resolver;
pub mod runtime;
pub mod sources;

pub use capabilities::{CapabilityRegistry, CapabilityView};
pub use context::{ConfigError, ConfigProvider, EmptyConfigProvider, ModuleCtx};
pub use contracts::Module;
pub use descriptor::{Capability, Dependency, ManifestError, ModuleDescriptor};
pub use factory::{FactoryCatalog, ModuleFactory};
pub use notify::{FailureNotifier, MemoryNotifier, Notice, Severity, TracingNotifier};
pub use policy::{
    ActivationConfig, ActivationFileError, ActivationMode, ActivationPolicy, PolicyOutcome,
    RejectReason,
};
pub use registry::{ModuleRegistry, RegistryError};
pub use resolver::{DependencyResolver, ResolutionWarning, ResolvedActivationSet};
pub use runtime::{
    run, ActivationOutcome, ActivationSource, DisableCause, DisabledModule, HostError,
    HostSnapshot, LifecycleManager, LoaderOptions, ModuleHost, ModuleHostBuilder, Plan,
    RunOptions, RuntimeFailure, ShutdownOptions,
};
pub use sources::{
    DiscoveryIssue, DiscoveryIssueKind, InventorySource, ManifestDirSource, ModuleRegistration,
    ModuleSource, SourceError, StaticSource,
};

#[cfg(test)]
mod tests;
