//! Capability registry: which active module provides which interface.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::contracts::Module;
use crate::descriptor::{effective_capabilities, Capability};

struct Provider {
    activation_index: usize,
    capabilities: BTreeSet<Capability>,
    instance: Arc<dyn Module>,
}

/// Index of successfully activated modules keyed by capability kind.
///
/// Provider lists are kept in activation order. The lifecycle manager is the
/// only writer; everybody else gets a shared, read-only reference.
#[derive(Default)]
pub struct CapabilityRegistry {
    providers: BTreeMap<Capability, Vec<String>>,
    modules: HashMap<String, Provider>,
    activation_order: Vec<String>,
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("modules", &self.activation_order)
            .field("providers", &self.providers)
            .finish()
    }
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Module ids providing `kind`, in activation order.
    pub fn providers_of(&self, kind: Capability) -> &[String] {
        self.providers.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, module_id: &str, kind: Capability) -> bool {
        self.modules
            .get(module_id)
            .is_some_and(|p| p.capabilities.contains(&kind))
    }

    pub fn contains(&self, module_id: &str) -> bool {
        self.modules.contains_key(module_id)
    }

    pub fn capabilities_of(&self, module_id: &str) -> Option<&BTreeSet<Capability>> {
        self.modules.get(module_id).map(|p| &p.capabilities)
    }

    /// Registered module ids in activation order.
    pub fn modules(&self) -> &[String] {
        &self.activation_order
    }

    pub fn instance(&self, module_id: &str) -> Option<Arc<dyn Module>> {
        self.modules.get(module_id).map(|p| p.instance.clone())
    }

    /// Run `f` against the concrete module type, if `module_id` is a `T`.
    pub fn with_instance<T: 'static, R>(&self, module_id: &str, f: impl FnOnce(&T) -> R) -> Option<R> {
        let provider = self.modules.get(module_id)?;
        provider.instance.as_any().downcast_ref::<T>().map(f)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Record a successfully initialized module.
    ///
    /// `activation_index` is the module's position in the resolved order;
    /// registrations may arrive out of order and are slotted accordingly.
    pub(crate) fn register(
        &mut self,
        module_id: &str,
        activation_index: usize,
        declared: &BTreeSet<Capability>,
        instance: Arc<dyn Module>,
    ) {
        if self.modules.contains_key(module_id) {
            tracing::warn!(module = %module_id, "Module already registered; ignoring");
            return;
        }
        let capabilities = effective_capabilities(declared);
        self.modules.insert(
            module_id.to_string(),
            Provider {
                activation_index,
                capabilities: capabilities.clone(),
                instance,
            },
        );

        let pos = Self::slot(&self.modules, &self.activation_order, activation_index);
        self.activation_order.insert(pos, module_id.to_string());

        for cap in capabilities {
            let list = self.providers.entry(cap).or_default();
            let pos = Self::slot(&self.modules, list, activation_index);
            list.insert(pos, module_id.to_string());
        }
    }

    fn slot(modules: &HashMap<String, Provider>, list: &[String], index: usize) -> usize {
        list.partition_point(|id| {
            modules
                .get(id)
                .is_some_and(|p| p.activation_index < index)
        })
    }
}

/// Live read access to the registry while activation is in progress.
///
/// Modules see every capability registered by earlier dependency waves.
#[derive(Clone, Default)]
pub struct CapabilityView {
    inner: Arc<RwLock<CapabilityRegistry>>,
}

impl CapabilityView {
    pub(crate) fn new(inner: Arc<RwLock<CapabilityRegistry>>) -> Self {
        Self { inner }
    }

    pub fn has(&self, module_id: &str, kind: Capability) -> bool {
        self.inner.read().has(module_id, kind)
    }

    pub fn providers_of(&self, kind: Capability) -> Vec<String> {
        self.inner.read().providers_of(kind).to_vec()
    }

    pub fn is_active(&self, module_id: &str) -> bool {
        self.inner.read().contains(module_id)
    }

    /// Run `f` against an active module's concrete type.
    ///
    /// The registry stays read-locked while `f` runs.
    pub fn with_instance<T: 'static, R>(&self, module_id: &str, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.inner.read().with_instance(module_id, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;

    #[async_trait::async_trait]
    impl Module for Dummy {
        async fn init(&self, _ctx: &crate::context::ModuleCtx) -> anyhow::Result<()> {
            Ok(())
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    fn caps(list: &[Capability]) -> BTreeSet<Capability> {
        list.iter().copied().collect()
    }

    #[test]
    fn providers_follow_activation_order_even_when_registered_late() {
        let mut reg = CapabilityRegistry::new();
        reg.register("d", 2, &caps(&[Capability::Process]), Arc::new(Dummy));
        reg.register("a", 0, &caps(&[Capability::Process, Capability::Datamodel]), Arc::new(Dummy));
        reg.register("c", 1, &caps(&[Capability::Process]), Arc::new(Dummy));

        assert_eq!(reg.providers_of(Capability::Process), ["a", "c", "d"]);
        assert_eq!(reg.providers_of(Capability::Datamodel), ["a"]);
        assert_eq!(reg.modules(), ["a", "c", "d"]);
        assert!(reg.providers_of(Capability::Mdi).is_empty());
    }

    #[test]
    fn has_and_implied_capabilities() {
        let mut reg = CapabilityRegistry::new();
        reg.register("ui", 0, &caps(&[Capability::MdiExt]), Arc::new(Dummy));

        assert!(reg.has("ui", Capability::MdiExt));
        assert!(reg.has("ui", Capability::Mdi));
        assert!(!reg.has("ui", Capability::Process));
        assert!(!reg.has("missing", Capability::Mdi));
        assert_eq!(reg.providers_of(Capability::Mdi), ["ui"]);
    }

    #[test]
    fn downcast_through_with_instance() {
        let mut reg = CapabilityRegistry::new();
        reg.register("dummy", 0, &BTreeSet::new(), Arc::new(Dummy));
        assert_eq!(reg.with_instance::<Dummy, _>("dummy", |_| 7), Some(7));
        assert_eq!(reg.with_instance::<String, _>("dummy", |_| 7), None);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn view_reads_live_registry() {
        let shared = Arc::new(RwLock::new(CapabilityRegistry::new()));
        let view = CapabilityView::new(shared.clone());
        assert!(!view.is_active("a"));
        shared
            .write()
            .register("a", 0, &caps(&[Capability::Datamodel]), Arc::new(Dummy));
        assert!(view.is_active("a"));
        assert!(view.has("a", Capability::Datamodel));
        assert_eq!(view.providers_of(Capability::Datamodel), vec!["a".to_string()]);
    }
}
