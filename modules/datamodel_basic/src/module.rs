use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use plugkit::{Capability, Module, ModuleCtx, ModuleDescriptor, ModuleRegistration, Version};
use tracing::{debug, info};

use crate::catalog::ClassCatalog;
use crate::config::DatamodelConfig;

pub const MODULE_ID: &str = "datamodel_basic";

/// Descriptor of the compiled-in datamodel module.
pub fn descriptor() -> ModuleDescriptor {
    ModuleDescriptor::new(MODULE_ID)
        .with_display_name("Basic Datamodel")
        .with_version(Version::new(1, 0, 0))
        .with_description("Tables, curves and images shared by analysis modules")
        .with_author("Plugkit Developers", "dev@plugkit.invalid")
        .with_license("Apache-2.0")
        .with_capability(Capability::Datamodel)
        .with_env("PLUGKIT_DATAMODEL", MODULE_ID)
        .standalone(true)
}

plugkit::inventory::submit! {
    ModuleRegistration {
        descriptor,
        factory: || Ok(Arc::new(DatamodelBasic::default())),
    }
}

/// Datamodel provider; the catalog is set at init and cleared at shutdown.
#[derive(Default)]
pub struct DatamodelBasic {
    catalog: ArcSwapOption<ClassCatalog>,
}

impl DatamodelBasic {
    /// `None` before init and after shutdown.
    pub fn catalog(&self) -> Option<Arc<ClassCatalog>> {
        self.catalog.load_full()
    }
}

#[async_trait]
impl Module for DatamodelBasic {
    async fn init(&self, ctx: &ModuleCtx) -> anyhow::Result<()> {
        let cfg: DatamodelConfig = ctx.config()?;
        debug!(
            classes = cfg.classes.len(),
            extension = %cfg.project_extension,
            "Loaded datamodel_basic config"
        );

        let catalog = ClassCatalog::new(&cfg.classes, &cfg.project_extension)?;
        info!(classes = ?catalog.names(), "Datamodel classes registered");
        self.catalog.store(Some(Arc::new(catalog)));
        Ok(())
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        self.catalog.store(None);
        info!("Datamodel released");
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugkit::{FactoryCatalog, ModuleHost, StaticSource};
    use std::collections::HashMap;

    struct Sections(HashMap<String, serde_json::Value>);

    impl plugkit::ConfigProvider for Sections {
        fn get_module_config(&self, module_id: &str) -> Option<&serde_json::Value> {
            self.0.get(module_id)
        }
    }

    fn host_with(config: Option<serde_json::Value>) -> ModuleHost {
        let factories = FactoryCatalog::new();
        factories.register(MODULE_ID, || Ok(Arc::new(DatamodelBasic::default()) as Arc<dyn Module>));
        let sections = config
            .map(|c| HashMap::from([(MODULE_ID.to_string(), c)]))
            .unwrap_or_default();
        ModuleHost::builder()
            .source(Arc::new(StaticSource::new([descriptor()])))
            .factories(factories)
            .config_provider(Arc::new(Sections(sections)))
            .build()
    }

    #[test]
    fn descriptor_is_a_standalone_datamodel() {
        let d = descriptor();
        assert!(d.validate().is_ok());
        assert!(d.provides(Capability::Datamodel));
        assert!(d.standalone);
        assert_eq!(d.environment["PLUGKIT_DATAMODEL"], MODULE_ID);
    }

    #[tokio::test]
    async fn init_uses_default_classes() {
        let host = host_with(None);
        let snap = host.start().await.unwrap();

        let names = snap
            .capabilities()
            .with_instance::<DatamodelBasic, _>(MODULE_ID, |m| m.catalog().map(|c| c.names()))
            .flatten();
        assert_eq!(names.unwrap(), ["Curve", "Image", "Table"]);
        assert_eq!(host.standalone_datamodel_ids(), [MODULE_ID]);

        host.shutdown().await;
        let released = snap
            .capabilities()
            .with_instance::<DatamodelBasic, _>(MODULE_ID, |m| m.catalog().is_none());
        assert_eq!(released, Some(true));
    }

    #[tokio::test]
    async fn invalid_config_disables_the_module() {
        let host = host_with(Some(serde_json::json!({"classes": ["Table", "Table"]})));
        host.start().await.unwrap();

        assert!(host.module_ids().is_empty());
        let disabled = host.disabled_modules();
        assert_eq!(disabled.len(), 1);
        assert_eq!(disabled[0].id, MODULE_ID);
    }
}
