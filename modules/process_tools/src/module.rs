use std::collections::BTreeSet;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use datamodel_basic::DatamodelBasic;
use plugkit::{
    Capability, Dependency, Module, ModuleCtx, ModuleDescriptor, ModuleRegistration, Version,
};
use tracing::{debug, info, warn};

use crate::calculators::{Calculator, ToolError};
use crate::config::ProcessToolsConfig;

pub const MODULE_ID: &str = "process_tools";

pub fn descriptor() -> ModuleDescriptor {
    ModuleDescriptor::new(MODULE_ID)
        .with_display_name("Process Tools")
        .with_version(Version::new(0, 3, 0))
        .with_description("Curve calculators with a tool window")
        .with_author("Plugkit Developers", "dev@plugkit.invalid")
        .with_license("Apache-2.0")
        .with_capability(Capability::Process)
        .with_capability(Capability::MdiExt)
        .with_dependency(
            Dependency::required(datamodel_basic::MODULE_ID).at_least(Version::new(1, 0, 0)),
        )
}

plugkit::inventory::submit! {
    ModuleRegistration {
        descriptor,
        factory: || Ok(Arc::new(ProcessTools::default())),
    }
}

struct Toolbox {
    enabled: BTreeSet<Calculator>,
    input_class: String,
}

#[derive(Default)]
pub struct ProcessTools {
    toolbox: ArcSwapOption<Toolbox>,
}

impl ProcessTools {
    pub fn calculate(&self, calculator: Calculator, samples: &[(f64, f64)]) -> Result<f64, ToolError> {
        let toolbox = self.toolbox.load();
        let toolbox = toolbox.as_ref().ok_or(ToolError::NotInitialized)?;
        if !toolbox.enabled.contains(&calculator) {
            return Err(ToolError::NotEnabled(calculator));
        }
        calculator.apply(samples)
    }

    /// Entries of the tool window menu, one per enabled calculator.
    pub fn menu_entries(&self) -> Vec<String> {
        self.toolbox
            .load()
            .as_ref()
            .map(|t| {
                t.enabled
                    .iter()
                    .map(|c| format!("{}/{c}", t.input_class))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Module for ProcessTools {
    async fn init(&self, ctx: &ModuleCtx) -> anyhow::Result<()> {
        let cfg: ProcessToolsConfig = ctx.config()?;
        debug!(calculators = ?cfg.calculators, input_class = %cfg.input_class, "Loaded process_tools config");

        let catalog = ctx
            .capabilities()
            .with_instance::<DatamodelBasic, _>(datamodel_basic::MODULE_ID, DatamodelBasic::catalog)
            .flatten();

        // Without a datamodel the module stays active with no calculators.
        let enabled = match catalog {
            Some(catalog) => {
                anyhow::ensure!(
                    catalog.contains(&cfg.input_class),
                    "datamodel has no class '{}'",
                    cfg.input_class
                );
                cfg.calculators.into_iter().collect()
            }
            None => {
                warn!(
                    datamodel = datamodel_basic::MODULE_ID,
                    "Datamodel is not available; process tools start without calculators"
                );
                BTreeSet::new()
            }
        };

        let toolbox = Toolbox {
            enabled,
            input_class: cfg.input_class,
        };
        info!(
            calculators = toolbox.enabled.len(),
            input_class = %toolbox.input_class,
            "Process tools ready"
        );
        self.toolbox.store(Some(Arc::new(toolbox)));
        Ok(())
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        self.toolbox.store(None);
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
