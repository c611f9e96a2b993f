use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::capabilities::CapabilityView;
use crate::descriptor::ModuleDescriptor;

/// Source of per-module configuration sections (raw JSON by module id).
pub trait ConfigProvider: Send + Sync {
    fn get_module_config(&self, module_id: &str) -> Option<&serde_json::Value>;
}

/// Provider with no module sections at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyConfigProvider;

impl ConfigProvider for EmptyConfigProvider {
    fn get_module_config(&self, _module_id: &str) -> Option<&serde_json::Value> {
        None
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config for module '{module}'")]
    Invalid {
        module: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Per-module view handed to [`Module::init`](crate::Module::init).
#[derive(Clone)]
pub struct ModuleCtx {
    descriptor: Arc<ModuleDescriptor>,
    config_provider: Arc<dyn ConfigProvider>,
    capabilities: CapabilityView,
    cancel: CancellationToken,
}

impl ModuleCtx {
    pub fn new(
        descriptor: Arc<ModuleDescriptor>,
        config_provider: Arc<dyn ConfigProvider>,
        capabilities: CapabilityView,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            descriptor,
            config_provider,
            capabilities,
            cancel,
        }
    }

    pub fn module_id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    /// Capabilities registered so far; dependencies always come before us.
    pub fn capabilities(&self) -> &CapabilityView {
        &self.capabilities
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Typed module configuration.
    ///
    /// A module without a section (or with `config: null`) gets `T::default()`.
    /// Both `{ "config": {...} }` and a bare object are accepted.
    pub fn config<T: DeserializeOwned + Default>(&self) -> Result<T, ConfigError> {
        let Some(raw) = self.config_provider.get_module_config(self.module_id()) else {
            return Ok(T::default());
        };
        let section = match raw.get("config") {
            Some(inner) => inner,
            None => raw,
        };
        if section.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(section.clone()).map_err(|source| ConfigError::Invalid {
            module: self.module_id().to_string(),
            source,
        })
    }
}
