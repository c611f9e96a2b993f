use crate::config::AppConfig;
use std::sync::Arc;

/// Read access to loaded configuration, keyed by module id or section name.
pub trait ConfigProvider: Send + Sync {
    /// Raw configuration of a single module (`modules.<id>`).
    fn get_module_config(&self, module_id: &str) -> Option<&serde_json::Value>;

    /// A top-level section (`host`, `logging`) as JSON.
    fn get_config_raw(&self, key: &str) -> Option<serde_json::Value>;
}

/// `ConfigProvider` backed by an `AppConfig`.
#[derive(Clone)]
pub struct AppConfigProvider(Arc<AppConfig>);

impl AppConfigProvider {
    pub fn new(config: AppConfig) -> Self {
        Self(Arc::new(config))
    }
}

impl ConfigProvider for AppConfigProvider {
    fn get_module_config(&self, module_id: &str) -> Option<&serde_json::Value> {
        self.0.modules.get(module_id)
    }

    fn get_config_raw(&self, key: &str) -> Option<serde_json::Value> {
        match key {
            "host" => serde_json::to_value(&self.0.host).ok(),
            "logging" => self
                .0
                .logging
                .as_ref()
                .and_then(|v| serde_json::to_value(v).ok()),
            _ => None,
        }
    }
}
