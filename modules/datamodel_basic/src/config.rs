use serde::{Deserialize, Serialize};

/// Configuration for the datamodel_basic module
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatamodelConfig {
    /// Data classes registered at init.
    #[serde(default = "default_classes")]
    pub classes: Vec<String>,
    /// File extension of project packages.
    #[serde(default = "default_project_extension")]
    pub project_extension: String,
}

impl Default for DatamodelConfig {
    fn default() -> Self {
        Self {
            classes: default_classes(),
            project_extension: default_project_extension(),
        }
    }
}

fn default_classes() -> Vec<String> {
    ["Table", "Curve", "Image"].map(String::from).to_vec()
}

fn default_project_extension() -> String {
    "plk".to_string()
}
