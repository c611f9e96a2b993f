use serde::{Deserialize, Serialize};

use crate::calculators::Calculator;

/// Configuration for the process_tools module
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessToolsConfig {
    #[serde(default = "default_calculators")]
    pub calculators: Vec<Calculator>,
    /// Datamodel class the calculators operate on.
    #[serde(default = "default_input_class")]
    pub input_class: String,
}

impl Default for ProcessToolsConfig {
    fn default() -> Self {
        Self {
            calculators: default_calculators(),
            input_class: default_input_class(),
        }
    }
}

fn default_calculators() -> Vec<Calculator> {
    vec![Calculator::Integrate, Calculator::Mean, Calculator::Peak]
}

fn default_input_class() -> String {
    "Curve".to_string()
}
