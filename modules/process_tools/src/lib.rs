//! Calculators over datamodel curves, with an extended MDI tool window.

// === MODULE DEFINITION ===
pub mod module;
pub use module::{descriptor, ProcessTools, MODULE_ID};

// === INTERNAL MODULES ===
#[doc(hidden)]
pub mod calculators;
#[doc(hidden)]
pub mod config;

pub use calculators::{Calculator, ToolError};
