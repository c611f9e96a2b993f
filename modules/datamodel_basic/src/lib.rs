//! Basic datamodel: a catalog of data classes other modules build on.

// === MODULE DEFINITION ===
pub mod module;
pub use module::{descriptor, DatamodelBasic, MODULE_ID};

// === INTERNAL MODULES ===
#[doc(hidden)]
pub mod catalog;
#[doc(hidden)]
pub mod config;

pub use catalog::{CatalogError, ClassCatalog};
