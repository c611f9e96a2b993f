use std::sync::Arc;

use crate::registry::ModuleRegistry;
use crate::sources::{InventorySource, ModuleSource};
use crate::FactoryCatalog;

#[test]
fn inventory_discovery_builds_without_registrations() {
    let sources: Vec<Arc<dyn ModuleSource>> = vec![Arc::new(InventorySource)];
    let registry = ModuleRegistry::discover(&sources);
    assert!(registry.is_ok(), "Registry should build successfully");
    assert!(registry.unwrap().issues().is_empty());
}

#[test]
fn inventory_catalog_matches_inventory_source() {
    let catalog = FactoryCatalog::from_inventory();
    let items = InventorySource.scan().unwrap();
    assert_eq!(catalog.len(), items.len());
}
