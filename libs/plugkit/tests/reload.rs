//! Reload: the new generation is swapped in atomically, the old one finalized.

use std::fs;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;

use plugkit::{
    ActivationSource, Capability, FactoryCatalog, Module, ModuleCtx, ModuleDescriptor, ModuleHost,
    StaticSource,
};

type Journal = Arc<Mutex<Vec<String>>>;

struct Tracked {
    name: String,
    journal: Journal,
}

#[async_trait]
impl Module for Tracked {
    async fn init(&self, _ctx: &ModuleCtx) -> Result<()> {
        // give concurrent readers a chance to run mid-activation
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.journal.lock().push(format!("init:{}", self.name));
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.journal.lock().push(format!("stop:{}", self.name));
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

fn tracked_catalog(ids: &[&str], journal: &Journal) -> FactoryCatalog {
    let catalog = FactoryCatalog::new();
    for id in ids {
        let journal = journal.clone();
        let id = id.to_string();
        let generation = Arc::new(AtomicUsize::new(0));
        catalog.register(id.clone(), move || {
            let n = generation.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Arc::new(Tracked {
                name: format!("{id}#{n}"),
                journal: journal.clone(),
            }) as Arc<dyn Module>)
        });
    }
    catalog
}

fn build_host(dir: &std::path::Path, journal: &Journal) -> ModuleHost {
    ModuleHost::builder()
        .source(Arc::new(StaticSource::new([
            ModuleDescriptor::new("a").with_capability(Capability::Process),
            ModuleDescriptor::new("b")
                .with_capability(Capability::Process)
                .depends_on("a"),
        ])))
        .activation(ActivationSource::File(dir.join("_exclude.json")))
        .factories(tracked_catalog(&["a", "b"], journal))
        .options(plugkit::LoaderOptions {
            parallel: false,
            ..Default::default()
        })
        .build()
}

#[tokio::test]
async fn reload_rereads_activation_file_and_finalizes_previous_generation() {
    let dir = tempfile::tempdir().unwrap();
    let journal: Journal = Arc::default();
    let host = build_host(dir.path(), &journal);

    let first = host.start().await.unwrap();
    assert_eq!(first.generation, 1);
    assert_eq!(host.module_ids(), ["a", "b"]);

    fs::write(dir.path().join("_exclude.json"), r#"{"modules": [{"id": "b"}]}"#).unwrap();
    let second = host.reload().await.unwrap();

    assert_eq!(second.generation, 2);
    assert_eq!(host.module_ids(), ["a"]);
    assert_eq!(second.resolved.rejected["b"].code(), "excluded by policy");

    // a reader holding the old snapshot keeps a consistent view of it
    assert_eq!(first.capabilities().providers_of(Capability::Process), ["a", "b"]);
    assert!(first.activation.is_finalized());
    assert!(!second.activation.is_finalized());

    assert_eq!(
        journal.lock().clone(),
        ["init:a#1", "init:b#1", "init:a#2", "stop:b#1", "stop:a#1"]
    );

    host.shutdown().await;
    assert_eq!(journal.lock().last().map(String::as_str), Some("stop:a#2"));
}

#[tokio::test]
async fn readers_never_see_a_mixed_generation() {
    let dir = tempfile::tempdir().unwrap();
    let journal: Journal = Arc::default();
    let host = Arc::new(build_host(dir.path(), &journal));
    host.start().await.unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let host = host.clone();
        let done = done.clone();
        tokio::spawn(async move {
            let mut observed = 0usize;
            while !done.load(Ordering::SeqCst) {
                let snap = host.snapshot();
                let providers = snap.capabilities().providers_of(Capability::Process).to_vec();
                // whatever generation we got, its registry matches its own resolution
                assert_eq!(providers, snap.resolved.ordered);
                observed += 1;
                tokio::task::yield_now().await;
            }
            observed
        })
    };

    for round in 0..4 {
        let body = if round % 2 == 0 {
            r#"{"modules": [{"id": "b"}]}"#
        } else {
            r#"{"modules": []}"#
        };
        fs::write(dir.path().join("_exclude.json"), body).unwrap();
        host.reload().await.unwrap();
    }
    done.store(true, Ordering::SeqCst);

    let observed = reader.await.unwrap();
    assert!(observed > 0);
    assert_eq!(host.snapshot().generation, 5);
    assert_eq!(host.module_ids(), ["a", "b"]);
}

#[tokio::test]
async fn failed_discovery_keeps_current_generation() {
    let dir = tempfile::tempdir().unwrap();
    let not_a_dir = dir.path().join("modules");
    fs::write(&not_a_dir, "file, not a directory").unwrap();

    let host = ModuleHost::builder()
        .source(Arc::new(plugkit::ManifestDirSource::new(&not_a_dir)))
        .build();
    let err = host.start().await.unwrap_err();
    assert!(matches!(err, plugkit::HostError::Discovery(_)));
    assert_eq!(host.snapshot().generation, 0);
}
