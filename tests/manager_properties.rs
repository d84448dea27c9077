//! Property-style integration tests for the dependency manager.

mod support;

use hoist::LoadError;
use hoist::descriptor::{Descriptor, Relocation};
use hoist::download::ArtefactFetcher;
use hoist::manager::{DependencyManager, LoadState};
use hoist::pool::WorkerPool;
use hoist::relocation::Relocator;
use hoist::report::Stage;
use hoist::repository::{Repository, RepositorySet};
use rstest::{fixture, rstest};
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use support::{
    CopyRelocator, StubFetcher, TempCache, bundling, payload_for, relocated, relocated_with,
    release, release_url,
};

const BASE: &str = "https://central.test/";

#[fixture]
fn temp() -> TempCache {
    TempCache::new()
}

fn serving(artifacts: &[&str]) -> Arc<StubFetcher> {
    let fetcher = StubFetcher::default();
    for artifact in artifacts {
        fetcher.serve(release_url(BASE, artifact), payload_for(artifact));
    }
    Arc::new(fetcher)
}

fn manager_with(
    temp: &TempCache,
    fetcher: &Arc<StubFetcher>,
    relocator: Arc<dyn Relocator>,
) -> DependencyManager {
    DependencyManager::builder(
        temp.cache.clone(),
        WorkerPool::new(4).expect("pool starts"),
    )
    .repositories(RepositorySet::new([Repository::new("central", BASE, 1)]))
    .fetcher(Arc::clone(fetcher) as Arc<dyn ArtefactFetcher>)
    .relocator(relocator)
    .build()
}

fn manager(temp: &TempCache, fetcher: &Arc<StubFetcher>) -> DependencyManager {
    manager_with(temp, fetcher, Arc::new(CopyRelocator::default()))
}

#[rstest]
fn loading_twice_downloads_once(temp: TempCache) {
    let lib = release("lib");
    let fetcher = serving(&["lib"]);
    let manager = manager(&temp, &fetcher);

    assert!(manager.load(&[lib.clone()]).is_success());
    assert!(manager.load(&[lib.clone()]).is_success());

    assert_eq!(fetcher.calls_to(&release_url(BASE, "lib")), 1);
    assert_eq!(manager.state(&lib), LoadState::Loaded);
}

#[rstest]
fn relocated_artifact_is_reused_by_a_later_manager(temp: TempCache) {
    let lib = relocated("lib");
    let fetcher = serving(&["lib"]);
    let first_relocator = Arc::new(CopyRelocator::default());

    let first = manager_with(&temp, &fetcher, Arc::clone(&first_relocator) as Arc<dyn Relocator>);
    assert!(first.load(&[lib.clone()]).is_success());
    first.shutdown();
    assert_eq!(first_relocator.invocations(), 1);

    let second_relocator = Arc::new(CopyRelocator::default());
    let second = manager_with(&temp, &fetcher, Arc::clone(&second_relocator) as Arc<dyn Relocator>);
    assert!(second.load(&[lib.clone()]).is_success());

    assert_eq!(second_relocator.invocations(), 0);
    assert_eq!(fetcher.calls().len(), 1);
    assert_eq!(
        second.loaded_path(&lib),
        Some(temp.cache.remapped_path(&lib))
    );
}

#[rstest]
fn a_coordinate_is_relocated_under_one_rule_set_only(temp: TempCache) {
    let alpha = relocated_with("lib", Relocation::new("org.alpha", "shaded"));
    let beta = relocated_with("lib", Relocation::new("org.beta", "shaded"));
    assert_ne!(alpha, beta);
    let fetcher = serving(&["lib"]);
    let relocator = Arc::new(CopyRelocator::default());
    let manager = manager_with(&temp, &fetcher, Arc::clone(&relocator) as Arc<dyn Relocator>);

    assert!(manager.load(&[alpha.clone()]).is_success());
    let report = manager.load(&[beta.clone()]);

    let failure = report.failures().next().expect("second rule set refused");
    assert_eq!(failure.descriptor, beta);
    assert_eq!(failure.stage, Stage::Relocate);
    assert!(matches!(failure.error, LoadError::RelocationFailure { .. }));
    assert_eq!(relocator.invocations(), 1);
    assert_eq!(manager.state(&beta), LoadState::Failed);
    assert_eq!(
        manager.loaded_path(&alpha),
        Some(temp.cache.remapped_path(&alpha))
    );
}

#[rstest]
fn isolated_contexts_are_keyed_by_descriptor_set(temp: TempCache) {
    let d1 = release("one");
    let d2 = release("two");
    let d3 = release("three");
    let fetcher = serving(&["one", "two", "three"]);
    let manager = manager(&temp, &fetcher);
    assert!(manager.load(&[d1.clone(), d2.clone(), d3.clone()]).is_success());

    let forward = manager
        .obtain_isolated_context(&[d1.clone(), d2.clone()])
        .expect("loaded");
    let reversed = manager
        .obtain_isolated_context(&[d2.clone(), d1.clone()])
        .expect("loaded");
    let other = manager
        .obtain_isolated_context(&[d1.clone(), d3.clone()])
        .expect("loaded");

    assert!(Arc::ptr_eq(&forward, &reversed));
    assert!(!Arc::ptr_eq(&forward, &other));
    assert_eq!(manager.isolated_context_count(), 2);
}

#[rstest]
fn bundles_are_loaded_and_flattened(temp: TempCache) {
    let g = release("g");
    let e = bundling("e", &[g.clone()]);
    let f = release("f");
    let d = bundling("d", &[e.clone(), f.clone()]);
    let fetcher = serving(&["d", "e", "f", "g"]);
    let manager = manager(&temp, &fetcher);

    let report = manager.load(&[d.clone()]);

    let order: Vec<&str> = report
        .outcomes()
        .iter()
        .map(|(descriptor, _)| descriptor.artifact())
        .collect();
    assert_eq!(order, ["d", "e", "g", "f"]);
    assert!(report.is_success());

    let context = manager
        .obtain_isolated_context(&[d.clone()])
        .expect("closure loaded");
    assert_eq!(context.len(), 4);
    for member in [&d, &e, &f, &g] {
        assert!(context.contains(member), "{member} missing");
    }
}

#[rstest]
fn cache_hits_are_trusted_without_reverification(temp: TempCache) {
    let lib = release("lib");
    temp.cache
        .store(&lib, b"not the pinned bytes")
        .expect("seed cache");
    let fetcher = serving(&[]);
    let manager = manager(&temp, &fetcher);

    let report = manager.load(&[lib.clone()]);

    assert!(report.is_success());
    assert!(fetcher.calls().is_empty());
    let cached = fs::read(temp.cache.artifact_path(&lib)).expect("cached file");
    assert_eq!(cached, b"not the pinned bytes");
}

#[rstest]
fn concurrent_requests_download_once(temp: TempCache) {
    let lib = release("lib");
    let fetcher = Arc::new(StubFetcher::with_delay(Duration::from_millis(50)));
    fetcher.serve(release_url(BASE, "lib"), payload_for("lib"));
    let manager = manager(&temp, &fetcher);

    thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| manager.load(&[lib.clone()]).is_success()))
            .collect();
        for handle in handles {
            assert!(handle.join().expect("loader thread"));
        }
    });

    assert_eq!(fetcher.calls_to(&release_url(BASE, "lib")), 1);
}

#[rstest]
fn one_failure_does_not_block_the_batch(temp: TempCache) {
    let good = release("good");
    let missing = release("missing");
    let fetcher = serving(&["good"]);
    let manager = manager(&temp, &fetcher);

    let report = manager.load(&[missing.clone(), good.clone()]);

    assert!(!report.is_success());
    assert!(manager.is_loaded(&good));
    assert_eq!(manager.state(&missing), LoadState::Failed);
    let err = manager
        .obtain_isolated_context(&[good, missing])
        .expect_err("missing is not loaded");
    assert!(matches!(err, LoadError::IsolatedContextPrecondition { .. }));
}

#[rstest]
fn unrequested_descriptor_reports_unrequested(temp: TempCache) {
    let manager = manager(&temp, &serving(&[]));
    let never: Descriptor = release("never");
    assert_eq!(manager.state(&never), LoadState::Unrequested);
    assert!(!manager.is_loaded(&never));
}
