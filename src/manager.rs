//! Dependency manager: the public entry point of the engine.
//!
//! A [`DependencyManager`] owns the disk cache, the repository set, and the
//! collaborators for fetching, relocation, and host exposure. Each call to
//! [`DependencyManager::load`] fans the requested descriptors out over the
//! worker pool; every descriptor runs its own download, verify, cache,
//! relocate, and expose pipeline and the call blocks until all of them have
//! reached a terminal state.
//!
//! Loading the same descriptor from several threads is safe. A per-descriptor
//! gate makes sure only one pipeline runs for it, and later callers observe
//! the already loaded artifact.

use crate::cache::DiskCache;
use crate::config::EngineConfig;
use crate::descriptor::{Descriptor, expand_in_order, flatten_bundles};
use crate::download::{ArtefactFetcher, Downloader, HttpFetcher};
use crate::error::LoadError;
use crate::host::{HostScope, SearchPathHost};
use crate::isolation::{IsolatedContext, IsolatedContextCache};
use crate::pool::WorkerPool;
use crate::registry::{AutoLoadAll, LoadPolicy};
use crate::relocation::{RelocationStage, Relocator, UnconfiguredRelocator};
use crate::report::{LoadFailure, LoadOutcome, LoadReport, Stage};
use crate::repository::RepositorySet;
use crate::verification::{VerificationPolicy, verify};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, error, info};
use std::collections::{BTreeMap, HashMap};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};

/// Observable lifecycle of a descriptor within one manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    /// Never requested.
    Unrequested,
    /// Fetching from the repository set.
    Downloading,
    /// Checking the payload digest.
    Verifying,
    /// Rewriting symbol prefixes.
    Relocating,
    /// Ready for use.
    Loaded,
    /// The last attempt failed; a later `load` may retry.
    Failed,
}

#[derive(Debug, Clone)]
struct LoadedArtifact {
    path: Utf8PathBuf,
    exposed: bool,
}

impl LoadedArtifact {
    fn outcome(&self) -> LoadOutcome {
        LoadOutcome::Loaded {
            path: self.path.clone(),
            exposed: self.exposed,
        }
    }
}

/// Shared state reachable from worker jobs.
struct Pipeline {
    cache: DiskCache,
    repositories: RepositorySet,
    downloader: Downloader,
    relocation: RelocationStage,
    host: Arc<dyn HostScope>,
    policy: Arc<dyn LoadPolicy>,
    loaded: Mutex<HashMap<Descriptor, LoadedArtifact>>,
    states: Mutex<HashMap<Descriptor, LoadState>>,
    gates: Mutex<HashMap<Descriptor, Arc<Mutex<()>>>>,
    contexts: IsolatedContextCache,
}

impl Pipeline {
    fn loaded(&self, descriptor: &Descriptor) -> Option<LoadedArtifact> {
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(descriptor)
            .cloned()
    }

    fn state(&self, descriptor: &Descriptor) -> LoadState {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(descriptor)
            .copied()
            .unwrap_or(LoadState::Unrequested)
    }

    fn transition(&self, descriptor: &Descriptor, state: LoadState) {
        debug!("{descriptor}: {state:?}");
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(descriptor.clone(), state);
    }

    fn gate(&self, descriptor: &Descriptor) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(gates.entry(descriptor.clone()).or_default())
    }

    /// Drive `descriptor` to a terminal state, at most once at a time.
    fn run(&self, descriptor: &Descriptor) -> LoadOutcome {
        if let Some(artifact) = self.loaded(descriptor) {
            return artifact.outcome();
        }

        let gate = self.gate(descriptor);
        let _guard = gate.lock().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have finished while this one waited.
        if let Some(artifact) = self.loaded(descriptor) {
            return artifact.outcome();
        }

        match self.process(descriptor) {
            Ok(artifact) => {
                let outcome = artifact.outcome();
                self.loaded
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(descriptor.clone(), artifact);
                self.transition(descriptor, LoadState::Loaded);
                info!("loaded {descriptor}");
                outcome
            }
            Err(failure) => {
                self.transition(descriptor, LoadState::Failed);
                error!("{failure}");
                LoadOutcome::Failed(failure)
            }
        }
    }

    fn process(&self, descriptor: &Descriptor) -> Result<LoadedArtifact, LoadFailure> {
        let fail = |stage| {
            move |error| LoadFailure {
                descriptor: descriptor.clone(),
                stage,
                error,
            }
        };

        let downloaded = if self.cache.contains(descriptor) {
            debug!("cache hit for {descriptor}");
            self.cache.artifact_path(descriptor)
        } else {
            self.transition(descriptor, LoadState::Downloading);
            let payload = self
                .downloader
                .fetch_with_fallback(&self.repositories, descriptor)
                .map_err(fail(Stage::Download))?;

            let payload = if VerificationPolicy::for_descriptor(descriptor).requires_checksum() {
                self.transition(descriptor, LoadState::Verifying);
                verify(payload, descriptor).map_err(fail(Stage::Verify))?
            } else {
                debug!("{descriptor} is a snapshot; skipping verification");
                payload
            };

            self.cache
                .store(descriptor, &payload)
                .map_err(fail(Stage::Cache))?
        };

        if !descriptor.relocations().is_empty() {
            self.transition(descriptor, LoadState::Relocating);
        }
        let path = self
            .relocation
            .apply(&self.cache, descriptor, &downloaded)
            .map_err(fail(Stage::Relocate))?;

        let exposed = if self.policy.should_auto_load(descriptor) {
            self.host
                .expose(&path)
                .map_err(|e| LoadError::HostExposure {
                    descriptor: descriptor.to_string(),
                    reason: e.to_string(),
                })
                .map_err(fail(Stage::Expose))?;
            true
        } else {
            debug!("holding {descriptor} back from the host scope");
            false
        };

        Ok(LoadedArtifact { path, exposed })
    }
}

/// Loads descriptors and hands out isolated contexts over them.
pub struct DependencyManager {
    pipeline: Arc<Pipeline>,
    pool: WorkerPool,
}

impl DependencyManager {
    /// Start building a manager around an opened cache and an owned pool.
    #[must_use]
    pub fn builder(cache: DiskCache, pool: WorkerPool) -> DependencyManagerBuilder {
        DependencyManagerBuilder {
            cache,
            pool,
            repositories: RepositorySet::provided(),
            fetcher: None,
            relocator: Arc::new(UnconfiguredRelocator),
            host: Arc::new(SearchPathHost::default()),
            policy: Arc::new(AutoLoadAll),
        }
    }

    /// Prepare a builder from loaded configuration.
    ///
    /// The cache, repositories, HTTP settings, and relocator come from
    /// `config`; host and policy keep their defaults until overridden.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::CacheDirectoryUnavailable`] if the configured
    /// cache root cannot be used.
    pub fn configure(
        config: &EngineConfig,
        pool: WorkerPool,
    ) -> Result<DependencyManagerBuilder, LoadError> {
        let cache = DiskCache::open(config.cache_dir())?;
        Ok(Self::builder(cache, pool)
            .repositories(config.repository_set())
            .fetcher(Arc::new(HttpFetcher::new(&config.http_settings())))
            .relocator(config.relocator()))
    }

    /// Load `descriptors` and their bundled dependencies.
    ///
    /// Blocks until every descriptor has either loaded or failed. Failures
    /// are isolated: one descriptor failing never prevents another from
    /// loading.
    #[must_use]
    pub fn load(&self, descriptors: &[Descriptor]) -> LoadReport {
        let batch = expand_in_order(descriptors);
        let mut slots: Vec<Option<LoadOutcome>> = Vec::with_capacity(batch.len());
        let (tx, rx) = mpsc::channel();

        for (index, descriptor) in batch.iter().enumerate() {
            if let Some(artifact) = self.pipeline.loaded(descriptor) {
                slots.push(Some(artifact.outcome()));
                continue;
            }
            slots.push(None);

            let pipeline = Arc::clone(&self.pipeline);
            let job_descriptor = descriptor.clone();
            let tx = tx.clone();
            let submitted = self.pool.execute(move || {
                let outcome = pipeline.run(&job_descriptor);
                if tx.send((index, outcome)).is_err() {
                    debug!("load batch for {job_descriptor} was abandoned");
                }
            });

            if submitted.is_err() {
                error!("cannot schedule {descriptor}: worker pool is shut down");
                if let Some(slot) = slots.last_mut() {
                    *slot = Some(schedule_failure(descriptor, LoadError::PoolUnavailable {
                        descriptor: descriptor.to_string(),
                    }));
                }
            }
        }
        drop(tx);

        for (index, outcome) in rx {
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(outcome);
            }
        }

        let outcomes = batch
            .into_iter()
            .zip(slots)
            .map(|(descriptor, slot)| {
                let outcome = slot.unwrap_or_else(|| {
                    schedule_failure(&descriptor, LoadError::Aborted {
                        descriptor: descriptor.to_string(),
                    })
                });
                (descriptor, outcome)
            })
            .collect();
        LoadReport::from_outcomes(outcomes)
    }

    /// Return the isolated context for `descriptors` and everything they
    /// bundle.
    ///
    /// Requests for the same flattened set share one context.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::IsolatedContextPrecondition`] naming the first
    /// member that has not been loaded by this manager.
    pub fn obtain_isolated_context(
        &self,
        descriptors: &[Descriptor],
    ) -> Result<Arc<IsolatedContext>, LoadError> {
        let wanted = flatten_bundles(descriptors);
        let mut members = BTreeMap::new();
        {
            let loaded = self
                .pipeline
                .loaded
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            for descriptor in wanted {
                let Some(artifact) = loaded.get(&descriptor) else {
                    let err = LoadError::IsolatedContextPrecondition {
                        descriptor: descriptor.to_string(),
                    };
                    error!("{err}");
                    return Err(err);
                };
                let path = artifact.path.clone();
                members.insert(descriptor, path);
            }
        }
        Ok(self.pipeline.contexts.get_or_create(members))
    }

    /// Current lifecycle state of `descriptor`.
    #[must_use]
    pub fn state(&self, descriptor: &Descriptor) -> LoadState {
        self.pipeline.state(descriptor)
    }

    /// Whether `descriptor` has been loaded by this manager.
    #[must_use]
    pub fn is_loaded(&self, descriptor: &Descriptor) -> bool {
        self.pipeline.loaded(descriptor).is_some()
    }

    /// The file a loaded `descriptor` is consumed from.
    #[must_use]
    pub fn loaded_path(&self, descriptor: &Descriptor) -> Option<Utf8PathBuf> {
        self.pipeline.loaded(descriptor).map(|a| a.path)
    }

    /// The disk cache backing this manager.
    #[must_use]
    pub fn cache_root(&self) -> &Utf8Path {
        self.pipeline.cache.root()
    }

    /// Number of distinct isolated contexts handed out so far.
    #[must_use]
    pub fn isolated_context_count(&self) -> usize {
        self.pipeline.contexts.len()
    }

    /// Stop the worker pool after in-flight loads finish.
    pub fn shutdown(mut self) {
        self.pool.shutdown();
    }
}

fn schedule_failure(descriptor: &Descriptor, error: LoadError) -> LoadOutcome {
    LoadOutcome::Failed(LoadFailure {
        descriptor: descriptor.clone(),
        stage: Stage::Schedule,
        error,
    })
}

/// Collaborator wiring for a [`DependencyManager`].
pub struct DependencyManagerBuilder {
    cache: DiskCache,
    pool: WorkerPool,
    repositories: RepositorySet,
    fetcher: Option<Arc<dyn ArtefactFetcher>>,
    relocator: Arc<dyn Relocator>,
    host: Arc<dyn HostScope>,
    policy: Arc<dyn LoadPolicy>,
}

impl DependencyManagerBuilder {
    /// Replace the repository set.
    #[must_use]
    pub fn repositories(mut self, repositories: RepositorySet) -> Self {
        self.repositories = repositories;
        self
    }

    /// Use `fetcher` instead of the default HTTP client.
    #[must_use]
    pub fn fetcher(mut self, fetcher: Arc<dyn ArtefactFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Use `relocator` for descriptors with relocation rules.
    #[must_use]
    pub fn relocator(mut self, relocator: Arc<dyn Relocator>) -> Self {
        self.relocator = relocator;
        self
    }

    /// Expose auto-loaded artifacts through `host`.
    #[must_use]
    pub fn host(mut self, host: Arc<dyn HostScope>) -> Self {
        self.host = host;
        self
    }

    /// Decide per descriptor whether it is exposed to the host.
    #[must_use]
    pub fn policy(mut self, policy: Arc<dyn LoadPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Finish wiring.
    #[must_use]
    pub fn build(self) -> DependencyManager {
        let fetcher = self
            .fetcher
            .unwrap_or_else(|| Arc::new(HttpFetcher::default()));
        let pipeline = Pipeline {
            cache: self.cache,
            repositories: self.repositories,
            downloader: Downloader::new(fetcher),
            relocation: RelocationStage::new(self.relocator),
            host: self.host,
            policy: self.policy,
            loaded: Mutex::default(),
            states: Mutex::default(),
            gates: Mutex::default(),
            contexts: IsolatedContextCache::new(),
        };
        DependencyManager {
            pipeline: Arc::new(pipeline),
            pool: self.pool,
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
