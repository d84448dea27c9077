//! Isolated load contexts keyed by descriptor set.
//!
//! An [`IsolatedContext`] is a private resolution boundary holding exactly
//! one frozen set of loaded artifacts. It never touches the host's ambient
//! scope. The [`IsolatedContextCache`] hands out one shared context per
//! distinct flattened descriptor set, so asking twice for the same set (in
//! any order) yields the same instance.

use crate::descriptor::Descriptor;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A sandboxed resolution scope over a fixed set of artifacts.
#[derive(Debug)]
pub struct IsolatedContext {
    id: u64,
    members: BTreeMap<Descriptor, Utf8PathBuf>,
}

impl IsolatedContext {
    fn new(members: BTreeMap<Descriptor, Utf8PathBuf>) -> Self {
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            members,
        }
    }

    /// Process-unique identifier, for diagnostics.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Whether `descriptor` is a member of this context.
    #[must_use]
    pub fn contains(&self, descriptor: &Descriptor) -> bool {
        self.members.contains_key(descriptor)
    }

    /// The artifact file backing `descriptor` in this context.
    #[must_use]
    pub fn path_of(&self, descriptor: &Descriptor) -> Option<&Utf8Path> {
        self.members.get(descriptor).map(Utf8PathBuf::as_path)
    }

    /// Find the single member named by `query`.
    ///
    /// `query` is either a bare artifact identifier or a full
    /// `group:artifact:version` coordinate. Returns `None` when nothing
    /// matches and when more than one member does, as happens when two
    /// versions of one artifact are bundled into the same context.
    #[must_use]
    pub fn locate(&self, query: &str) -> Option<(&Descriptor, &Utf8Path)> {
        let mut matches = self
            .members
            .iter()
            .filter(|(d, _)| d.artifact() == query || d.coordinate() == query);
        let found = matches.next()?;
        if matches.next().is_some() {
            debug!("{query} names more than one member of context {}", self.id);
            return None;
        }
        Some((found.0, found.1.as_path()))
    }

    /// Member descriptors, in canonical order.
    pub fn descriptors(&self) -> impl Iterator<Item = &Descriptor> {
        self.members.keys()
    }

    /// Member artifact files, in canonical descriptor order.
    pub fn paths(&self) -> impl Iterator<Item = &Utf8Path> {
        self.members.values().map(Utf8PathBuf::as_path)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the context has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Table of isolated contexts keyed by their exact member set.
#[derive(Debug, Default)]
pub struct IsolatedContextCache {
    contexts: Mutex<HashMap<BTreeSet<Descriptor>, Arc<IsolatedContext>>>,
}

impl IsolatedContextCache {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the context for `members`, creating it on first request.
    ///
    /// The key is the descriptor set alone; `members` supplies the artifact
    /// paths only when a new context is created.
    pub fn get_or_create(
        &self,
        members: BTreeMap<Descriptor, Utf8PathBuf>,
    ) -> Arc<IsolatedContext> {
        let key: BTreeSet<Descriptor> = members.keys().cloned().collect();
        let mut contexts = self.contexts.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(contexts.entry(key).or_insert_with(|| {
            let context = IsolatedContext::new(members);
            debug!(
                "created isolated context {} with {} members",
                context.id(),
                context.len()
            );
            Arc::new(context)
        }))
    }

    /// Number of distinct contexts created.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no context has been created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Sha256Checksum;

    fn descriptor(artifact: &str) -> Descriptor {
        Descriptor::builder()
            .group("org.example")
            .artifact(artifact)
            .version("1.0")
            .checksum(Sha256Checksum::compute(artifact.as_bytes()))
            .build()
            .expect("valid descriptor")
    }

    fn members(artifacts: &[&str]) -> BTreeMap<Descriptor, Utf8PathBuf> {
        artifacts
            .iter()
            .map(|a| (descriptor(a), Utf8PathBuf::from(format!("/cache/{a}-1.0.jar"))))
            .collect()
    }

    #[test]
    fn same_set_yields_same_context() {
        let cache = IsolatedContextCache::new();
        let first = cache.get_or_create(members(&["a", "b"]));
        let second = cache.get_or_create(members(&["b", "a"]));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn different_sets_yield_different_contexts() {
        let cache = IsolatedContextCache::new();
        let first = cache.get_or_create(members(&["a", "b"]));
        let second = cache.get_or_create(members(&["a", "c"]));
        assert!(!Arc::ptr_eq(&first, &second));
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn existing_context_keeps_its_original_paths() {
        let cache = IsolatedContextCache::new();
        let first = cache.get_or_create(members(&["a"]));
        let mut moved = BTreeMap::new();
        moved.insert(descriptor("a"), Utf8PathBuf::from("/elsewhere/a.jar"));
        let second = cache.get_or_create(moved);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            second.path_of(&descriptor("a")),
            Some(Utf8Path::new("/cache/a-1.0.jar"))
        );
    }

    #[test]
    fn locate_finds_member_by_artifact() {
        let cache = IsolatedContextCache::new();
        let context = cache.get_or_create(members(&["driver", "helper"]));
        let (found, path) = context.locate("helper").expect("member present");
        assert_eq!(found, &descriptor("helper"));
        assert_eq!(path, Utf8Path::new("/cache/helper-1.0.jar"));
        assert!(context.locate("absent").is_none());
        assert_eq!(context.paths().count(), 2);
    }

    #[test]
    fn locate_refuses_an_ambiguous_artifact_id() {
        let older = descriptor("helper");
        let newer = Descriptor::builder()
            .group("org.example")
            .artifact("helper")
            .version("2.0")
            .checksum(Sha256Checksum::compute(b"helper 2"))
            .build()
            .expect("valid descriptor");
        let mut both = BTreeMap::new();
        both.insert(older.clone(), Utf8PathBuf::from("/cache/helper-1.0.jar"));
        both.insert(newer.clone(), Utf8PathBuf::from("/cache/helper-2.0.jar"));
        let context = IsolatedContextCache::new().get_or_create(both);

        assert!(context.locate("helper").is_none());
        let (found, path) = context
            .locate("org.example:helper:2.0")
            .expect("coordinate is unique");
        assert_eq!(found, &newer);
        assert_eq!(path, Utf8Path::new("/cache/helper-2.0.jar"));
    }
}
