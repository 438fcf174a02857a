//! Local cache of watched objects, indexed by namespace.
//!
//! The informer is the only writer. Clones of an [`ObjectCache`] share the
//! same storage, so callers can hold a read handle for inspection.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use dashmap::DashMap;

use crate::events::LifecycleEvent;
use crate::object::{ObjectKey, SourceObject};

#[derive(Default)]
struct CacheInner {
    objects: DashMap<ObjectKey, SourceObject>,
    /// namespace -> object names
    by_namespace: DashMap<String, BTreeSet<String>>,
}

/// Shared, namespace-indexed object cache.
#[derive(Clone, Default)]
pub struct ObjectCache {
    inner: Arc<CacheInner>,
}

impl ObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an object, returning the previous revision if any.
    pub fn upsert(&self, obj: SourceObject) -> Option<SourceObject> {
        let namespace = obj.key.namespace.clone();
        let name = obj.key.name.clone();
        let old = self.inner.objects.insert(obj.key.clone(), obj);
        self.inner
            .by_namespace
            .entry(namespace)
            .or_default()
            .insert(name);
        old
    }

    /// Remove an object, returning its last cached state.
    pub fn remove(&self, key: &ObjectKey) -> Option<SourceObject> {
        let removed = self.inner.objects.remove(key).map(|(_, obj)| obj);
        if removed.is_some() {
            if let Some(mut names) = self.inner.by_namespace.get_mut(&key.namespace) {
                names.remove(&key.name);
            }
            self.inner
                .by_namespace
                .remove_if(&key.namespace, |_, names| names.is_empty());
        }
        removed
    }

    /// Replace the whole cache content with a fresh listing.
    ///
    /// Returns the events that bring a handler in line with the new state:
    /// `Added` for new keys, `Updated` for keys already cached and `Deleted`
    /// (with the last known state) for cached keys missing from `items`.
    pub fn replace(&self, items: Vec<SourceObject>) -> Vec<LifecycleEvent> {
        let mut events = Vec::with_capacity(items.len());
        let mut seen = HashSet::with_capacity(items.len());

        for obj in items {
            seen.insert(obj.key.clone());
            match self.upsert(obj.clone()) {
                Some(old) => events.push(LifecycleEvent::Updated { old, new: obj }),
                None => events.push(LifecycleEvent::Added(obj)),
            }
        }

        let mut stale: Vec<ObjectKey> = self
            .inner
            .objects
            .iter()
            .filter(|entry| !seen.contains(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        stale.sort();

        for key in stale {
            if let Some(obj) = self.remove(&key) {
                events.push(LifecycleEvent::Deleted(obj));
            }
        }

        events
    }

    pub fn get(&self, key: &ObjectKey) -> Option<SourceObject> {
        self.inner.objects.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.inner.objects.contains_key(key)
    }

    /// All cached objects, ordered by key.
    pub fn list(&self) -> Vec<SourceObject> {
        let mut objects: Vec<SourceObject> = self
            .inner
            .objects
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        objects
    }

    /// Namespaces that currently hold at least one object.
    pub fn namespaces(&self) -> Vec<String> {
        let mut namespaces: Vec<String> = self
            .inner
            .by_namespace
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        namespaces.sort();
        namespaces
    }

    pub fn len(&self) -> usize {
        self.inner.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.objects.is_empty()
    }
}

impl std::fmt::Debug for ObjectCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectCache")
            .field("objects", &self.len())
            .field("namespaces", &self.inner.by_namespace.len())
            .finish()
    }
}
