//! In-process object store with list/watch support.
//!
//! Every successful mutation bumps a global revision, is appended to the
//! change history and broadcast to open watches. Watches opened at an older
//! revision first replay the history after that revision, then follow the
//! live broadcast. The history keeps as many entries as the broadcast buffer;
//! older entries are compacted away and watches from before them must relist.
//!
//! # Example
//!
//! ```ignore
//! let store = MemoryObjectStore::new_shared();
//! store.create(SourceObject::new("default", "dashboards"))?;
//!
//! let informer = Informer::new(store.clone(), handler);
//! tokio::spawn(informer.run(cancel.child_token()));
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::StoreError;
use crate::object::{ObjectKey, SourceObject};
use crate::store::{ObjectList, ObjectStore, WatchEvent, WatchStream};

/// Default buffer size for the watch broadcast channel and the replay history.
/// Watches that fall further behind are terminated with an expired error.
const DEFAULT_BUFFER_SIZE: usize = 1024;

#[derive(Default)]
struct MemoryState {
    objects: BTreeMap<ObjectKey, SourceObject>,
    revision: u64,
    /// Revisions at or below this one are no longer replayable.
    compacted: u64,
    history: VecDeque<(u64, WatchEvent)>,
}

/// Object store kept entirely in memory.
pub struct MemoryObjectStore {
    state: Mutex<MemoryState>,
    sender: broadcast::Sender<(u64, WatchEvent)>,
    history_limit: usize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    /// Create a store whose live watch buffer and replay history each hold
    /// `capacity` events.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            state: Mutex::new(MemoryState::default()),
            sender,
            history_limit: capacity,
        }
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::internal("memory store state poisoned"))
    }

    /// Create an object. Fails with status 409 if the key already exists.
    pub fn create(&self, obj: SourceObject) -> Result<SourceObject, StoreError> {
        let mut state = self.state()?;
        if state.objects.contains_key(&obj.key) {
            return Err(StoreError::status(409, format!("{} already exists", obj.key)));
        }
        Ok(self.commit_upsert(&mut state, obj, true))
    }

    /// Replace an existing object. Fails with status 404 if it does not exist.
    pub fn update(&self, obj: SourceObject) -> Result<SourceObject, StoreError> {
        let mut state = self.state()?;
        if !state.objects.contains_key(&obj.key) {
            return Err(StoreError::status(404, format!("{} not found", obj.key)));
        }
        Ok(self.commit_upsert(&mut state, obj, false))
    }

    /// Create or replace an object.
    pub fn apply(&self, obj: SourceObject) -> Result<SourceObject, StoreError> {
        let mut state = self.state()?;
        let created = !state.objects.contains_key(&obj.key);
        Ok(self.commit_upsert(&mut state, obj, created))
    }

    /// Delete an object. Fails with status 404 if it does not exist.
    pub fn delete(&self, key: &ObjectKey) -> Result<SourceObject, StoreError> {
        let mut state = self.state()?;
        let Some(mut obj) = state.objects.remove(key) else {
            return Err(StoreError::status(404, format!("{key} not found")));
        };
        state.revision += 1;
        obj.resource_version = Some(state.revision.to_string());
        self.emit(&mut state, WatchEvent::Deleted(obj.clone()));
        Ok(obj)
    }

    /// Drop the change history. Watches from older revisions must relist.
    pub fn compact(&self) -> Result<(), StoreError> {
        let mut state = self.state()?;
        state.compacted = state.revision;
        state.history.clear();
        debug!(revision = state.revision, "Compacted memory store history");
        Ok(())
    }

    /// Number of open watches.
    pub fn watcher_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn commit_upsert(
        &self,
        state: &mut MemoryState,
        mut obj: SourceObject,
        created: bool,
    ) -> SourceObject {
        state.revision += 1;
        obj.resource_version = Some(state.revision.to_string());
        state.objects.insert(obj.key.clone(), obj.clone());
        let event = if created {
            WatchEvent::Added(obj.clone())
        } else {
            WatchEvent::Modified(obj.clone())
        };
        self.emit(state, event);
        obj
    }

    /// Record and broadcast an event. Called with the state lock held so that
    /// watch registration cannot interleave with a mutation.
    fn emit(&self, state: &mut MemoryState, event: WatchEvent) {
        let revision = state.revision;
        state.history.push_back((revision, event.clone()));
        while state.history.len() > self.history_limit {
            if let Some((dropped, _)) = state.history.pop_front() {
                state.compacted = dropped;
            }
        }
        let count = self.sender.send((revision, event)).unwrap_or_default();
        debug!(revision, watchers = count, "Emitted watch event");
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn list(&self) -> Result<ObjectList, StoreError> {
        let state = self.state()?;
        Ok(ObjectList {
            resource_version: state.revision.to_string(),
            items: state.objects.values().cloned().collect(),
        })
    }

    async fn watch(&self, resource_version: &str) -> Result<WatchStream, StoreError> {
        let from: u64 = resource_version.parse().map_err(|_| {
            StoreError::decode(format!("invalid resource version '{resource_version}'"))
        })?;

        let state = self.state()?;
        if from < state.compacted {
            return Err(StoreError::expired(format!(
                "resource version {from} is older than compacted revision {}",
                state.compacted
            )));
        }

        let backlog: Vec<Result<WatchEvent, StoreError>> = state
            .history
            .iter()
            .filter(|(revision, _)| *revision > from)
            .map(|(_, event)| Ok(event.clone()))
            .collect();
        let receiver = self.sender.subscribe();
        drop(state);

        let live = stream::unfold(Some(receiver), |receiver| async move {
            let mut receiver = receiver?;
            match receiver.recv().await {
                Ok((_, event)) => Some((Ok(event), Some(receiver))),
                Err(broadcast::error::RecvError::Lagged(missed)) => Some((
                    Err(StoreError::expired(format!("watch lagged, missed {missed} events"))),
                    None,
                )),
                Err(broadcast::error::RecvError::Closed) => None,
            }
        });

        Ok(stream::iter(backlog).chain(live).boxed())
    }
}

impl std::fmt::Debug for MemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let revision = self.state.lock().map(|state| state.revision).ok();
        f.debug_struct("MemoryObjectStore")
            .field("revision", &revision)
            .field("history_limit", &self.history_limit)
            .field("watchers", &self.watcher_count())
            .finish()
    }
}
