//! # dashwatch-core
//!
//! Object model, lifecycle events and the list/watch informer shared by the
//! dashwatch crates.
//!
//! ## Overview
//!
//! - [`SourceObject`]: a watched configuration object (namespace, name,
//!   annotations, data entries)
//! - [`ObjectStore`]: list/watch access to a backing store
//! - [`Informer`]: turns list/watch into ordered [`LifecycleEvent`]s, keeps an
//!   [`ObjectCache`], resyncs periodically and reconnects with backoff
//! - [`ObjectEventHandler`]: the `on_add` / `on_update` / `on_delete` receiver
//! - [`MemoryObjectStore`]: in-process store used by tests and local runs
//!
//! ## Example
//!
//! ```ignore
//! use dashwatch_core::{Informer, InformerConfig, MemoryObjectStore};
//! use tokio_util::sync::CancellationToken;
//!
//! let store = MemoryObjectStore::new_shared();
//! let informer = Informer::new(store, handler).with_config(InformerConfig::default());
//! let cancel = CancellationToken::new();
//! let task = tokio::spawn(informer.run(cancel.clone()));
//! // ...
//! cancel.cancel();
//! task.await?;
//! ```

pub mod cache;
mod error;
pub mod events;
pub mod informer;
pub mod memory;
pub mod object;
pub mod store;

pub use cache::ObjectCache;
pub use error::{ErrorCategory, StoreError};
pub use events::{EventKind, LifecycleEvent, ObjectEventHandler, deliver};
pub use informer::{Backoff, DynObjectStore, Informer, InformerConfig};
pub use memory::MemoryObjectStore;
pub use object::{ObjectKey, SourceObject};
pub use store::{ObjectList, ObjectStore, WatchEvent, WatchStream};
