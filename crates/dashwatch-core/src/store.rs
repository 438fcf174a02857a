//! Backing store abstraction consumed by the informer.
//!
//! A store exposes two primitives over one resource type across all
//! namespaces: a consistent `list` that reports the revision it was taken at,
//! and a `watch` that streams changes after a given revision.

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::StoreError;
use crate::object::SourceObject;

/// Result of a full listing.
#[derive(Debug, Clone, Default)]
pub struct ObjectList {
    /// Revision to start watching from.
    pub resource_version: String,
    pub items: Vec<SourceObject>,
}

/// One change notification from a watch stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Added(SourceObject),
    Modified(SourceObject),
    Deleted(SourceObject),
    /// Progress marker carrying only a newer revision.
    Bookmark { resource_version: String },
    /// The store terminated the watch with an error status.
    Error { code: u16, message: String },
}

/// Stream of watch notifications. The stream ending means the watch timed out
/// or was closed by the store and should be re-opened.
pub type WatchStream = BoxStream<'static, Result<WatchEvent, StoreError>>;

/// List/watch access to a backing object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Backend name for log lines.
    fn backend_name(&self) -> &'static str;

    /// List every object of the watched type across all namespaces.
    async fn list(&self) -> Result<ObjectList, StoreError>;

    /// Watch for changes after `resource_version`.
    async fn watch(&self, resource_version: &str) -> Result<WatchStream, StoreError>;
}
