//! Lifecycle event types produced by the informer.

use serde::{Deserialize, Serialize};

use crate::object::SourceObject;

/// Kind of lifecycle change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Object appeared (initial list or creation)
    Added,
    /// Object changed, or was redelivered by a resync
    Updated,
    /// Object was removed
    Deleted,
}

impl EventKind {
    /// Returns the string representation of the event kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Added => "added",
            EventKind::Updated => "updated",
            EventKind::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A normalized change notification for one source object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Added(SourceObject),
    Updated {
        old: SourceObject,
        new: SourceObject,
    },
    Deleted(SourceObject),
}

impl LifecycleEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            LifecycleEvent::Added(_) => EventKind::Added,
            LifecycleEvent::Updated { .. } => EventKind::Updated,
            LifecycleEvent::Deleted(_) => EventKind::Deleted,
        }
    }

    /// The object a handler should inspect.
    ///
    /// For updates this is the new revision; the old one is only carried along.
    pub fn object(&self) -> &SourceObject {
        match self {
            LifecycleEvent::Added(obj) | LifecycleEvent::Deleted(obj) => obj,
            LifecycleEvent::Updated { new, .. } => new,
        }
    }
}
