//! Lifecycle events and the handler interface.
//!
//! ```text
//!   ObjectStore ──list/watch──▶ Informer ──LifecycleEvent──▶ ObjectEventHandler
//!                                  │                           (on_add / on_update / on_delete)
//!                                  ▼
//!                             ObjectCache
//! ```
//!
//! - [`types`]: `LifecycleEvent` and `EventKind`
//! - [`handler`]: the `ObjectEventHandler` trait and panic-isolated delivery

pub mod handler;
pub mod types;

pub use handler::{ObjectEventHandler, deliver};
pub use types::{EventKind, LifecycleEvent};
