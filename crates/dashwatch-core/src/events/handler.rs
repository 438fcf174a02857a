//! Handler trait for lifecycle events.
//!
//! Handlers are invoked sequentially by the informer, one event at a time.
//! They report nothing back: whatever a handler wants to surface goes to the
//! log stream. A panic inside a handler is caught by [`deliver`] so the
//! informer loop keeps running.

use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures_util::FutureExt;
use tracing::error;

use super::types::LifecycleEvent;
use crate::object::SourceObject;

/// Receiver of normalized lifecycle events.
///
/// # Example
///
/// ```ignore
/// struct Printer;
///
/// #[async_trait]
/// impl ObjectEventHandler for Printer {
///     fn name(&self) -> &str { "printer" }
///     async fn on_add(&self, obj: &SourceObject) { println!("+ {}", obj.key); }
///     async fn on_update(&self, _old: &SourceObject, new: &SourceObject) { println!("~ {}", new.key); }
///     async fn on_delete(&self, obj: &SourceObject) { println!("- {}", obj.key); }
/// }
/// ```
#[async_trait]
pub trait ObjectEventHandler: Send + Sync {
    /// Name used in log lines.
    fn name(&self) -> &str;

    /// An object was listed at startup or created.
    async fn on_add(&self, obj: &SourceObject);

    /// An object changed, or was redelivered by a periodic resync
    /// (in which case `old` and `new` are equal).
    async fn on_update(&self, old: &SourceObject, new: &SourceObject);

    /// An object was removed. `obj` is the last state the informer knew about.
    async fn on_delete(&self, obj: &SourceObject);
}

/// Route one event to the matching handler capability, catching panics.
///
/// Returns `false` if the handler panicked.
pub async fn deliver(handler: &dyn ObjectEventHandler, event: &LifecycleEvent) -> bool {
    let call = async {
        match event {
            LifecycleEvent::Added(obj) => handler.on_add(obj).await,
            LifecycleEvent::Updated { old, new } => handler.on_update(old, new).await,
            LifecycleEvent::Deleted(obj) => handler.on_delete(obj).await,
        }
    };

    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(()) => true,
        Err(panic) => {
            let panic_msg = if let Some(s) = panic.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            error!(
                handler = %handler.name(),
                event = %event.kind(),
                object = %event.object().key,
                panic = %panic_msg,
                "Event handler panicked"
            );
            false
        }
    }
}
