//! List+watch informer.
//!
//! The informer turns an [`ObjectStore`]'s list and watch primitives into a
//! single ordered sequence of [`LifecycleEvent`]s delivered to one handler,
//! backed by a local [`ObjectCache`].
//!
//! # Lifecycle
//!
//! ```text
//!        ┌──────────── relist (expired / error, after backoff) ─────────────┐
//!        ▼                                                                  │
//!   list ──▶ cache.replace ──▶ Added/Updated/Deleted ──▶ watch(rv) ──▶ apply events
//!                                                           │   ▲
//!                                                           └───┘ stream closed: re-watch from rv
//!                               every resync period: Updated(obj, obj) for each cached object
//! ```
//!
//! Store failures are retried with exponential backoff and never reach the
//! handler. Handlers are awaited one event at a time; cancellation is only
//! observed between events, so an in-flight handler call always completes.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::ObjectCache;
use crate::events::{LifecycleEvent, ObjectEventHandler, deliver};
use crate::store::{ObjectStore, WatchEvent, WatchStream};

/// Default interval between full resyncs.
pub const DEFAULT_RESYNC_PERIOD: Duration = Duration::from_secs(3 * 60);
/// Default first retry delay after a store failure.
pub const DEFAULT_BACKOFF_INITIAL: Duration = Duration::from_millis(800);
/// Default upper bound for retry delays.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Status code a store uses to say the watch position is gone.
const STATUS_GONE: u16 = 410;

/// Shared handle to a backing store.
pub type DynObjectStore = Arc<dyn ObjectStore>;

/// Informer tuning.
#[derive(Debug, Clone)]
pub struct InformerConfig {
    /// Full resync interval. `Duration::ZERO` disables resync.
    pub resync_period: Duration,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
}

impl Default for InformerConfig {
    fn default() -> Self {
        Self {
            resync_period: DEFAULT_RESYNC_PERIOD,
            backoff_initial: DEFAULT_BACKOFF_INITIAL,
            backoff_max: DEFAULT_BACKOFF_MAX,
        }
    }
}

/// Exponential backoff: doubles from `initial` up to `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Option<Duration>,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            current: None,
        }
    }

    /// Delay to wait before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = match self.current {
            None => self.initial,
            Some(prev) => prev.saturating_mul(2).min(self.max),
        };
        self.current = Some(delay);
        delay
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}

enum WatchExit {
    Cancelled,
    Relist,
}

/// Drives list+watch against a store and feeds a handler.
pub struct Informer {
    store: DynObjectStore,
    handler: Arc<dyn ObjectEventHandler>,
    cache: ObjectCache,
    config: InformerConfig,
}

impl Informer {
    pub fn new(store: DynObjectStore, handler: Arc<dyn ObjectEventHandler>) -> Self {
        Self {
            store,
            handler,
            cache: ObjectCache::new(),
            config: InformerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: InformerConfig) -> Self {
        self.config = config;
        self
    }

    /// Read handle to the informer's cache.
    pub fn cache(&self) -> ObjectCache {
        self.cache.clone()
    }

    /// Run until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            backend = self.store.backend_name(),
            handler = %self.handler.name(),
            resync_secs = self.config.resync_period.as_secs(),
            "Starting informer"
        );

        let mut backoff = Backoff::new(self.config.backoff_initial, self.config.backoff_max);
        let mut resync = self.resync_timer();

        loop {
            let listed = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.store.list() => result,
            };

            let list = match listed {
                Ok(list) => list,
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!(
                        error = %e,
                        category = %e.category(),
                        retry_in_ms = delay.as_millis() as u64,
                        "List failed, retrying"
                    );
                    if !sleep_or_cancel(delay, &cancel).await {
                        break;
                    }
                    continue;
                }
            };

            backoff.reset();
            let events = self.cache.replace(list.items);
            debug!(
                count = self.cache.len(),
                namespaces = self.cache.namespaces().len(),
                resource_version = %list.resource_version,
                "Listed objects"
            );

            if !self.dispatch_all(events, &cancel).await {
                break;
            }

            let mut resource_version = list.resource_version;
            match self
                .watch(&mut resource_version, &mut backoff, &mut resync, &cancel)
                .await
            {
                WatchExit::Cancelled => break,
                WatchExit::Relist => continue,
            }
        }

        info!(cached = self.cache.len(), "Informer stopped");
    }

    async fn watch(
        &self,
        resource_version: &mut String,
        backoff: &mut Backoff,
        resync: &mut Option<Interval>,
        cancel: &CancellationToken,
    ) -> WatchExit {
        loop {
            let opened = tokio::select! {
                biased;
                _ = cancel.cancelled() => return WatchExit::Cancelled,
                result = self.store.watch(resource_version.as_str()) => result,
            };

            let mut stream: WatchStream = match opened {
                Ok(stream) => stream,
                Err(e) if e.is_expired() => {
                    info!(error = %e, "Watch position expired, relisting");
                    return WatchExit::Relist;
                }
                Err(e) => {
                    return self.retry_after_failure(&e.to_string(), backoff, cancel).await;
                }
            };
            debug!(resource_version = %resource_version, "Watch opened");

            let mut received = false;
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return WatchExit::Cancelled,
                    _ = next_resync(resync) => {
                        if !self.resync(cancel).await {
                            return WatchExit::Cancelled;
                        }
                    }
                    item = stream.next() => match item {
                        None => {
                            debug!(resource_version = %resource_version, "Watch stream closed, re-opening");
                            // A watch that closes without delivering anything is
                            // not progress; pace the re-open.
                            if !received && !sleep_or_cancel(backoff.next_delay(), cancel).await {
                                return WatchExit::Cancelled;
                            }
                            break;
                        }
                        Some(Ok(WatchEvent::Error { code, message })) => {
                            if code == STATUS_GONE {
                                info!(code, message = %message, "Watch position expired, relisting");
                                return WatchExit::Relist;
                            }
                            let reason = format!("watch error {code}: {message}");
                            return self.retry_after_failure(&reason, backoff, cancel).await;
                        }
                        Some(Ok(event)) => {
                            received = true;
                            backoff.reset();
                            if let Some(event) = self.apply(event, resource_version) {
                                if cancel.is_cancelled() {
                                    return WatchExit::Cancelled;
                                }
                                deliver(self.handler.as_ref(), &event).await;
                            }
                        }
                        Some(Err(e)) if e.is_expired() => {
                            info!(error = %e, "Watch position expired, relisting");
                            return WatchExit::Relist;
                        }
                        Some(Err(e)) => {
                            return self.retry_after_failure(&e.to_string(), backoff, cancel).await;
                        }
                    }
                }
            }
        }
    }

    /// Fold a watch notification into the cache and turn it into a lifecycle event.
    fn apply(&self, event: WatchEvent, resource_version: &mut String) -> Option<LifecycleEvent> {
        match event {
            WatchEvent::Added(obj) | WatchEvent::Modified(obj) => {
                if let Some(rv) = &obj.resource_version {
                    resource_version.clone_from(rv);
                }
                match self.cache.upsert(obj.clone()) {
                    Some(old) => Some(LifecycleEvent::Updated { old, new: obj }),
                    None => Some(LifecycleEvent::Added(obj)),
                }
            }
            WatchEvent::Deleted(obj) => {
                if let Some(rv) = &obj.resource_version {
                    resource_version.clone_from(rv);
                }
                if self.cache.remove(&obj.key).is_none() {
                    debug!(object = %obj.key, "Delete for an object that was not cached");
                }
                Some(LifecycleEvent::Deleted(obj))
            }
            WatchEvent::Bookmark {
                resource_version: rv,
            } => {
                *resource_version = rv;
                None
            }
            // Errors are handled by the watch loop before reaching here.
            WatchEvent::Error { .. } => None,
        }
    }

    /// Redeliver every cached object as an update to itself.
    async fn resync(&self, cancel: &CancellationToken) -> bool {
        let objects = self.cache.list();
        debug!(count = objects.len(), "Resyncing cached objects");
        let events = objects
            .into_iter()
            .map(|obj| LifecycleEvent::Updated {
                old: obj.clone(),
                new: obj,
            })
            .collect();
        self.dispatch_all(events, cancel).await
    }

    /// Deliver events in order. Returns `false` if cancelled before finishing.
    async fn dispatch_all(&self, events: Vec<LifecycleEvent>, cancel: &CancellationToken) -> bool {
        for event in events {
            if cancel.is_cancelled() {
                return false;
            }
            deliver(self.handler.as_ref(), &event).await;
        }
        true
    }

    async fn retry_after_failure(
        &self,
        reason: &str,
        backoff: &mut Backoff,
        cancel: &CancellationToken,
    ) -> WatchExit {
        let delay = backoff.next_delay();
        warn!(
            error = %reason,
            retry_in_ms = delay.as_millis() as u64,
            "Watch failed, relisting after backoff"
        );
        if sleep_or_cancel(delay, cancel).await {
            WatchExit::Relist
        } else {
            WatchExit::Cancelled
        }
    }

    fn resync_timer(&self) -> Option<Interval> {
        let period = self.config.resync_period;
        if period.is_zero() {
            return None;
        }
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Some(interval)
    }
}

impl std::fmt::Debug for Informer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Informer")
            .field("backend", &self.store.backend_name())
            .field("handler", &self.handler.name())
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish()
    }
}

async fn next_resync(resync: &mut Option<Interval>) {
    match resync {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Returns `false` if cancelled before the delay elapsed.
async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut backoff = Backoff::new(Duration::from_millis(800), Duration::from_secs(3));
        assert_eq!(backoff.next_delay(), Duration::from_millis(800));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1600));
        assert_eq!(backoff.next_delay(), Duration::from_millis(3000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(3000));

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_max_below_initial() {
        let mut backoff = Backoff::new(Duration::from_secs(5), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_default_config() {
        let config = InformerConfig::default();
        assert_eq!(config.resync_period, Duration::from_secs(180));
        assert_eq!(config.backoff_initial, Duration::from_millis(800));
        assert_eq!(config.backoff_max, Duration::from_secs(30));
    }
}
