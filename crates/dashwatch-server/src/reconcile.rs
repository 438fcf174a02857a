//! Dashboard reconciliation.
//!
//! Turns one lifecycle event for a ConfigMap into zero or more dashboard store
//! calls. Each data entry is handled on its own: a bad payload or a failed
//! call is logged and the remaining entries still run. Nothing is returned to
//! the caller and nothing is retried here; the informer's periodic resync
//! redelivers every object.

use async_trait::async_trait;
use dashwatch_core::{EventKind, LifecycleEvent, ObjectEventHandler, SourceObject};
use dashwatch_grafana::{DashboardError, DynDashboardStore};
use tracing::{info, warn};

use crate::payload::{DashboardRecord, PayloadError};

/// Annotation that opts a ConfigMap in.
pub const DEFAULT_ANNOTATION: &str = "grafana.net/dashboards";

/// Outcome of one data entry that produced no successful store call.
#[derive(Debug, thiserror::Error)]
pub(crate) enum RecordError {
    #[error(transparent)]
    Parse(serde_json::Error),

    #[error("dashboard uid is empty")]
    MissingUid,

    #[error("{source}")]
    Store {
        uid: String,
        #[source]
        source: DashboardError,
    },
}

impl From<PayloadError> for RecordError {
    fn from(err: PayloadError) -> Self {
        match err {
            PayloadError::Parse(e) => Self::Parse(e),
            PayloadError::MissingUid => Self::MissingUid,
        }
    }
}

/// Syncs dashboards from annotated ConfigMaps into a [`DashboardStore`](dashwatch_grafana::DashboardStore).
///
/// Stateless across events; the only state is the store handle and the
/// annotation key.
pub struct Reconciler {
    store: DynDashboardStore,
    annotation: String,
}

impl Reconciler {
    pub fn new(store: DynDashboardStore) -> Self {
        Self {
            store,
            annotation: DEFAULT_ANNOTATION.to_string(),
        }
    }

    /// Use a different opt-in annotation key.
    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = annotation.into();
        self
    }

    pub fn annotation(&self) -> &str {
        &self.annotation
    }

    /// Whether `obj` opted in. Only a value that parses as boolean `true`
    /// counts; absent or malformed values are out of scope.
    pub fn in_scope(&self, obj: &SourceObject) -> bool {
        obj.annotation(&self.annotation)
            .and_then(|value| value.parse::<bool>().ok())
            .unwrap_or(false)
    }

    /// Reconcile one event. For updates only the new object is looked at.
    pub async fn reconcile(&self, event: &LifecycleEvent) {
        self.reconcile_object(event.kind(), event.object()).await;
    }

    async fn reconcile_object(&self, kind: EventKind, obj: &SourceObject) {
        if !self.in_scope(obj) {
            info!(
                event = %kind,
                namespace = %obj.namespace(),
                name = %obj.name(),
                annotation = %self.annotation,
                "Skipping ConfigMap without dashboards annotation"
            );
            return;
        }

        for (key, payload) in &obj.data {
            match self.sync_record(kind, payload).await {
                Ok(uid) => {
                    info!(
                        event = %kind,
                        namespace = %obj.namespace(),
                        name = %obj.name(),
                        key = %key,
                        uid = %uid,
                        "Dashboard synced"
                    );
                }
                Err(RecordError::Parse(e)) => {
                    warn!(
                        namespace = %obj.namespace(),
                        name = %obj.name(),
                        key = %key,
                        error = %e,
                        "Failed to parse dashboard payload"
                    );
                }
                Err(RecordError::MissingUid) => {
                    warn!(
                        namespace = %obj.namespace(),
                        name = %obj.name(),
                        key = %key,
                        "Dashboard payload has an empty uid, skipping"
                    );
                }
                Err(RecordError::Store { uid, source }) => {
                    warn!(
                        event = %kind,
                        namespace = %obj.namespace(),
                        name = %obj.name(),
                        key = %key,
                        uid = %uid,
                        status = ?source.status(),
                        error = %source,
                        "Dashboard store call failed"
                    );
                }
            }
        }
    }

    /// Parse one entry and apply it. Returns the uid acted on.
    async fn sync_record(&self, kind: EventKind, payload: &str) -> Result<String, RecordError> {
        let record = DashboardRecord::parse(payload)?;

        let result = match kind {
            EventKind::Added | EventKind::Updated => self.store.upsert(&record.raw_content).await,
            EventKind::Deleted => self.store.delete(&record.uid).await,
        };

        match result {
            Ok(()) => Ok(record.uid),
            Err(source) => Err(RecordError::Store {
                uid: record.uid,
                source,
            }),
        }
    }
}

#[async_trait]
impl ObjectEventHandler for Reconciler {
    fn name(&self) -> &str {
        "dashboard_reconciler"
    }

    async fn on_add(&self, obj: &SourceObject) {
        self.reconcile_object(EventKind::Added, obj).await;
    }

    async fn on_update(&self, _old: &SourceObject, new: &SourceObject) {
        self.reconcile_object(EventKind::Updated, new).await;
    }

    async fn on_delete(&self, obj: &SourceObject) {
        self.reconcile_object(EventKind::Deleted, obj).await;
    }
}
