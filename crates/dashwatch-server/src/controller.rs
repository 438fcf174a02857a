//! Wires the ConfigMap informer to the dashboard reconciler.

use std::sync::Arc;

use dashwatch_core::{DynObjectStore, Informer, InformerConfig, ObjectCache};
use dashwatch_grafana::DynDashboardStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::reconcile::Reconciler;

/// Running informer + reconciler pair.
///
/// The informer task owns the watch loop; events are reconciled one at a time
/// on that task.
pub struct DashboardController {
    cancel: CancellationToken,
    cache: ObjectCache,
    task: JoinHandle<()>,
}

impl DashboardController {
    /// Spawn the controller on the current runtime.
    pub fn spawn(
        objects: DynObjectStore,
        dashboards: DynDashboardStore,
        annotation: &str,
        config: InformerConfig,
    ) -> Self {
        let reconciler = Reconciler::new(dashboards).with_annotation(annotation);
        info!(annotation = %reconciler.annotation(), "Starting dashboard controller");

        let informer = Informer::new(objects, Arc::new(reconciler)).with_config(config);
        let cache = informer.cache();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(informer.run(cancel.clone()));

        Self {
            cancel,
            cache,
            task,
        }
    }

    /// Read-only view of the objects the informer currently knows about.
    pub fn cache(&self) -> &ObjectCache {
        &self.cache
    }

    /// Stop consuming events and wait for the in-flight one to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Controller task ended abnormally");
        }
        info!("Dashboard controller stopped");
    }
}
