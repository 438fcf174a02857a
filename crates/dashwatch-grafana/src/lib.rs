//! # dashwatch-grafana
//!
//! The two dashboard operations dashwatch needs, and their Grafana binding.
//!
//! - [`DashboardStore`]: upsert-by-content and delete-by-uid
//! - [`GrafanaClient`]: `POST /api/dashboards/db` and
//!   `DELETE /api/dashboards/uid/{uid}` over reqwest

pub mod client;
pub mod error;

use std::sync::Arc;

use async_trait::async_trait;

pub use client::{GrafanaAuth, GrafanaClient};
pub use error::DashboardError;

/// Remote dashboard store.
///
/// Both calls succeed only when the store answers with its canonical OK
/// status. Implementations must be idempotent: the same upsert or delete may
/// be issued any number of times.
#[async_trait]
pub trait DashboardStore: Send + Sync {
    /// Create or replace a dashboard. `raw_content` carries its own uid.
    async fn upsert(&self, raw_content: &str) -> Result<(), DashboardError>;

    /// Delete the dashboard with `uid`.
    async fn delete(&self, uid: &str) -> Result<(), DashboardError>;
}

/// Shared handle to a dashboard store.
pub type DynDashboardStore = Arc<dyn DashboardStore>;
