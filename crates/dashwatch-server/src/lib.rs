//! # dashwatch-server
//!
//! Syncs Grafana dashboards embedded in annotated Kubernetes ConfigMaps.
//!
//! A ConfigMap opts in with `grafana.net/dashboards: "true"`; each of its data
//! entries holds one dashboard payload. Creates and updates upsert every
//! payload into Grafana, deletes remove them by uid.

pub mod config;
pub mod controller;
pub mod observability;
pub mod payload;
pub mod reconcile;

pub use controller::DashboardController;
pub use payload::{DashboardRecord, PayloadError};
pub use reconcile::{DEFAULT_ANNOTATION, Reconciler};
