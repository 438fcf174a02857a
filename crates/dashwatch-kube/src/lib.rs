//! # dashwatch-kube
//!
//! Kubernetes binding of [`dashwatch_core::ObjectStore`]: lists and watches
//! ConfigMaps across all namespaces over the REST API.
//!
//! - `GET /api/v1/configmaps` for the initial list
//! - `GET /api/v1/configmaps?watch=true&resourceVersion=..` for the
//!   newline-delimited JSON watch stream
//!
//! Credentials default to the pod's service account; an explicit API server
//! such as a `kubectl proxy` endpoint works without a token.

pub mod client;
pub mod config;
mod error;
mod lines;
pub mod wire;

pub use client::KubeConfigMapStore;
pub use config::{DEFAULT_WATCH_TIMEOUT, KubeClientConfig};
pub use error::KubeConfigError;
pub use lines::decode_watch_body;
