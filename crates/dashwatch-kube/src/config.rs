use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::error::KubeConfigError;

/// Service account token mounted into every pod.
pub const IN_CLUSTER_TOKEN_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Cluster CA bundle mounted into every pod.
pub const IN_CLUSTER_CA_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

/// Server-side timeout requested for each watch call.
pub const DEFAULT_WATCH_TIMEOUT: Duration = Duration::from_secs(290);

/// How to reach the Kubernetes API server.
///
/// Unset fields fall back to the in-cluster service account environment.
#[derive(Debug, Clone)]
pub struct KubeClientConfig {
    /// API server base URL. Defaults to `https://$KUBERNETES_SERVICE_HOST:$KUBERNETES_SERVICE_PORT`.
    pub api_server: Option<String>,
    /// Bearer token file, re-read on every request so rotated tokens are picked up.
    pub token_file: Option<PathBuf>,
    /// PEM bundle trusted in addition to the system roots.
    pub ca_file: Option<PathBuf>,
    pub insecure_skip_tls_verify: bool,
    pub watch_timeout: Duration,
}

impl Default for KubeClientConfig {
    fn default() -> Self {
        Self {
            api_server: None,
            token_file: None,
            ca_file: None,
            insecure_skip_tls_verify: false,
            watch_timeout: DEFAULT_WATCH_TIMEOUT,
        }
    }
}

impl KubeClientConfig {
    /// Resolve the API server URL.
    pub fn resolve_api_server(&self) -> Result<Url, KubeConfigError> {
        let raw = match &self.api_server {
            Some(server) if !server.trim().is_empty() => server.trim().to_string(),
            _ => in_cluster_api_server()?,
        };
        let url = Url::parse(&raw).map_err(|e| KubeConfigError::InvalidUrl(format!("{raw}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(KubeConfigError::InvalidUrl(format!(
                "{raw}: scheme must be http or https"
            )));
        }
        Ok(url)
    }

    /// Token file to use: the configured one, or the in-cluster mount when present.
    pub fn resolve_token_file(&self) -> Option<PathBuf> {
        match &self.token_file {
            Some(path) => Some(path.clone()),
            None => existing(IN_CLUSTER_TOKEN_FILE),
        }
    }

    /// CA bundle to use: the configured one, or the in-cluster mount when present.
    pub fn resolve_ca_file(&self) -> Option<PathBuf> {
        match &self.ca_file {
            Some(path) => Some(path.clone()),
            None => existing(IN_CLUSTER_CA_FILE),
        }
    }
}

fn existing(path: &str) -> Option<PathBuf> {
    let path = Path::new(path);
    path.is_file().then(|| path.to_path_buf())
}

fn in_cluster_api_server() -> Result<String, KubeConfigError> {
    let host = std::env::var("KUBERNETES_SERVICE_HOST").map_err(|_| KubeConfigError::MissingApiServer)?;
    let port = std::env::var("KUBERNETES_SERVICE_PORT").map_err(|_| KubeConfigError::MissingApiServer)?;
    if host.is_empty() || port.is_empty() {
        return Err(KubeConfigError::MissingApiServer);
    }
    // IPv6 service hosts need brackets.
    if host.contains(':') {
        Ok(format!("https://[{host}]:{port}"))
    } else {
        Ok(format!("https://{host}:{port}"))
    }
}
