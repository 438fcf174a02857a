use std::path::PathBuf;

/// Errors raised while building a [`KubeConfigMapStore`](crate::KubeConfigMapStore).
#[derive(Debug, thiserror::Error)]
pub enum KubeConfigError {
    #[error(
        "no API server configured and KUBERNETES_SERVICE_HOST/KUBERNETES_SERVICE_PORT are not set"
    )]
    MissingApiServer,

    #[error("invalid API server URL: {0}")]
    InvalidUrl(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid CA bundle {path}: {message}")]
    Tls { path: PathBuf, message: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
