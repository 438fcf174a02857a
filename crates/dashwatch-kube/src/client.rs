use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use dashwatch_core::{ObjectList, ObjectStore, SourceObject, StoreError, WatchStream};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::debug;
use url::Url;

use crate::config::KubeClientConfig;
use crate::error::KubeConfigError;
use crate::lines::decode_watch_body;
use crate::wire::{ConfigMapList, Status};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Extra client-side allowance on top of the server-side watch timeout.
const WATCH_GRACE: Duration = Duration::from_secs(30);

/// [`ObjectStore`] over the core/v1 ConfigMap API, across all namespaces.
#[derive(Debug, Clone)]
pub struct KubeConfigMapStore {
    http: Client,
    base_url: Url,
    token_file: Option<PathBuf>,
    watch_timeout: Duration,
}

impl KubeConfigMapStore {
    pub fn new(config: &KubeClientConfig) -> Result<Self, KubeConfigError> {
        let base_url = config.resolve_api_server()?;

        let mut builder = Client::builder().connect_timeout(CONNECT_TIMEOUT);
        if let Some(path) = config.resolve_ca_file() {
            let pem = std::fs::read(&path).map_err(|source| KubeConfigError::Io {
                path: path.clone(),
                source,
            })?;
            let certs = reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| {
                KubeConfigError::Tls {
                    path: path.clone(),
                    message: e.to_string(),
                }
            })?;
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }
        if config.insecure_skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let token_file = config.resolve_token_file();
        if let Some(path) = &token_file {
            read_token(path).map_err(|source| KubeConfigError::Io {
                path: path.clone(),
                source,
            })?;
        }

        Ok(Self {
            http: builder.build()?,
            base_url,
            token_file,
            watch_timeout: config.watch_timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn configmaps_url(&self) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::internal(format!("invalid API server URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "v1", "configmaps"]);
        Ok(url)
    }

    fn request(&self, url: Url) -> Result<RequestBuilder, StoreError> {
        let req = self.http.get(url).header("Accept", "application/json");
        match &self.token_file {
            Some(path) => {
                let token = read_token(path).map_err(|e| {
                    StoreError::internal(format!("failed to read token {}: {e}", path.display()))
                })?;
                Ok(req.bearer_auth(token))
            }
            None => Ok(req),
        }
    }
}

fn read_token(path: &Path) -> std::io::Result<String> {
    Ok(std::fs::read_to_string(path)?.trim().to_string())
}

async fn send(req: RequestBuilder) -> Result<Response, StoreError> {
    let resp = req
        .send()
        .await
        .map_err(|e| StoreError::connection(e.to_string()))?;

    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Status>(&body)
        .ok()
        .map(|s| s.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("unknown").to_string()
            } else {
                body.trim().to_string()
            }
        });

    if status == StatusCode::GONE {
        Err(StoreError::expired(message))
    } else {
        Err(StoreError::status(status.as_u16(), message))
    }
}

#[async_trait]
impl ObjectStore for KubeConfigMapStore {
    fn backend_name(&self) -> &'static str {
        "kubernetes"
    }

    async fn list(&self) -> Result<ObjectList, StoreError> {
        let url = self.configmaps_url()?;
        debug!(url = %url, "listing configmaps");
        let resp = send(self.request(url)?).await?;
        let list: ConfigMapList = resp
            .json()
            .await
            .map_err(|e| StoreError::decode(format!("configmap list: {e}")))?;

        Ok(ObjectList {
            resource_version: list.metadata.resource_version,
            items: list.items.into_iter().map(SourceObject::from).collect(),
        })
    }

    async fn watch(&self, resource_version: &str) -> Result<WatchStream, StoreError> {
        let mut url = self.configmaps_url()?;
        url.query_pairs_mut()
            .append_pair("watch", "true")
            .append_pair("resourceVersion", resource_version)
            .append_pair("allowWatchBookmarks", "true")
            .append_pair("timeoutSeconds", &self.watch_timeout.as_secs().to_string());
        debug!(url = %url, "watching configmaps");

        let req = self.request(url)?.timeout(self.watch_timeout + WATCH_GRACE);
        let resp = send(req).await?;
        Ok(decode_watch_body(resp.bytes_stream()))
    }
}
