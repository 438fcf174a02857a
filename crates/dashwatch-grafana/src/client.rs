use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use tracing::debug;
use url::Url;

use crate::DashboardStore;
use crate::error::DashboardError;

/// Default timeout for a single Grafana API call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Credentials attached to every request.
#[derive(Clone)]
pub enum GrafanaAuth {
    Basic { username: String, password: String },
    Bearer { token: String },
}

impl std::fmt::Debug for GrafanaAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Self::Bearer { .. } => f.debug_struct("Bearer").field("token", &"***").finish(),
        }
    }
}

/// Client for the Grafana dashboards API.
///
/// Endpoint paths are appended to the base URL's path, so a Grafana served
/// under a prefix (`http://host/grafana`) keeps it.
#[derive(Debug, Clone)]
pub struct GrafanaClient {
    http: Client,
    base_url: Url,
    auth: Option<GrafanaAuth>,
}

impl GrafanaClient {
    /// Create a client for `base_url` with the default timeout.
    ///
    /// Credentials in the URL's userinfo become HTTP basic auth and are
    /// stripped from the URL itself.
    pub fn new(base_url: &str) -> Result<Self, DashboardError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, DashboardError> {
        let mut url =
            Url::parse(base_url).map_err(|e| DashboardError::InvalidUrl(format!("{base_url}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DashboardError::InvalidUrl(format!(
                "{base_url}: scheme must be http or https"
            )));
        }

        let auth = if url.username().is_empty() {
            None
        } else {
            let auth = GrafanaAuth::Basic {
                username: url.username().to_string(),
                password: url.password().unwrap_or_default().to_string(),
            };
            // Both only fail for URLs that cannot carry credentials, excluded above.
            let _ = url.set_username("");
            let _ = url.set_password(None);
            Some(auth)
        };

        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: url,
            auth,
        })
    }

    /// Authenticate with an API token instead of basic auth.
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.auth = Some(GrafanaAuth::Bearer {
            token: token.into(),
        });
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build `{base}/{segments...}`, keeping the base path.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, DashboardError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| DashboardError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let req = self.http.request(method, url);
        match &self.auth {
            Some(GrafanaAuth::Basic { username, password }) => {
                req.basic_auth(username, Some(password))
            }
            Some(GrafanaAuth::Bearer { token }) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl DashboardStore for GrafanaClient {
    async fn upsert(&self, raw_content: &str) -> Result<(), DashboardError> {
        let url = self.endpoint(&["api", "dashboards", "db"])?;
        debug!(url = %url, bytes = raw_content.len(), "POST dashboard");
        let resp = self
            .request(Method::POST, url)
            .header("Content-Type", "application/json")
            .body(raw_content.to_string())
            .send()
            .await?;
        handle_response(resp).await
    }

    async fn delete(&self, uid: &str) -> Result<(), DashboardError> {
        let url = self.endpoint(&["api", "dashboards", "uid", uid])?;
        debug!(url = %url, "DELETE dashboard");
        let resp = self.request(Method::DELETE, url).send().await?;
        handle_response(resp).await
    }
}

async fn handle_response(resp: reqwest::Response) -> Result<(), DashboardError> {
    let status = resp.status();
    if status == StatusCode::OK {
        return Ok(());
    }
    let body = resp.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("unknown").to_string()
    } else {
        body.trim().to_string()
    };
    Err(DashboardError::UnexpectedStatus {
        status: status.as_u16(),
        message,
    })
}
