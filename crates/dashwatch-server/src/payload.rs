//! Dashboard payloads embedded in ConfigMap data entries.
//!
//! A payload is the JSON body Grafana's `POST /api/dashboards/db` expects:
//!
//! ```json
//! { "dashboard": { "uid": "node-exporter", "title": "Nodes", ... }, "overwrite": true }
//! ```
//!
//! Only `dashboard.uid` is read; the payload is forwarded verbatim.

use serde::Deserialize;
use serde_json::Value;

/// Shape a payload must have. Anything else is a parse error.
#[derive(Debug, Deserialize)]
struct DashboardPayload {
    dashboard: DashboardMeta,
}

#[derive(Debug, Deserialize)]
struct DashboardMeta {
    #[serde(default)]
    uid: Option<String>,
}

/// One dashboard extracted from a data entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardRecord {
    pub uid: String,
    pub raw_content: String,
}

/// Why a data entry did not yield a [`DashboardRecord`].
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("invalid dashboard payload: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("dashboard uid is empty")]
    MissingUid,
}

impl DashboardRecord {
    /// Parse a payload, first as a generic document and then into the
    /// expected shape.
    ///
    /// A missing `dashboard` object or a non-string `uid` fails to parse;
    /// an absent, null or empty `uid` is [`PayloadError::MissingUid`].
    pub fn parse(raw_content: &str) -> Result<Self, PayloadError> {
        let document: Value = serde_json::from_str(raw_content)?;
        let payload: DashboardPayload = serde_json::from_value(document)?;

        let uid = payload.dashboard.uid.unwrap_or_default();
        if uid.is_empty() {
            return Err(PayloadError::MissingUid);
        }

        Ok(Self {
            uid,
            raw_content: raw_content.to_string(),
        })
    }
}
