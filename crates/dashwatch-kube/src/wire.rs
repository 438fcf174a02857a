//! Kubernetes API wire types for ConfigMaps and watch frames.
//!
//! Only the fields dashwatch reads are modelled; everything else is ignored.

use std::collections::BTreeMap;

use dashwatch_core::{SourceObject, StoreError, WatchEvent};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub resource_version: Option<String>,
    #[serde(default)]
    pub annotations: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigMap {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub data: Option<BTreeMap<String, String>>,
}

impl From<ConfigMap> for SourceObject {
    fn from(cm: ConfigMap) -> Self {
        let ConfigMap { metadata, data } = cm;
        let mut obj = SourceObject::new(metadata.namespace, metadata.name);
        obj.resource_version = metadata.resource_version;
        obj.annotations = metadata.annotations.unwrap_or_default();
        obj.data = data.unwrap_or_default();
        obj
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    #[serde(default)]
    pub resource_version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigMapList {
    #[serde(default)]
    pub metadata: ListMeta,
    #[serde(default)]
    pub items: Vec<ConfigMap>,
}

/// `metav1.Status`, returned for API errors and in watch `ERROR` frames.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

/// One line of a watch response.
#[derive(Debug, Deserialize)]
pub struct WatchFrame {
    #[serde(rename = "type")]
    pub kind: String,
    pub object: serde_json::Value,
}

#[derive(Deserialize)]
struct BookmarkObject {
    #[serde(default)]
    metadata: ListMeta,
}

impl WatchFrame {
    pub fn into_event(self) -> Result<WatchEvent, StoreError> {
        match self.kind.as_str() {
            "ADDED" => Ok(WatchEvent::Added(decode_config_map(self.object)?)),
            "MODIFIED" => Ok(WatchEvent::Modified(decode_config_map(self.object)?)),
            "DELETED" => Ok(WatchEvent::Deleted(decode_config_map(self.object)?)),
            "BOOKMARK" => {
                let bookmark: BookmarkObject = serde_json::from_value(self.object)
                    .map_err(|e| StoreError::decode(format!("bookmark: {e}")))?;
                Ok(WatchEvent::Bookmark {
                    resource_version: bookmark.metadata.resource_version,
                })
            }
            "ERROR" => {
                let status: Status = serde_json::from_value(self.object)
                    .map_err(|e| StoreError::decode(format!("watch status: {e}")))?;
                Ok(WatchEvent::Error {
                    code: status.code,
                    message: status.message,
                })
            }
            other => Err(StoreError::decode(format!("unknown watch event type '{other}'"))),
        }
    }
}

fn decode_config_map(object: serde_json::Value) -> Result<SourceObject, StoreError> {
    serde_json::from_value::<ConfigMap>(object)
        .map(SourceObject::from)
        .map_err(|e| StoreError::decode(format!("configmap: {e}")))
}

/// Parse one newline-delimited watch frame.
pub fn parse_watch_line(line: &[u8]) -> Result<WatchEvent, StoreError> {
    let frame: WatchFrame = serde_json::from_slice(line)
        .map_err(|e| StoreError::decode(format!("watch frame: {e}")))?;
    frame.into_event()
}
