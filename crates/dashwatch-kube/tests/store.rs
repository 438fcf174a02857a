use std::io::Write;
use std::time::Duration;

use dashwatch_core::{ObjectStore, StoreError, WatchEvent};
use dashwatch_kube::{KubeClientConfig, KubeConfigMapStore};
use futures_util::StreamExt;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store_for(server: &MockServer) -> KubeConfigMapStore {
    KubeConfigMapStore::new(&KubeClientConfig {
        api_server: Some(server.uri()),
        watch_timeout: Duration::from_secs(5),
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_list_configmaps() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/configmaps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "kind": "ConfigMapList",
            "apiVersion": "v1",
            "metadata": {"resourceVersion": "1200"},
            "items": [
                {
                    "metadata": {
                        "name": "dash",
                        "namespace": "monitoring",
                        "resourceVersion": "1100",
                        "annotations": {"grafana.net/dashboards": "true"}
                    },
                    "data": {"nodes.json": "{\"dashboard\":{\"uid\":\"nodes\"}}"}
                },
                {
                    "metadata": {"name": "kube-root-ca.crt", "namespace": "default"}
                }
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let list = store_for(&mock_server).list().await.unwrap();
    assert_eq!(list.resource_version, "1200");
    assert_eq!(list.items.len(), 2);
    assert_eq!(list.items[0].key.to_string(), "monitoring/dash");
    assert_eq!(
        list.items[0].annotation("grafana.net/dashboards"),
        Some("true")
    );
    assert!(list.items[1].data.is_empty());
}

#[tokio::test]
async fn test_list_forbidden() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/configmaps"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "kind": "Status",
            "status": "Failure",
            "message": "configmaps is forbidden",
            "reason": "Forbidden",
            "code": 403
        })))
        .mount(&mock_server)
        .await;

    match store_for(&mock_server).list().await {
        Err(StoreError::Status { status, message }) => {
            assert_eq!(status, 403);
            assert_eq!(message, "configmaps is forbidden");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_watch_stream() {
    let mock_server = MockServer::start().await;

    let body = [
        r#"{"type":"ADDED","object":{"metadata":{"name":"a","namespace":"ns","resourceVersion":"11"}}}"#,
        r#"{"type":"BOOKMARK","object":{"kind":"ConfigMap","metadata":{"resourceVersion":"12"}}}"#,
        r#"{"type":"DELETED","object":{"metadata":{"name":"a","namespace":"ns","resourceVersion":"13"}}}"#,
    ]
    .join("\n");

    Mock::given(method("GET"))
        .and(path("/api/v1/configmaps"))
        .and(query_param("watch", "true"))
        .and(query_param("resourceVersion", "10"))
        .and(query_param("allowWatchBookmarks", "true"))
        .and(query_param("timeoutSeconds", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(&mock_server)
        .await;

    let events: Vec<_> = store_for(&mock_server)
        .watch("10")
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], Ok(WatchEvent::Added(obj)) if obj.name() == "a"));
    assert_eq!(
        events[1].as_ref().unwrap(),
        &WatchEvent::Bookmark {
            resource_version: "12".into()
        }
    );
    assert!(matches!(&events[2], Ok(WatchEvent::Deleted(obj)) if obj.resource_version.as_deref() == Some("13")));
}

#[tokio::test]
async fn test_watch_gone_is_expired() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/configmaps"))
        .and(query_param("watch", "true"))
        .respond_with(ResponseTemplate::new(410).set_body_json(serde_json::json!({
            "kind": "Status",
            "message": "too old resource version: 1 (500)",
            "reason": "Expired",
            "code": 410
        })))
        .mount(&mock_server)
        .await;

    let err = match store_for(&mock_server).watch("1").await {
        Ok(_) => panic!("expected expired"),
        Err(err) => err,
    };
    assert!(err.is_expired());
}

#[tokio::test]
async fn test_bearer_token_from_file() {
    let mock_server = MockServer::start().await;

    let mut token = tempfile::NamedTempFile::new().unwrap();
    writeln!(token, "sa-token-123").unwrap();

    Mock::given(method("GET"))
        .and(path("/api/v1/configmaps"))
        .and(header("Authorization", "Bearer sa-token-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "metadata": {"resourceVersion": "1"},
            "items": []
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = KubeConfigMapStore::new(&KubeClientConfig {
        api_server: Some(mock_server.uri()),
        token_file: Some(token.path().to_path_buf()),
        ..Default::default()
    })
    .unwrap();

    let list = store.list().await.unwrap();
    assert!(list.items.is_empty());
}
