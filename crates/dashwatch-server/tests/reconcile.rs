use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashwatch_core::{LifecycleEvent, ObjectEventHandler, SourceObject};
use dashwatch_grafana::{DashboardError, DashboardStore};
use dashwatch_server::{DEFAULT_ANNOTATION, Reconciler};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Upsert(String),
    Delete(String),
}

/// Dashboard store that records every call and can be told to fail some.
#[derive(Default)]
struct RecordingStore {
    calls: Mutex<Vec<Call>>,
    fail_containing: Option<String>,
}

impl RecordingStore {
    fn failing_on(needle: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_containing: Some(needle.to_string()),
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call, subject: &str) -> Result<(), DashboardError> {
        self.calls.lock().unwrap().push(call);
        match &self.fail_containing {
            Some(needle) if subject.contains(needle.as_str()) => {
                Err(DashboardError::UnexpectedStatus {
                    status: 500,
                    message: "boom".into(),
                })
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl DashboardStore for RecordingStore {
    async fn upsert(&self, raw_content: &str) -> Result<(), DashboardError> {
        self.record(Call::Upsert(raw_content.to_string()), raw_content)
    }

    async fn delete(&self, uid: &str) -> Result<(), DashboardError> {
        self.record(Call::Delete(uid.to_string()), uid)
    }
}

/// In-memory log sink for the fmt subscriber.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl LogBuffer {
    fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn at_level(&self, level: &str) -> Vec<String> {
        let marker = format!(" {level} ");
        self.lines()
            .into_iter()
            .filter(|l| l.contains(&marker))
            .collect()
    }
}

fn capture_logs() -> (LogBuffer, DefaultGuard) {
    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

fn setup(store: RecordingStore) -> (Arc<RecordingStore>, Reconciler) {
    let store = Arc::new(store);
    let reconciler = Reconciler::new(store.clone());
    (store, reconciler)
}

fn dashboard(uid: &str) -> String {
    format!(r#"{{"dashboard":{{"uid":"{uid}","title":"Dashboard {uid}"}},"overwrite":true}}"#)
}

fn in_scope(name: &str) -> SourceObject {
    SourceObject::new("monitoring", name).with_annotation(DEFAULT_ANNOTATION, "true")
}

#[tokio::test]
async fn test_objects_out_of_scope_produce_no_actions() {
    let (store, reconciler) = setup(RecordingStore::default());

    let mut objects = vec![SourceObject::new("monitoring", "absent").with_data("d1", dashboard("a"))];
    for value in ["false", "1", "TRUE", "yes", "garbage", ""] {
        objects.push(
            SourceObject::new("monitoring", "cm")
                .with_annotation(DEFAULT_ANNOTATION, value)
                .with_data("d1", dashboard("a")),
        );
    }

    for obj in objects {
        reconciler.reconcile(&LifecycleEvent::Added(obj.clone())).await;
        reconciler
            .reconcile(&LifecycleEvent::Updated {
                old: obj.clone(),
                new: obj.clone(),
            })
            .await;
        reconciler.reconcile(&LifecycleEvent::Deleted(obj)).await;
    }

    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_one_action_per_valid_entry() {
    let (store, reconciler) = setup(RecordingStore::default());
    let obj = in_scope("multi")
        .with_data("a.json", dashboard("uid-a"))
        .with_data("b.json", dashboard("uid-b"))
        .with_data("c.json", dashboard("uid-c"));

    reconciler.reconcile(&LifecycleEvent::Added(obj.clone())).await;
    reconciler.reconcile(&LifecycleEvent::Deleted(obj)).await;

    assert_eq!(
        store.calls(),
        vec![
            Call::Upsert(dashboard("uid-a")),
            Call::Upsert(dashboard("uid-b")),
            Call::Upsert(dashboard("uid-c")),
            Call::Delete("uid-a".into()),
            Call::Delete("uid-b".into()),
            Call::Delete("uid-c".into()),
        ]
    );
}

#[tokio::test]
async fn test_invalid_entries_warn_once_each() {
    let (logs, _guard) = capture_logs();
    let (store, reconciler) = setup(RecordingStore::default());
    let obj = in_scope("invalid")
        .with_data("not-json", "{{{")
        .with_data("no-dashboard", r#"{"title":"x"}"#)
        .with_data("numeric-uid", r#"{"dashboard":{"uid":7}}"#)
        .with_data("no-uid", r#"{"dashboard":{"title":"x"}}"#);

    reconciler.reconcile(&LifecycleEvent::Added(obj)).await;

    assert!(store.calls().is_empty());
    let warnings = logs.at_level("WARN");
    assert_eq!(warnings.len(), 4, "{warnings:#?}");
    for key in ["not-json", "no-dashboard", "numeric-uid", "no-uid"] {
        let needle = format!("key={key}");
        assert_eq!(
            warnings.iter().filter(|l| l.contains(&needle)).count(),
            1,
            "{key}"
        );
    }
}

#[tokio::test]
async fn test_repeated_add_is_repeated_upsert() {
    let (store, reconciler) = setup(RecordingStore::default());
    let event = LifecycleEvent::Added(in_scope("twice").with_data("d1", dashboard("abc")));

    reconciler.reconcile(&event).await;
    reconciler.reconcile(&event).await;

    let calls = store.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], calls[1]);
    assert_eq!(calls[0], Call::Upsert(dashboard("abc")));
}

#[tokio::test]
async fn test_malformed_entry_does_not_abort_siblings() {
    let (logs, _guard) = capture_logs();
    let (store, reconciler) = setup(RecordingStore::default());
    let obj = in_scope("mixed")
        .with_data("d1", dashboard("one"))
        .with_data("d2", "definitely not json")
        .with_data("d3", dashboard("three"))
        .with_data("d4", dashboard("four"));

    reconciler.reconcile(&LifecycleEvent::Added(obj)).await;

    assert_eq!(store.calls().len(), 3);
    let warnings = logs.at_level("WARN");
    assert_eq!(warnings.len(), 1, "{warnings:#?}");
    assert!(warnings[0].contains("key=d2"));
    assert_eq!(logs.at_level("INFO").len(), 3);
}

#[tokio::test]
async fn test_store_failure_does_not_abort_siblings() {
    let (logs, _guard) = capture_logs();
    let (store, reconciler) = setup(RecordingStore::failing_on("broken"));
    let obj = in_scope("partial")
        .with_data("d1", dashboard("ok-1"))
        .with_data("d2", dashboard("broken"))
        .with_data("d3", dashboard("ok-3"));

    reconciler.reconcile(&LifecycleEvent::Deleted(obj)).await;

    assert_eq!(
        store.calls(),
        vec![
            Call::Delete("ok-1".into()),
            Call::Delete("broken".into()),
            Call::Delete("ok-3".into()),
        ]
    );
    let warnings = logs.at_level("WARN");
    assert_eq!(warnings.len(), 1, "{warnings:#?}");
    assert!(warnings[0].contains("event=deleted"));
    assert!(warnings[0].contains("key=d2"));
    assert!(warnings[0].contains("status=Some(500)"));
    assert!(warnings[0].contains("boom"));
}

#[tokio::test]
async fn test_resync_redelivery_repeats_upsert() {
    let (store, reconciler) = setup(RecordingStore::default());
    let obj = in_scope("steady").with_data("d1", dashboard("steady"));

    reconciler.on_add(&obj).await;
    reconciler.on_update(&obj, &obj).await;

    let calls = store.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], calls[1]);
}

#[tokio::test]
async fn test_update_looks_at_new_object_only() {
    let (store, reconciler) = setup(RecordingStore::default());
    let opted_in = in_scope("flip").with_data("d1", dashboard("flip"));
    let opted_out = SourceObject::new("monitoring", "flip")
        .with_annotation(DEFAULT_ANNOTATION, "false")
        .with_data("d1", dashboard("flip"));

    reconciler.on_update(&opted_in, &opted_out).await;
    assert!(store.calls().is_empty());

    reconciler.on_update(&opted_out, &opted_in).await;
    assert_eq!(store.calls(), vec![Call::Upsert(dashboard("flip"))]);
}

#[tokio::test]
async fn test_empty_data_is_a_no_op() {
    let (logs, _guard) = capture_logs();
    let (store, reconciler) = setup(RecordingStore::default());

    reconciler.on_add(&in_scope("empty")).await;

    assert!(store.calls().is_empty());
    assert!(logs.at_level("WARN").is_empty());
}

#[tokio::test]
async fn test_custom_annotation_key() {
    let store = Arc::new(RecordingStore::default());
    let reconciler = Reconciler::new(store.clone()).with_annotation("example.com/grafana");

    reconciler.on_add(&in_scope("default-key").with_data("d1", dashboard("x"))).await;
    assert!(store.calls().is_empty());

    let obj = SourceObject::new("monitoring", "custom-key")
        .with_annotation("example.com/grafana", "true")
        .with_data("d1", dashboard("x"));
    reconciler.on_add(&obj).await;
    assert_eq!(store.calls(), vec![Call::Upsert(dashboard("x"))]);
}

#[tokio::test]
async fn test_scenario_a_added_upserts_payload() {
    let (logs, _guard) = capture_logs();
    let (store, reconciler) = setup(RecordingStore::default());
    let payload = r#"{"dashboard":{"uid":"abc"}}"#;
    let obj = SourceObject::new("default", "cm1")
        .with_annotation(DEFAULT_ANNOTATION, "true")
        .with_data("d1", payload);

    reconciler.reconcile(&LifecycleEvent::Added(obj)).await;

    assert_eq!(store.calls(), vec![Call::Upsert(payload.to_string())]);
    let infos = logs.at_level("INFO");
    assert_eq!(infos.len(), 1, "{infos:#?}");
    assert!(infos[0].contains("key=d1"));
    assert!(infos[0].contains("event=added"));
}

#[tokio::test]
async fn test_scenario_b_empty_uid_warns() {
    let (logs, _guard) = capture_logs();
    let (store, reconciler) = setup(RecordingStore::default());
    let obj = SourceObject::new("default", "cm2")
        .with_annotation(DEFAULT_ANNOTATION, "true")
        .with_data("d1", r#"{"dashboard":{"uid":""}}"#);

    reconciler.reconcile(&LifecycleEvent::Added(obj)).await;

    assert!(store.calls().is_empty());
    let warnings = logs.at_level("WARN");
    assert_eq!(warnings.len(), 1, "{warnings:#?}");
    assert!(warnings[0].contains("key=d1"));
    assert!(warnings[0].contains("empty uid"));
}

#[tokio::test]
async fn test_scenario_c_missing_annotation_skips() {
    let (logs, _guard) = capture_logs();
    let (store, reconciler) = setup(RecordingStore::default());
    let obj = SourceObject::new("default", "cm3").with_data("d1", r#"{"dashboard":{"uid":"abc"}}"#);

    reconciler.reconcile(&LifecycleEvent::Added(obj)).await;

    assert!(store.calls().is_empty());
    let lines = logs.lines();
    assert_eq!(lines.len(), 1, "{lines:#?}");
    assert!(lines[0].contains(" INFO "));
    assert!(lines[0].contains("name=cm3"));
    assert!(lines[0].contains("Skipping"));
}

#[tokio::test]
async fn test_scenario_d_deleted_deletes_by_uid() {
    let (store, reconciler) = setup(RecordingStore::default());
    let obj = SourceObject::new("default", "cm4")
        .with_annotation(DEFAULT_ANNOTATION, "true")
        .with_data("d1", r#"{"dashboard":{"uid":"xyz"}}"#);

    reconciler.reconcile(&LifecycleEvent::Deleted(obj)).await;

    assert_eq!(store.calls(), vec![Call::Delete("xyz".into())]);
}
