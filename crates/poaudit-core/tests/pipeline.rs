//! End-to-end scenarios over the extraction pool and the session ledger.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use poaudit_core::error::RecognitionError;
use poaudit_core::models::line_item::FindingReason;
use poaudit_core::{
    ErrorKind, LedgerEntry, LineItemPatch, MediaType, PoauditConfig, ProcessingTask,
    ProgressCallback, RawExtraction, Recognizer, RowKey, Session, Severity, SourceDocument,
    TaskState,
};
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

/// What the scripted recognizer does for one document.
#[derive(Clone)]
enum Script {
    Rows { delay_ms: u64, rows: Vec<[&'static str; 4]> },
    Fail(RecognitionError),
    Hang,
}

/// Recognizer keyed by document bytes, recording completion order.
struct ScriptedRecognizer {
    scripts: HashMap<Vec<u8>, Script>,
    completed: Mutex<Vec<String>>,
}

impl ScriptedRecognizer {
    fn new(scripts: Vec<(&str, Script)>) -> Arc<Self> {
        Arc::new(Self {
            scripts: scripts
                .into_iter()
                .map(|(id, script)| (id.as_bytes().to_vec(), script))
                .collect(),
            completed: Mutex::new(Vec::new()),
        })
    }

    fn completion_order(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn recognize(
        &self,
        bytes: &[u8],
        _media_type: &MediaType,
    ) -> Result<RawExtraction, RecognitionError> {
        let name = String::from_utf8_lossy(bytes).to_string();
        let script = self
            .scripts
            .get(bytes)
            .cloned()
            .ok_or_else(|| RecognitionError::Service(format!("no script for {}", name)))?;

        match script {
            Script::Rows { delay_ms, rows } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                self.completed.lock().unwrap().push(name);
                let mut extraction = RawExtraction::new().with_header("supplier", "Acme");
                for [item, price, qty, amount] in rows {
                    extraction = extraction.with_row([
                        ("item", item),
                        ("unit_price", price),
                        ("qty", qty),
                        ("amount", amount),
                    ]);
                }
                Ok(extraction)
            }
            Script::Fail(err) => Err(err),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(RawExtraction::new())
            }
        }
    }
}

fn doc(id: &str) -> SourceDocument {
    SourceDocument::new(id, format!("{}.png", id), MediaType::Png, id.as_bytes().to_vec())
}

fn rows(delay_ms: u64, rows: &[[&'static str; 4]]) -> Script {
    Script::Rows {
        delay_ms,
        rows: rows.to_vec(),
    }
}

fn config(max_concurrency: usize) -> PoauditConfig {
    let mut config = PoauditConfig::default();
    config.pool.max_concurrency = max_concurrency;
    config.audit.absolute_tolerance = Decimal::new(50, 2);
    config
}

fn document_order(session: &Session) -> Vec<String> {
    let ledger = session.read();
    let mut order: Vec<String> = Vec::new();
    for entry in ledger.entries() {
        let id = entry.document_id().to_string();
        if order.last() != Some(&id) {
            order.push(id);
        }
    }
    order
}

#[tokio::test]
async fn test_failing_document_is_isolated() {
    let recognizer = ScriptedRecognizer::new(vec![
        ("a", rows(5, &[["Bolt", "10.00", "3", "30.00"]])),
        ("b", rows(5, &[["Nut", "1.00", "10", "10.00"]])),
        ("c", Script::Fail(RecognitionError::Service("HTTP 500".to_string()))),
        ("d", rows(5, &[["Washer", "0.10", "100", "10.00"]])),
        ("e", rows(5, &[["Screw", "2.00", "5", "10.00"]])),
    ]);
    let session = Session::new(config(4)).unwrap();

    let report = session
        .ingest(
            recognizer,
            ["a", "b", "c", "d", "e"].into_iter().map(doc).collect(),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.stats.succeeded, 4);
    assert_eq!(report.stats.failed, 1);

    let ledger = session.read();
    assert_eq!(ledger.len(), 5);
    assert_eq!(ledger.items().count(), 4);

    let failures: Vec<_> = ledger.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].document_id.as_str(), "c");
    assert_eq!(failures[0].kind, ErrorKind::RecognitionServiceError);
    assert!(matches!(ledger.entries()[2], LedgerEntry::Failed(_)));
}

#[tokio::test]
async fn test_ledger_order_ignores_completion_order() {
    let recognizer = ScriptedRecognizer::new(vec![
        ("a", rows(120, &[["A1", "1", "1", "1"], ["A2", "2", "1", "2"]])),
        ("b", rows(60, &[["B1", "1", "1", "1"]])),
        ("c", rows(1, &[["C1", "1", "1", "1"]])),
    ]);
    let session = Session::new(config(3)).unwrap();

    session
        .ingest(
            recognizer.clone(),
            vec![doc("a"), doc("b"), doc("c")],
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(recognizer.completion_order(), vec!["c", "b", "a"]);
    assert_eq!(document_order(&session), vec!["a", "b", "c"]);

    let names: Vec<_> = session
        .read()
        .items()
        .map(|line| line.item.item_name.clone())
        .collect();
    assert_eq!(names, vec!["A1", "A2", "B1", "C1"]);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_recognition_times_out_alone() {
    let recognizer = ScriptedRecognizer::new(vec![
        ("a", rows(1, &[["Bolt", "10.00", "3", "30.00"]])),
        ("b", Script::Hang),
    ]);
    let mut config = config(2);
    config.pool.task_timeout_seconds = 5;
    let session = Session::new(config).unwrap();

    let report = session
        .ingest(recognizer, vec![doc("a"), doc("b")], None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.documents[0].state, TaskState::Succeeded);
    assert_eq!(report.documents[1].state, TaskState::Failed);

    let ledger = session.read();
    let failed = ledger.failures().next().unwrap();
    assert_eq!(failed.kind, ErrorKind::RecognitionTimeout);
}

#[tokio::test]
async fn test_cancelled_batch_marks_undispatched_documents() {
    let recognizer = ScriptedRecognizer::new(vec![
        ("a", rows(1, &[["Bolt", "1", "1", "1"]])),
        ("b", rows(1, &[["Nut", "1", "1", "1"]])),
    ]);
    let session = Session::new(config(1)).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = session
        .ingest(recognizer, vec![doc("a"), doc("b")], None, &cancel)
        .await
        .unwrap();

    assert_eq!(report.stats.cancelled, 2);
    let kinds: Vec<_> = session.read().failures().map(|f| f.kind).collect();
    assert_eq!(kinds, vec![ErrorKind::Cancelled, ErrorKind::Cancelled]);
}

#[tokio::test]
async fn test_correction_reaudits_only_its_entry() {
    let recognizer = ScriptedRecognizer::new(vec![
        ("a", rows(1, &[["Bolt", "10.00", "3", "45.00"], ["Nut", "10.00", "3", "32.00"]])),
        ("b", rows(1, &[["Washer", "10.00", "3", "30.50"]])),
    ]);
    let session = Session::new(config(2)).unwrap();
    session
        .ingest(recognizer, vec![doc("a"), doc("b")], None, &CancellationToken::new())
        .await
        .unwrap();

    let before = session.snapshot();
    let severities: Vec<_> = before.items().map(|l| l.finding.severity).collect();
    assert_eq!(severities, vec![Severity::Error, Severity::Warn, Severity::Ok]);

    let correction = session
        .apply_correction(
            &RowKey::new("a", 0),
            &LineItemPatch {
                quantity: Some(Decimal::new(45, 1)),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(correction.previous.severity, Severity::Error);
    assert_eq!(correction.item.finding.severity, Severity::Ok);

    let after = session.snapshot();
    for (old, new) in before.entries().iter().zip(after.entries()).skip(1) {
        assert_eq!(
            serde_json::to_string(old).unwrap(),
            serde_json::to_string(new).unwrap()
        );
    }
}

#[tokio::test]
async fn test_missing_quantity_yields_incomplete_warning() {
    let recognizer = Arc::new(poaudit_core::PayloadRecognizer::new());
    let payload = r#"{"header": {"supplier": "Acme"}, "items": [{"name": "Bolt", "price": "10.00", "amount": "30.00"}]}"#;
    let document =
        SourceDocument::new("p", "p.json", MediaType::Json, payload.as_bytes().to_vec());
    let session = Session::new(PoauditConfig::default()).unwrap();

    session
        .ingest(recognizer, vec![document], None, &CancellationToken::new())
        .await
        .unwrap();

    let ledger = session.read();
    let line = ledger.items().next().unwrap();
    assert_eq!(line.item.quantity, None);
    assert_eq!(line.finding.severity, Severity::Warn);
    assert_eq!(line.finding.reason, FindingReason::Incomplete);
}

#[tokio::test]
async fn test_progress_reports_every_document() {
    let recognizer = ScriptedRecognizer::new(vec![
        ("a", rows(1, &[["Bolt", "1", "1", "1"]])),
        ("b", Script::Fail(RecognitionError::MalformedResponse("no rows".to_string()))),
    ]);
    let session = Session::new(config(2)).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let progress: ProgressCallback = Arc::new(move |task: &ProcessingTask| {
        sink.lock().unwrap().push((task.document_id.to_string(), task.state));
    });

    session
        .ingest(
            recognizer,
            vec![doc("a"), doc("b")],
            Some(progress),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let mut seen = seen.lock().unwrap().clone();
    seen.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        seen,
        vec![
            ("a".to_string(), TaskState::Succeeded),
            ("b".to_string(), TaskState::Failed)
        ]
    );
}
