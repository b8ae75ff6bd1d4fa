//! Pipeline integration tests with in-memory Extraction and Summary services.
//!
//! No pdfium library, network or API key is needed: every document here is a
//! single "image" whose bytes name the canned reply the mock service returns.

use async_trait::async_trait;
use chrono::NaiveDate;
use statement_ledger::{
    BatchPolicy, DocumentError, ExtractionConfig, ExtractionProgressCallback, ExtractionRequest,
    ExtractionService, ExtractionSession, InputDocument, InsightError, InsightOutcome,
    LedgerError, ServiceError, SummaryRequest, SummaryService, ValidationPolicy,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Mock services ────────────────────────────────────────────────────────────

/// Replies keyed by the bytes of the first frame.
#[derive(Default)]
struct MockExtraction {
    replies: HashMap<Vec<u8>, Result<String, ServiceError>>,
    /// First-frame bytes of every call, in call order.
    calls: Mutex<Vec<Vec<u8>>>,
    /// Number of leading calls that fail with a transient error.
    transient_failures: AtomicUsize,
}

impl MockExtraction {
    fn reply(mut self, key: &str, json: &str) -> Self {
        self.replies
            .insert(key.as_bytes().to_vec(), Ok(json.to_string()));
        self
    }

    fn fail(mut self, key: &str, err: ServiceError) -> Self {
        self.replies.insert(key.as_bytes().to_vec(), Err(err));
        self
    }

    fn call_keys(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .collect()
    }
}

#[async_trait]
impl ExtractionService for MockExtraction {
    async fn extract(&self, request: ExtractionRequest<'_>) -> Result<String, ServiceError> {
        assert!(!request.frames.is_empty(), "no frames sent");
        assert!(!request.instruction.is_empty());
        assert_eq!(request.schema["type"], "array");

        let key = request.frames[0].data.clone();
        self.calls.lock().unwrap().push(key.clone());

        let pending = self.transient_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.transient_failures.store(pending - 1, Ordering::SeqCst);
            return Err(ServiceError::RateLimited("429".into()));
        }

        self.replies
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Err(ServiceError::Provider("no canned reply".into())))
    }
}

struct MockSummary {
    reply: Result<String, ServiceError>,
    requests: Mutex<Vec<String>>,
}

impl MockSummary {
    fn ok(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            reply: Err(ServiceError::Transport("connection reset".into())),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl SummaryService for MockSummary {
    async fn summarize(&self, request: SummaryRequest<'_>) -> Result<String, ServiceError> {
        self.requests
            .lock()
            .unwrap()
            .push(request.transactions_json.to_string());
        self.reply.clone()
    }
}

/// Records every progress event as a string.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl ExtractionProgressCallback for Recorder {
    fn on_batch_start(&self, total: usize) {
        self.events.lock().unwrap().push(format!("batch_start {total}"));
    }
    fn on_document_start(&self, index: usize, total: usize, name: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("start {index}/{total} {name}"));
    }
    fn on_document_complete(&self, processed: usize, total: usize, name: &str, count: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {processed}/{total} {name} {count}"));
    }
    fn on_document_error(&self, processed: usize, total: usize, name: &str, _error: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("error {processed}/{total} {name}"));
    }
    fn on_batch_complete(&self, total: usize, succeeded: usize, transactions: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("batch_done {total} {succeeded} {transactions}"));
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

const COFFEE: &str =
    r#"[{"date":"2024-03-01","description":"Coffee","amount":-4.50,"category":"Dining"}]"#;
const SALARY: &str =
    r#"[{"date":"2024-02-15","description":"Salary","amount":2000,"category":"Salary"}]"#;

fn doc(key: &str) -> InputDocument {
    InputDocument::new(format!("{key}.png"), "image/png", key.as_bytes().to_vec())
}

fn config() -> ExtractionConfig {
    ExtractionConfig::builder()
        .max_retries(0)
        .build()
        .unwrap()
}

fn session(
    config: ExtractionConfig,
    extraction: MockExtraction,
    summary: MockSummary,
) -> (ExtractionSession, Arc<MockExtraction>, Arc<MockSummary>) {
    let extraction = Arc::new(extraction);
    let summary = Arc::new(summary);
    let s = ExtractionSession::with_services(config, extraction.clone(), summary.clone());
    (s, extraction, summary)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ── Ordering ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn two_documents_merge_in_date_order() {
    let (s, ext, summary) = session(
        config(),
        MockExtraction::default()
            .reply("coffee", COFFEE)
            .reply("salary", SALARY),
        MockSummary::ok("### Financial Summary\nSteady."),
    );

    let out = s.run(&[doc("coffee"), doc("salary")]).await.unwrap();
    let ledger = out.ledger();

    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger.transactions()[0].description, "Salary");
    assert_eq!(ledger.transactions()[0].date, date(2024, 2, 15));
    assert_eq!(ledger.transactions()[0].amount, 2000.0);
    assert_eq!(ledger.transactions()[1].description, "Coffee");
    assert_eq!(ledger.transactions()[1].amount, -4.5);

    // Documents were sent in input order, one call each.
    assert_eq!(ext.call_keys(), ["coffee", "salary"]);
    assert_eq!(summary.call_count(), 1);

    let report = out.insights.report().expect("insight report");
    assert!(report.is_for(ledger));
}

#[tokio::test]
async fn ties_keep_first_appearance_across_documents() {
    let a = r#"[{"date":"2024-01-05","description":"A1","amount":-1,"category":"x"},
                {"date":"2024-01-01","description":"A2","amount":-1,"category":"x"}]"#;
    let b = r#"[{"date":"2024-01-05","description":"B1","amount":-1,"category":"x"},
                {"date":"2024-01-01","description":"B2","amount":-1,"category":"x"}]"#;
    let (s, _, _) = session(
        config(),
        MockExtraction::default().reply("a", a).reply("b", b),
        MockSummary::ok("ok"),
    );

    let out = s.extract_ledger(&[doc("a"), doc("b")]).await.unwrap();
    let order: Vec<_> = out.ledger.iter().map(|t| t.description.as_str()).collect();
    assert_eq!(order, ["A2", "B2", "A1", "B1"]);
    let dates: Vec<_> = out.ledger.iter().map(|t| t.date).collect();
    assert!(dates.windows(2).all(|w| w[0] <= w[1]));
}

// ── Batch atomicity ──────────────────────────────────────────────────────────

#[tokio::test]
async fn second_of_three_failing_discards_everything() {
    let (s, ext, summary) = session(
        config(),
        MockExtraction::default()
            .reply("one", COFFEE)
            .fail("two", ServiceError::Provider("500".into()))
            .reply("three", SALARY),
        MockSummary::ok("unused"),
    );

    let err = s
        .run(&[doc("one"), doc("two"), doc("three")])
        .await
        .unwrap_err();

    match err {
        LedgerError::DocumentFailed {
            index,
            total,
            ref name,
            ref source,
        } => {
            assert_eq!((index, total), (1, 3));
            assert_eq!(name, "two.png");
            assert!(matches!(source, DocumentError::ServiceUnavailable { .. }));
        }
        ref other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("document 2 of 3"));

    // The third document was never attempted and no insight was requested.
    assert_eq!(ext.call_keys(), ["one", "two"]);
    assert_eq!(summary.call_count(), 0);
}

#[tokio::test]
async fn unsupported_media_fails_the_batch() {
    let (s, ext, _) = session(
        config(),
        MockExtraction::default().reply("one", COFFEE),
        MockSummary::ok("unused"),
    );
    let docs = [
        doc("one"),
        InputDocument::new("notes.txt", "text/plain", b"hello".to_vec()),
    ];
    let err = s.extract_ledger(&docs).await.unwrap_err();
    match err {
        LedgerError::DocumentFailed { source, .. } => match source {
            DocumentError::UnsupportedMedia { mime_type } => assert_eq!(mime_type, "text/plain"),
            other => panic!("unexpected source: {other:?}"),
        },
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(ext.call_keys(), ["one"]);
}

// ── Schema rejection ─────────────────────────────────────────────────────────

async fn rejection_for(reply: &str) -> DocumentError {
    let (s, _, _) = session(
        config(),
        MockExtraction::default().reply("doc", reply),
        MockSummary::ok("unused"),
    );
    match s.extract_ledger(&[doc("doc")]).await.unwrap_err() {
        LedgerError::DocumentFailed { source, .. } => source,
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn object_response_is_malformed() {
    let reply = r#"{"date":"2024-03-01","description":"Coffee","amount":-4.5,"category":"Dining"}"#;
    match rejection_for(reply).await {
        DocumentError::MalformedResponse { raw, .. } => assert_eq!(raw, reply),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn prose_response_is_malformed() {
    let err = rejection_for("Sorry, I cannot read this statement.").await;
    assert_eq!(err.kind(), "malformed_response");
}

#[tokio::test]
async fn missing_field_is_malformed_under_strict_policy() {
    let reply = r#"[{"date":"2024-03-01","description":"Coffee","amount":-4.5,"category":"Dining"},
                    {"date":"2024-03-02","description":"Tea","category":"Dining"}]"#;
    match rejection_for(reply).await {
        DocumentError::MalformedResponse { reason, .. } => {
            assert!(reason.contains("element 1"), "got: {reason}");
            assert!(reason.contains("amount"), "got: {reason}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn lenient_policy_keeps_valid_rows() {
    let reply = r#"[{"date":"2024-03-01","description":"Coffee","amount":-4.5,"category":"Dining"},
                    {"date":"2024-03-02","description":"Tea","category":"Dining"}]"#;
    let config = ExtractionConfig::builder()
        .validation_policy(ValidationPolicy::Lenient)
        .build()
        .unwrap();
    let (s, _, _) = session(
        config,
        MockExtraction::default().reply("doc", reply),
        MockSummary::ok("unused"),
    );
    let out = s.extract_ledger(&[doc("doc")]).await.unwrap();
    assert_eq!(out.ledger.len(), 1);
    assert_eq!(out.documents[0].dropped_rows, 1);
}

// ── Insight stage ────────────────────────────────────────────────────────────

#[tokio::test]
async fn insight_failure_leaves_ledger_intact() {
    let (s, _, summary) = session(
        config(),
        MockExtraction::default()
            .reply("coffee", COFFEE)
            .reply("salary", SALARY),
        MockSummary::failing(),
    );

    let out = s.run(&[doc("coffee"), doc("salary")]).await.unwrap();
    assert_eq!(out.ledger().len(), 2);
    assert!(matches!(
        out.insights,
        InsightOutcome::Failed(InsightError::ServiceUnavailable { .. })
    ));
    assert_eq!(summary.call_count(), 1);
}

#[tokio::test]
async fn empty_ledger_never_calls_summary() {
    let (s, _, summary) = session(
        config(),
        MockExtraction::default().reply("blank", "[]"),
        MockSummary::ok("unused"),
    );

    let out = s.run(&[doc("blank")]).await.unwrap();
    assert!(out.ledger().is_empty());
    assert!(matches!(out.insights, InsightOutcome::Skipped));
    assert_eq!(summary.call_count(), 0);
}

#[tokio::test]
async fn summary_receives_the_merged_ledger() {
    let (s, _, summary) = session(
        config(),
        MockExtraction::default()
            .reply("coffee", COFFEE)
            .reply("salary", SALARY),
        MockSummary::ok("### Financial Summary"),
    );
    s.run(&[doc("coffee"), doc("salary")]).await.unwrap();

    let sent = summary.requests.lock().unwrap()[0].clone();
    let parsed: serde_json::Value = serde_json::from_str(&sent).unwrap();
    let arr = parsed.as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["description"], "Salary");
    assert_eq!(arr[1]["date"], "2024-03-01");
}

// ── Progress and policies ────────────────────────────────────────────────────

#[tokio::test]
async fn progress_is_monotonic() {
    let recorder = Arc::new(Recorder::default());
    let config = ExtractionConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let (s, _, _) = session(
        config,
        MockExtraction::default()
            .reply("a", COFFEE)
            .reply("b", "[]")
            .reply("c", SALARY),
        MockSummary::ok("ok"),
    );

    s.extract_ledger(&[doc("a"), doc("b"), doc("c")])
        .await
        .unwrap();

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        [
            "batch_start 3",
            "start 0/3 a.png",
            "done 1/3 a.png 1",
            "start 1/3 b.png",
            "done 2/3 b.png 0",
            "start 2/3 c.png",
            "done 3/3 c.png 1",
            "batch_done 3 3 2",
        ]
    );
}

#[tokio::test]
async fn skip_failed_reports_failures_and_keeps_the_rest() {
    let recorder = Arc::new(Recorder::default());
    let config = ExtractionConfig::builder()
        .max_retries(0)
        .batch_policy(BatchPolicy::SkipFailed)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let (s, _, _) = session(
        config,
        MockExtraction::default()
            .reply("one", COFFEE)
            .reply("two", "not json")
            .reply("three", SALARY),
        MockSummary::ok("ok"),
    );

    let out = s
        .run(&[doc("one"), doc("two"), doc("three")])
        .await
        .unwrap();
    assert_eq!(out.ledger().len(), 2);
    assert_eq!(out.batch.succeeded(), 2);
    assert_eq!(out.batch.failed(), 1);
    assert!(!out.batch.documents[1].succeeded());

    let events = recorder.events.lock().unwrap().clone();
    assert!(events.contains(&"error 2/3 two.png".to_string()));
    assert_eq!(events.last().unwrap(), "batch_done 3 2 2");
}

#[tokio::test]
async fn transient_failures_are_retried_within_one_document() {
    let config = ExtractionConfig::builder()
        .max_retries(2)
        .retry_backoff_ms(1)
        .build()
        .unwrap();
    let ext = MockExtraction::default().reply("coffee", COFFEE);
    ext.transient_failures.store(2, Ordering::SeqCst);
    let (s, ext, _) = session(config, ext, MockSummary::ok("ok"));

    let out = s.extract_ledger(&[doc("coffee")]).await.unwrap();
    assert_eq!(out.ledger.len(), 1);
    assert_eq!(ext.call_keys(), ["coffee", "coffee", "coffee"]);
}

#[tokio::test]
async fn empty_batch_is_rejected() {
    let (s, _, _) = session(config(), MockExtraction::default(), MockSummary::ok("ok"));
    assert!(matches!(
        s.extract_ledger(&[]).await,
        Err(LedgerError::NoDocuments)
    ));
}

#[tokio::test]
async fn concurrent_sessions_do_not_share_ledgers() {
    let (s1, _, _) = session(
        config(),
        MockExtraction::default().reply("coffee", COFFEE),
        MockSummary::ok("one"),
    );
    let (s2, _, _) = session(
        config(),
        MockExtraction::default().reply("salary", SALARY),
        MockSummary::ok("two"),
    );

    let d1 = [doc("coffee")];
    let d2 = [doc("salary")];
    let (r1, r2) = tokio::join!(s1.run(&d1), s2.run(&d2));
    let (r1, r2) = (r1.unwrap(), r2.unwrap());

    assert_eq!(r1.ledger().transactions()[0].description, "Coffee");
    assert_eq!(r2.ledger().transactions()[0].description, "Salary");
    assert!(!r1.insights.report().unwrap().is_for(r2.ledger()));
}

// ── Export ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn csv_export_of_merged_ledger() {
    let (s, _, _) = session(
        config(),
        MockExtraction::default()
            .reply("coffee", COFFEE)
            .reply("salary", SALARY),
        MockSummary::ok("ok"),
    );
    let out = s.extract_ledger(&[doc("coffee"), doc("salary")]).await.unwrap();
    let csv = statement_ledger::to_csv_string(&out.ledger);
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Date,Description,Amount,Category,Notes");
    assert_eq!(lines[1], r#""2024-02-15","Salary",2000,"Salary","""#);
    assert_eq!(lines[2], r#""2024-03-01","Coffee",-4.5,"Dining","""#);
}
