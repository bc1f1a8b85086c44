//! Extraction worker pool.
//!
//! Runs recognition, normalization and audit for a batch of documents under
//! bounded concurrency. Every document ends in exactly one terminal
//! [`ProcessingTask`]; failures stay inside their own task.

mod stats;

pub use stats::BatchStats;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::audit::AuditPolicy;
use crate::error::{ErrorKind, RecognitionError};
use crate::models::config::PoolConfig;
use crate::models::document::SourceDocument;
use crate::models::line_item::LineItem;
use crate::models::task::{ProcessingTask, TaskFailure, TaskState};
use crate::normalize::FieldNormalizer;
use crate::recognition::Recognizer;

/// Called once for every task that reaches a terminal state.
pub type ProgressCallback = Arc<dyn Fn(&ProcessingTask) + Send + Sync>;

/// Bounded-parallelism pool turning documents into audited line items.
#[derive(Clone)]
pub struct ExtractionPool {
    recognizer: Arc<dyn Recognizer>,
    normalizer: Arc<FieldNormalizer>,
    policy: Arc<AuditPolicy>,
    concurrency: usize,
    task_timeout: Duration,
    progress: Option<ProgressCallback>,
}

impl ExtractionPool {
    pub fn new(
        recognizer: Arc<dyn Recognizer>,
        normalizer: FieldNormalizer,
        policy: AuditPolicy,
        config: &PoolConfig,
    ) -> Self {
        Self {
            recognizer,
            normalizer: Arc::new(normalizer),
            policy: Arc::new(policy),
            concurrency: config.effective_concurrency(),
            task_timeout: Duration::from_secs(config.task_timeout_seconds),
            progress: None,
        }
    }

    /// Register a callback invoked as each task finishes.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Override the per-task recognition budget.
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Process a batch to completion.
    pub async fn run(&self, documents: Vec<SourceDocument>) -> Vec<ProcessingTask> {
        self.run_with_cancel(documents, &CancellationToken::new()).await
    }

    /// Process a batch, stopping dispatch once `cancel` fires.
    ///
    /// Tasks already running finish or time out normally. Documents that were
    /// never dispatched end FAILED with [`ErrorKind::Cancelled`]. Outcomes are
    /// returned in submission order.
    pub async fn run_with_cancel(
        &self,
        documents: Vec<SourceDocument>,
        cancel: &CancellationToken,
    ) -> Vec<ProcessingTask> {
        let total = documents.len();
        info!(
            "Processing {} documents with concurrency {}",
            total, self.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut outcomes: Vec<ProcessingTask> =
            documents.iter().map(ProcessingTask::queued).collect();
        let mut handles = Vec::with_capacity(total);

        for (index, document) in documents.into_iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };

            let Some(permit) = permit else {
                info!("Batch cancelled, {} documents not dispatched", total - index);
                break;
            };

            let worker = self.clone();
            let span = info_span!("task", document = %document.id());
            let handle = tokio::spawn(
                async move {
                    let outcome = worker.process(document).await;
                    drop(permit);
                    if let Some(progress) = &worker.progress {
                        progress(&outcome);
                    }
                    outcome
                }
                .instrument(span),
            );
            handles.push((index, handle));
        }

        let dispatched = handles.len();
        let joined = futures::future::join_all(
            handles
                .into_iter()
                .map(|(index, handle)| async move { (index, handle.await) }),
        )
        .await;

        for (index, result) in joined {
            match result {
                Ok(outcome) => outcomes[index] = outcome,
                Err(e) => {
                    warn!("Worker for {} died: {}", outcomes[index].document_id, e);
                    outcomes[index].fail(TaskFailure::new(ErrorKind::Internal, e.to_string()), 0);
                    self.report(&outcomes[index]);
                }
            }
        }

        for outcome in outcomes.iter_mut().skip(dispatched) {
            outcome.fail(
                TaskFailure::new(ErrorKind::Cancelled, "batch cancelled before dispatch"),
                0,
            );
            self.report(outcome);
        }

        let succeeded = outcomes
            .iter()
            .filter(|t| t.state == TaskState::Succeeded)
            .count();
        info!(
            "Batch finished: {} succeeded, {} failed",
            succeeded,
            total - succeeded
        );

        outcomes
    }

    fn report(&self, task: &ProcessingTask) {
        if let Some(progress) = &self.progress {
            progress(task);
        }
    }

    /// Run one document through recognition, normalization and audit.
    async fn process(&self, document: SourceDocument) -> ProcessingTask {
        let started = Instant::now();
        let mut task = ProcessingTask::queued(&document);
        task.start();

        match self.extract(&document).await {
            Ok(items) => {
                let audited: Vec<_> = items
                    .into_iter()
                    .map(|item| self.policy.audit_item(item))
                    .collect();
                let elapsed_ms = started.elapsed().as_millis() as u64;
                debug!("Extracted {} line items in {} ms", audited.len(), elapsed_ms);
                task.succeed(audited, elapsed_ms);
            }
            Err(failure) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                warn!(
                    "{} failed after {} ms ({}): {}",
                    document.name(),
                    elapsed_ms,
                    failure.kind,
                    failure.message
                );
                task.fail(failure, elapsed_ms);
            }
        }

        task
    }

    async fn extract(
        &self,
        document: &SourceDocument,
    ) -> Result<Vec<LineItem>, TaskFailure> {
        let media_type = document.media_type();
        if !media_type.is_supported() {
            let err = RecognitionError::UnsupportedMediaType(media_type.as_mime().to_string());
            return Err(TaskFailure::new(err.kind(), err.to_string()));
        }

        let recognized = tokio::time::timeout(
            self.task_timeout,
            self.recognizer.recognize(document.bytes(), media_type),
        )
        .await;

        let raw = match recognized {
            Ok(Ok(raw)) => raw,
            Ok(Err(err)) => return Err(TaskFailure::new(err.kind(), err.to_string())),
            Err(_) => {
                let err = RecognitionError::Timeout(self.task_timeout.as_secs());
                return Err(TaskFailure::new(err.kind(), err.to_string()));
            }
        };

        self.normalizer
            .normalize(&raw, document.id())
            .map_err(|err| TaskFailure::new(err.kind(), err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::ExtractionConfig;
    use crate::models::document::MediaType;
    use crate::models::line_item::Severity;
    use crate::recognition::RawExtraction;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Recognizer that echoes the document bytes back as a one-row payload.
    struct EchoRecognizer {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl EchoRecognizer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Recognizer for EchoRecognizer {
        async fn recognize(
            &self,
            bytes: &[u8],
            _media_type: &MediaType,
        ) -> Result<RawExtraction, RecognitionError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let name = String::from_utf8_lossy(bytes).to_string();
            if name == "broken" {
                return Err(RecognitionError::Service("HTTP 500".into()));
            }
            Ok(RawExtraction::new().with_row([
                ("name", name.as_str()),
                ("qty", "3"),
                ("price", "10.00"),
                ("amount", "30.00"),
            ]))
        }
    }

    fn pool(recognizer: Arc<dyn Recognizer>, max_concurrency: usize) -> ExtractionPool {
        let config = PoolConfig {
            max_concurrency,
            task_timeout_seconds: 5,
        };
        let normalizer = FieldNormalizer::from_config(&ExtractionConfig::default()).unwrap();
        ExtractionPool::new(recognizer, normalizer, AuditPolicy::default(), &config)
    }

    fn doc(name: &str) -> SourceDocument {
        SourceDocument::new(name, name, MediaType::Png, name.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let recognizer = EchoRecognizer::new();
        let outcomes = pool(recognizer, 4)
            .run(vec![doc("a"), doc("broken"), doc("c")])
            .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].state, TaskState::Succeeded);
        assert_eq!(outcomes[1].state, TaskState::Failed);
        assert_eq!(
            outcomes[1].failure.as_ref().unwrap().kind,
            ErrorKind::RecognitionServiceError
        );
        assert_eq!(outcomes[2].state, TaskState::Succeeded);
        assert_eq!(outcomes[2].items[0].finding.severity, Severity::Ok);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let recognizer = EchoRecognizer::new();
        let docs = (0..10).map(|i| doc(&format!("d{}", i))).collect();
        let outcomes = pool(recognizer.clone(), 2).run(docs).await;

        assert_eq!(outcomes.len(), 10);
        assert!(recognizer.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_unsupported_media_type_skips_recognition() {
        let recognizer = EchoRecognizer::new();
        let document = SourceDocument::new("x.docx", "x.docx", MediaType::Other("docx".into()), b"x".to_vec());
        let outcomes = pool(recognizer.clone(), 1).run(vec![document]).await;

        assert_eq!(outcomes[0].failure.as_ref().unwrap().kind, ErrorKind::UnsupportedMediaType);
        assert_eq!(recognizer.peak.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_dispatch() {
        let recognizer = EchoRecognizer::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcomes = pool(recognizer, 2)
            .run_with_cancel(vec![doc("a"), doc("b")], &cancel)
            .await;

        assert!(outcomes.iter().all(|t| t.state == TaskState::Failed));
        assert!(outcomes
            .iter()
            .all(|t| t.failure.as_ref().unwrap().kind == ErrorKind::Cancelled));
    }
}
