//! Audit session: configuration, document registry and ledger.
//!
//! A session is created at start, owns everything a batch or a conversation
//! needs, and is torn down with [`Session::close`]. Sessions share nothing.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::audit::AuditPolicy;
use crate::error::{PoauditError, Result};
use crate::ledger::{Correction, DocumentRecord, Ledger, LedgerSummary};
use crate::models::config::PoauditConfig;
use crate::models::document::{DocumentId, SourceDocument};
use crate::models::line_item::{AuditedItem, LineItemPatch, RowKey};
use crate::models::task::TaskState;
use crate::normalize::FieldNormalizer;
use crate::pipeline::{BatchStats, ExtractionPool, ProgressCallback};
use crate::recognition::Recognizer;

/// Outcome of one ingested batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub stats: BatchStats,
    /// Per-document results in submission order.
    pub documents: Vec<DocumentRecord>,
}

/// Explicit context object for one audit session.
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    config: PoauditConfig,
    normalizer: FieldNormalizer,
    policy: AuditPolicy,
    ledger: RwLock<Ledger>,
    /// Document ids claimed by batches that have not been appended yet.
    in_flight: Mutex<HashSet<DocumentId>>,
}

/// Claim on a batch's document ids, released when the batch ends.
struct Reservation<'a> {
    in_flight: &'a Mutex<HashSet<DocumentId>>,
    ids: Vec<DocumentId>,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        for id in &self.ids {
            in_flight.remove(id);
        }
    }
}

impl Session {
    /// Start a session with an empty ledger.
    pub fn new(config: PoauditConfig) -> Result<Self> {
        Self::with_ledger(config, Ledger::new())
    }

    /// Start a session over an existing ledger, e.g. a loaded snapshot.
    pub fn with_ledger(config: PoauditConfig, ledger: Ledger) -> Result<Self> {
        config.validate()?;
        let normalizer = FieldNormalizer::from_config(&config.extraction)?;
        let policy = AuditPolicy::from_config(&config.audit);

        let session = Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            config,
            normalizer,
            policy,
            ledger: RwLock::new(ledger),
            in_flight: Mutex::new(HashSet::new()),
        };
        info!("Session {} started", session.id);
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn config(&self) -> &PoauditConfig {
        &self.config
    }

    pub fn policy(&self) -> &AuditPolicy {
        &self.policy
    }

    pub fn normalizer(&self) -> &FieldNormalizer {
        &self.normalizer
    }

    /// Build an extraction pool bound to this session's configuration.
    pub fn extraction_pool(&self, recognizer: Arc<dyn Recognizer>) -> ExtractionPool {
        ExtractionPool::new(
            recognizer,
            self.normalizer.clone(),
            self.policy.clone(),
            &self.config.pool,
        )
    }

    /// Extract, audit and append a batch of documents.
    ///
    /// Fails up front if a document id is already in the ledger (unless its
    /// earlier attempt failed), is being processed by another batch of this
    /// session, or repeats within the batch. Per-document
    /// failures never fail the batch; they land in the ledger as placeholders.
    pub async fn ingest(
        &self,
        recognizer: Arc<dyn Recognizer>,
        documents: Vec<SourceDocument>,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<BatchReport> {
        let _reservation = self.reserve_documents(&documents)?;

        let mut pool = self.extraction_pool(recognizer);
        if let Some(progress) = progress {
            pool = pool.with_progress(progress);
        }

        let started = Instant::now();
        let outcomes = pool.run_with_cancel(documents, cancel).await;
        let stats = BatchStats::from_tasks(&outcomes, started.elapsed());

        let documents = outcomes
            .iter()
            .map(|task| DocumentRecord {
                document_id: task.document_id.clone(),
                document_name: task.document_name.clone(),
                state: task.state,
                line_count: task.items.len(),
                elapsed_ms: task.elapsed_ms,
            })
            .collect();

        self.write().append_outcomes(outcomes);
        info!(
            "Ingested {} documents ({} failed, {} line items) in {} ms",
            stats.total_documents, stats.failed, stats.line_items, stats.duration_ms
        );

        Ok(BatchReport { stats, documents })
    }

    /// Check a batch's ids and claim them until the returned guard drops.
    fn reserve_documents(&self, documents: &[SourceDocument]) -> Result<Reservation<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        let ledger = self.read();
        let mut seen = HashSet::new();

        for document in documents {
            let id = document.id();
            let known = ledger
                .document(id)
                .is_some_and(|record| record.state != TaskState::Failed);
            if known || in_flight.contains(id) || !seen.insert(id.clone()) {
                return Err(PoauditError::DuplicateDocument(id.to_string()));
            }
        }

        in_flight.extend(seen.iter().cloned());
        Ok(Reservation {
            in_flight: &self.in_flight,
            ids: seen.into_iter().collect(),
        })
    }

    /// Shared read access to the ledger.
    pub fn read(&self) -> RwLockReadGuard<'_, Ledger> {
        self.ledger.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Ledger> {
        self.ledger.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Correct one line item; only that item is re-audited.
    pub fn apply_correction(&self, key: &RowKey, patch: &LineItemPatch) -> Result<Correction> {
        Ok(self.write().apply_correction(key, patch, &self.policy)?)
    }

    /// Delete one line item.
    pub fn remove_item(&self, key: &RowKey) -> Result<AuditedItem> {
        Ok(self.write().remove(key)?)
    }

    pub fn summary(&self) -> LedgerSummary {
        self.read().summary()
    }

    /// Clone of the current ledger.
    pub fn snapshot(&self) -> Ledger {
        self.read().clone()
    }

    /// End the session, handing back the final ledger.
    pub fn close(self) -> Ledger {
        info!("Session {} closed", self.id);
        self.ledger.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}
