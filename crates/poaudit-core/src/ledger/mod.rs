//! Ledger aggregation: the ordered dataset of audited line items.
//!
//! The ledger is append-only during extraction. Afterwards single entries can
//! be corrected or removed by provenance key without touching the order or
//! the findings of any other entry.

mod summary;

pub use summary::{LedgerSummary, SeverityCounts, SupplierSummary};

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audit::AuditPolicy;
use crate::error::{ErrorKind, LedgerError, Result};
use crate::models::document::DocumentId;
use crate::models::line_item::{AuditFinding, AuditedItem, LineItemPatch, RowKey};
use crate::models::task::{ProcessingTask, TaskState};

/// Placeholder for a document whose processing failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedDocument {
    pub document_id: DocumentId,
    pub document_name: String,
    pub kind: ErrorKind,
    pub message: String,
    pub elapsed_ms: u64,
}

/// Result of a correction: the finding before the edit and the re-audited item.
#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    pub previous: AuditFinding,
    pub item: AuditedItem,
}

/// One ledger row: an audited line item or a failed-document placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum LedgerEntry {
    Line(AuditedItem),
    Failed(FailedDocument),
}

impl LedgerEntry {
    pub fn document_id(&self) -> &DocumentId {
        match self {
            LedgerEntry::Line(line) => &line.item.source_document_id,
            LedgerEntry::Failed(failed) => &failed.document_id,
        }
    }

    pub fn as_line(&self) -> Option<&AuditedItem> {
        match self {
            LedgerEntry::Line(line) => Some(line),
            LedgerEntry::Failed(_) => None,
        }
    }
}

/// A document known to the ledger and how its processing ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_id: DocumentId,
    pub document_name: String,
    pub state: TaskState,
    pub line_count: usize,
    pub elapsed_ms: u64,
}

/// Ordered dataset of audited line items across all processed documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
    documents: Vec<DocumentRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Documents in the order they were appended.
    pub fn documents(&self) -> &[DocumentRecord] {
        &self.documents
    }

    pub fn document(&self, id: &DocumentId) -> Option<&DocumentRecord> {
        self.documents.iter().find(|d| &d.document_id == id)
    }

    /// Audited line items in ledger order.
    pub fn items(&self) -> impl Iterator<Item = &AuditedItem> {
        self.entries.iter().filter_map(LedgerEntry::as_line)
    }

    /// Failed-document placeholders in ledger order.
    pub fn failures(&self) -> impl Iterator<Item = &FailedDocument> {
        self.entries.iter().filter_map(|entry| match entry {
            LedgerEntry::Failed(failed) => Some(failed),
            LedgerEntry::Line(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append terminal task outcomes in the given order.
    ///
    /// Succeeded tasks contribute their line items; failed tasks contribute a
    /// placeholder. A document that had failed before is replaced by its new
    /// outcome, which lands at the end of the ledger.
    pub fn append_outcomes(&mut self, tasks: impl IntoIterator<Item = ProcessingTask>) {
        for task in tasks {
            self.append(task);
        }
    }

    fn append(&mut self, task: ProcessingTask) {
        if self
            .document(&task.document_id)
            .is_some_and(|d| d.state == TaskState::Failed)
        {
            debug!("Replacing failed placeholder for {}", task.document_id);
            self.entries.retain(|e| e.document_id() != &task.document_id);
            self.documents.retain(|d| d.document_id != task.document_id);
        }

        let succeeded = task.state == TaskState::Succeeded;
        self.documents.push(DocumentRecord {
            document_id: task.document_id.clone(),
            document_name: task.document_name.clone(),
            state: if succeeded { TaskState::Succeeded } else { TaskState::Failed },
            line_count: task.items.len(),
            elapsed_ms: task.elapsed_ms,
        });

        if succeeded {
            self.entries
                .extend(task.items.into_iter().map(LedgerEntry::Line));
        } else {
            let (kind, message) = match task.failure {
                Some(failure) => (failure.kind, failure.message),
                None => (ErrorKind::Internal, "task did not finish".to_string()),
            };
            self.entries.push(LedgerEntry::Failed(FailedDocument {
                document_id: task.document_id,
                document_name: task.document_name,
                kind,
                message,
                elapsed_ms: task.elapsed_ms,
            }));
        }
    }

    /// Look up a line item by provenance key.
    pub fn get(&self, key: &RowKey) -> Option<&AuditedItem> {
        self.items().find(|line| line.item.key() == *key)
    }

    fn position(&self, key: &RowKey) -> std::result::Result<usize, LedgerError> {
        self.entries
            .iter()
            .position(|entry| entry.as_line().is_some_and(|line| line.item.key() == *key))
            .ok_or_else(|| LedgerError::RowNotFound {
                document_id: key.document_id.to_string(),
                row_index: key.row_index,
            })
    }

    /// Apply a correction to one line item and re-audit that item only.
    pub fn apply_correction(
        &mut self,
        key: &RowKey,
        patch: &LineItemPatch,
        policy: &AuditPolicy,
    ) -> std::result::Result<Correction, LedgerError> {
        if patch.is_empty() {
            return Err(LedgerError::EmptyCorrection(key.to_string()));
        }

        let index = self.position(key)?;
        let LedgerEntry::Line(line) = &mut self.entries[index] else {
            return Err(LedgerError::RowNotFound {
                document_id: key.document_id.to_string(),
                row_index: key.row_index,
            });
        };

        let numeric_changed = patch.apply(&mut line.item);
        let previous = std::mem::replace(&mut line.finding, policy.audit(&line.item));
        debug!(
            "Corrected {} (numeric change: {}), severity {} -> {}",
            key, numeric_changed, previous.severity, line.finding.severity
        );

        Ok(Correction {
            previous,
            item: line.clone(),
        })
    }

    /// Remove one line item. Other entries keep their order.
    pub fn remove(&mut self, key: &RowKey) -> std::result::Result<AuditedItem, LedgerError> {
        let index = self.position(key)?;
        match self.entries.remove(index) {
            LedgerEntry::Line(line) => {
                if let Some(record) = self
                    .documents
                    .iter_mut()
                    .find(|d| d.document_id == key.document_id)
                {
                    record.line_count = record.line_count.saturating_sub(1);
                }
                Ok(line)
            }
            LedgerEntry::Failed(_) => Err(LedgerError::RowNotFound {
                document_id: key.document_id.to_string(),
                row_index: key.row_index,
            }),
        }
    }

    /// Aggregate statistics over the current state.
    pub fn summary(&self) -> LedgerSummary {
        LedgerSummary::compute(self)
    }

    /// Write a JSON snapshot.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load a JSON snapshot written by [`Ledger::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
