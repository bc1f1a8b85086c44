//! Per-document processing tasks.

use serde::{Deserialize, Serialize};

use super::document::{DocumentId, SourceDocument};
use super::line_item::AuditedItem;
use crate::error::ErrorKind;

/// Lifecycle state of a processing task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }
}

/// Terminal error of a failed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl TaskFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// One document's trip through the extraction pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingTask {
    pub document_id: DocumentId,
    pub document_name: String,
    pub state: TaskState,
    /// Audited rows; only populated once the task succeeded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<AuditedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<TaskFailure>,
    /// Wall time spent running, in milliseconds.
    pub elapsed_ms: u64,
}

impl ProcessingTask {
    pub fn queued(document: &SourceDocument) -> Self {
        Self {
            document_id: document.id().clone(),
            document_name: document.name().to_string(),
            state: TaskState::Queued,
            items: Vec::new(),
            failure: None,
            elapsed_ms: 0,
        }
    }

    pub fn start(&mut self) {
        self.state = TaskState::Running;
    }

    pub fn succeed(&mut self, items: Vec<AuditedItem>, elapsed_ms: u64) {
        self.state = TaskState::Succeeded;
        self.items = items;
        self.failure = None;
        self.elapsed_ms = elapsed_ms;
    }

    /// Mark the task failed. Any rows gathered so far are dropped.
    pub fn fail(&mut self, failure: TaskFailure, elapsed_ms: u64) {
        self.state = TaskState::Failed;
        self.items.clear();
        self.failure = Some(failure);
        self.elapsed_ms = elapsed_ms;
    }
}
