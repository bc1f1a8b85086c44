//! Batch processing statistics.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::models::task::{ProcessingTask, TaskState};

/// Summary of one batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_documents: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Subset of `failed` that was never dispatched.
    pub cancelled: usize,
    pub line_items: usize,
    pub duration_ms: u64,
}

impl BatchStats {
    pub fn from_tasks(tasks: &[ProcessingTask], duration: Duration) -> Self {
        let mut stats = BatchStats {
            total_documents: tasks.len(),
            duration_ms: duration.as_millis() as u64,
            ..Default::default()
        };

        for task in tasks {
            match task.state {
                TaskState::Succeeded => {
                    stats.succeeded += 1;
                    stats.line_items += task.items.len();
                }
                TaskState::Failed => {
                    stats.failed += 1;
                    if task.failure.as_ref().is_some_and(|f| f.kind == ErrorKind::Cancelled) {
                        stats.cancelled += 1;
                    }
                }
                TaskState::Queued | TaskState::Running => {}
            }
        }

        stats
    }

    /// Throughput over the whole batch.
    pub fn documents_per_second(&self) -> f64 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        self.total_documents as f64 / (self.duration_ms as f64 / 1000.0)
    }
}
