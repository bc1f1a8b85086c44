//! Core library for purchase-order extraction and audit.
//!
//! This crate provides:
//! - Recognition payload parsing behind a pluggable `Recognizer` capability
//! - Field normalization (aliases, name/spec split, OCR-tolerant numbers, ROC dates)
//! - Arithmetic audit of `unit_price * quantity = amount` with tolerances
//! - A bounded parallel extraction pool with per-document failure isolation
//! - An ordered ledger with summaries, corrections and snapshots
//! - Ledger tools for a language model agent, and XLSX/CSV export

pub mod agent;
pub mod audit;
pub mod error;
pub mod export;
pub mod ledger;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod recognition;
pub mod session;
pub mod tools;

pub use agent::{AgentAnswer, AgentLoop, ChatMessage, LanguageModel, ModelReply, Role};
pub use audit::AuditPolicy;
pub use error::{ErrorKind, PoauditError, Result};
pub use ledger::{Correction, FailedDocument, Ledger, LedgerEntry, LedgerSummary};
pub use models::config::PoauditConfig;
pub use models::document::{DocumentId, MediaType, SourceDocument};
pub use models::line_item::{AuditFinding, AuditedItem, LineItem, LineItemPatch, RowKey, Severity};
pub use models::task::{ProcessingTask, TaskState};
pub use normalize::FieldNormalizer;
pub use pipeline::{BatchStats, ExtractionPool, ProgressCallback};
pub use recognition::{PayloadRecognizer, RawExtraction, Recognizer};
pub use session::{BatchReport, Session};
pub use tools::{ToolCall, ToolDispatcher};
