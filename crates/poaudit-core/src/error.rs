//! Error types for the poaudit-core library.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the poaudit library.
#[derive(Error, Debug)]
pub enum PoauditError {
    /// Recognition capability error.
    #[error("recognition error: {0}")]
    Recognition(#[from] RecognitionError),

    /// Field normalization error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Ledger lookup or edit error.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Tool dispatch error.
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    /// Agent loop error.
    #[error("agent error: {0}")]
    Agent(#[from] AgentError),

    /// Export error.
    #[error("export error: {0}")]
    Export(#[from] ExportError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A document with the same identifier is already part of the session.
    #[error("document already ingested: {0}")]
    DuplicateDocument(String),
}

/// Failures reported by the recognition capability.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    /// The document's media type cannot be recognized.
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// The service did not answer within the task budget.
    #[error("recognition timed out after {0}s")]
    Timeout(u64),

    /// The service answered with an error.
    #[error("recognition service error: {0}")]
    Service(String),

    /// The service answered, but the payload is not a recognizable extraction.
    #[error("malformed recognition response: {0}")]
    MalformedResponse(String),
}

/// Errors related to turning a raw extraction into line items.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// No line-item-shaped structure could be recovered.
    #[error("malformed extraction: {0}")]
    Malformed(String),
}

/// Errors related to ledger lookups and edits.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// No line item exists at the given provenance key.
    #[error("no line item at {document_id}#{row_index}")]
    RowNotFound { document_id: String, row_index: usize },

    /// The correction carried no changes.
    #[error("correction for {0} is empty")]
    EmptyCorrection(String),
}

/// Errors surfaced to the agent loop by the tool dispatcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// Unknown tool name or arguments violating the tool's input schema.
    #[error("invalid invocation of `{tool}`: {reason}")]
    InvalidInvocation { tool: String, reason: String },
}

impl ToolError {
    pub fn invalid(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        ToolError::InvalidInvocation {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Structured form handed back to the language model so it can retry.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ToolError::InvalidInvocation { tool, reason } => serde_json::json!({
                "error": {
                    "kind": ErrorKind::InvalidToolInvocation,
                    "tool": tool,
                    "message": reason,
                }
            }),
        }
    }
}

/// Errors from the conversational agent loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// The language model failed to answer.
    #[error("language model error: {0}")]
    Model(String),

    /// The language model did not answer in time.
    #[error("language model timed out after {0}s")]
    ModelTimeout(u64),

    /// The model kept requesting tools past the configured bound.
    #[error("no final answer after {0} tool rounds")]
    ToolRoundsExhausted(usize),
}

/// Errors related to ledger export.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Spreadsheet writer error.
    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// CSV writer error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON writer error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Classification stored on failed tasks and ledger placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedMediaType,
    RecognitionTimeout,
    RecognitionServiceError,
    MalformedExtraction,
    IncompleteLineItem,
    InvalidToolInvocation,
    /// The batch was cancelled before the document was dispatched.
    Cancelled,
    /// The worker task died without producing an outcome.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedMediaType => "unsupported_media_type",
            ErrorKind::RecognitionTimeout => "recognition_timeout",
            ErrorKind::RecognitionServiceError => "recognition_service_error",
            ErrorKind::MalformedExtraction => "malformed_extraction",
            ErrorKind::IncompleteLineItem => "incomplete_line_item",
            ErrorKind::InvalidToolInvocation => "invalid_tool_invocation",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RecognitionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecognitionError::UnsupportedMediaType(_) => ErrorKind::UnsupportedMediaType,
            RecognitionError::Timeout(_) => ErrorKind::RecognitionTimeout,
            RecognitionError::Service(_) => ErrorKind::RecognitionServiceError,
            RecognitionError::MalformedResponse(_) => ErrorKind::MalformedExtraction,
        }
    }
}

impl ExtractionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractionError::Malformed(_) => ErrorKind::MalformedExtraction,
        }
    }
}

/// Result type for the poaudit library.
pub type Result<T> = std::result::Result<T, PoauditError>;
