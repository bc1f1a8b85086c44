//! Configuration structures for the extraction and audit pipeline.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{PoauditError, Result};
use crate::models::line_item::CanonicalField;
use crate::normalize::{DEFAULT_SPEC_PATTERNS, FieldAliases};

/// Upper bound on concurrent recognition calls, whatever the hardware.
pub const MAX_CONCURRENCY_CAP: usize = 8;

/// Main configuration for a poaudit session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoauditConfig {
    /// Field normalization configuration.
    pub extraction: ExtractionConfig,

    /// Tolerance policy.
    pub audit: AuditConfig,

    /// Worker pool configuration.
    pub pool: PoolConfig,

    /// Conversational agent configuration.
    pub agent: AgentConfig,

    /// Spreadsheet export layout.
    pub export: ExportConfig,

    /// Remote recognition service.
    pub recognition: RecognitionConfig,
}

/// Field normalization configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Split size/model text off item names into `spec`.
    pub name_spec_split: bool,

    /// Correct common OCR letter/digit confusions inside numeric fields.
    pub auto_correct: bool,

    /// Canonical field -> accepted raw key spellings, in priority order.
    pub field_alias_map: FieldAliases,

    /// Regexes with named groups `name` and `spec`, tried in order.
    pub spec_patterns: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            name_spec_split: false,
            auto_correct: true,
            field_alias_map: FieldAliases::default(),
            spec_patterns: DEFAULT_SPEC_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Tolerance policy for the arithmetic audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Absolute tolerance (default: one smallest currency unit).
    pub absolute_tolerance: Decimal,

    /// Relative tolerance as a fraction of the expected amount.
    pub relative_tolerance: Decimal,

    /// Multiple of the tolerance above which a deviation is an ERROR.
    pub escalation_factor: Decimal,

    /// Decimal places of the document currency.
    pub currency_precision: u32,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            absolute_tolerance: Decimal::new(1, 2),
            relative_tolerance: Decimal::new(1, 2),
            escalation_factor: Decimal::TEN,
            currency_precision: 2,
        }
    }
}

/// Extraction worker pool configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum concurrent documents (0 = hardware parallelism).
    pub max_concurrency: usize,

    /// Budget for a single recognition call.
    pub task_timeout_seconds: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 0,
            task_timeout_seconds: 120,
        }
    }
}

impl PoolConfig {
    /// Concurrency actually used, always within `1..=MAX_CONCURRENCY_CAP`.
    pub fn effective_concurrency(&self) -> usize {
        let requested = if self.max_concurrency == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.max_concurrency
        };
        requested.clamp(1, MAX_CONCURRENCY_CAP)
    }
}

/// Conversational agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Tool calls allowed before the model must answer.
    pub max_tool_rounds: usize,

    /// Budget for a single language model call.
    pub model_timeout_seconds: u64,

    /// Chat endpoint used by the CLI `ask` command.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 8,
            model_timeout_seconds: 60,
            endpoint: None,
        }
    }
}

/// Spreadsheet export layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub items_sheet: String,
    pub failures_sheet: String,
    pub min_column_width: usize,
    pub max_column_width: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            items_sheet: "Line Items".to_string(),
            failures_sheet: "Failed Documents".to_string(),
            min_column_width: 8,
            max_column_width: 50,
        }
    }
}

/// Remote recognition service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Endpoint receiving document bytes. Unset means payload files only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// HTTP request timeout.
    pub request_timeout_seconds: u64,

    /// Extra static headers sent with each request.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            request_timeout_seconds: 120,
            headers: BTreeMap::new(),
        }
    }
}

impl PoauditConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check option ranges.
    pub fn validate(&self) -> Result<()> {
        let audit = &self.audit;
        if audit.absolute_tolerance.is_sign_negative() {
            return Err(PoauditError::Config(
                "audit.absolute_tolerance must not be negative".into(),
            ));
        }
        if audit.relative_tolerance.is_sign_negative() {
            return Err(PoauditError::Config(
                "audit.relative_tolerance must not be negative".into(),
            ));
        }
        if audit.escalation_factor < Decimal::ONE {
            return Err(PoauditError::Config(
                "audit.escalation_factor must be at least 1".into(),
            ));
        }
        if audit.currency_precision > 8 {
            return Err(PoauditError::Config(
                "audit.currency_precision must be at most 8".into(),
            ));
        }

        if self.pool.task_timeout_seconds == 0 {
            return Err(PoauditError::Config(
                "pool.task_timeout_seconds must be positive".into(),
            ));
        }
        if self.agent.model_timeout_seconds == 0 {
            return Err(PoauditError::Config(
                "agent.model_timeout_seconds must be positive".into(),
            ));
        }
        if self.recognition.request_timeout_seconds == 0 {
            return Err(PoauditError::Config(
                "recognition.request_timeout_seconds must be positive".into(),
            ));
        }

        for field in CanonicalField::REQUIRED {
            if self.extraction.field_alias_map.aliases(field).is_empty() {
                return Err(PoauditError::Config(format!(
                    "extraction.field_alias_map has no aliases for `{}`",
                    field
                )));
            }
        }

        if self.export.min_column_width > self.export.max_column_width {
            return Err(PoauditError::Config(
                "export.min_column_width exceeds export.max_column_width".into(),
            ));
        }

        Ok(())
    }
}
