//! Query/tool dispatcher over the session ledger.
//!
//! Tools are the only way the conversational layer reaches the ledger. Each
//! call is validated against its schema before it runs, and results are
//! view structs rather than ledger internals. No tool triggers recognition.

mod schema;
mod views;

pub use schema::{
    APPLY_CORRECTION, FIND_ITEMS, LIST_FAILED_DOCUMENTS, LOOKUP_ROW, SUMMARIZE_LEDGER, TOOL_NAMES,
    TOP_ITEMS, tool_definitions,
};
pub use views::{
    CorrectionResult, FailedDocumentView, FailedDocumentsResult, FindItemsResult, ItemView,
    SummaryView, TopItemsResult,
};

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ToolError;
use crate::models::line_item::{AuditedItem, LineItemPatch, RowKey, Severity};
use crate::session::Session;
use schema::{
    FIND_ITEMS_DEFAULT_LIMIT, FIND_ITEMS_MAX_LIMIT, TOP_ITEMS_DEFAULT_LIMIT, TOP_ITEMS_MAX_LIMIT,
};

/// A tool invocation requested by the language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier assigned by the model, echoed back with the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FindItemsArgs {
    severity: Option<Severity>,
    supplier: Option<String>,
    document_id: Option<String>,
    name_contains: Option<String>,
    min_amount: Option<Decimal>,
    max_amount: Option<Decimal>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SummarizeArgs {
    group_by_supplier: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LookupRowArgs {
    document_id: String,
    row_index: usize,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RankBy {
    UnitPrice,
    Amount,
    Quantity,
}

impl RankBy {
    fn as_str(&self) -> &'static str {
        match self {
            RankBy::UnitPrice => "unit_price",
            RankBy::Amount => "amount",
            RankBy::Quantity => "quantity",
        }
    }

    fn value(&self, line: &AuditedItem) -> Option<Decimal> {
        match self {
            RankBy::UnitPrice => line.item.unit_price,
            RankBy::Amount => line.item.amount,
            RankBy::Quantity => line.item.quantity,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TopItemsArgs {
    by: RankBy,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArgs {}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ApplyCorrectionArgs {
    document_id: String,
    row_index: usize,
    changes: LineItemPatch,
}

/// Routes tool calls to read and edit operations on a session's ledger.
pub struct ToolDispatcher<'a> {
    session: &'a Session,
}

impl<'a> ToolDispatcher<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Schemas of every available tool.
    pub fn definitions(&self) -> Vec<Value> {
        tool_definitions()
    }

    /// Validate and execute one tool call.
    pub fn dispatch(&self, call: &ToolCall) -> Result<Value, ToolError> {
        debug!("Dispatching tool {} with {}", call.name, call.arguments);
        let name = call.name.as_str();

        match name {
            FIND_ITEMS => to_value(name, self.find_items(parse_args(name, &call.arguments)?)?),
            SUMMARIZE_LEDGER => to_value(name, self.summarize(parse_args(name, &call.arguments)?)),
            LOOKUP_ROW => to_value(name, self.lookup_row(parse_args(name, &call.arguments)?)?),
            TOP_ITEMS => to_value(name, self.top_items(parse_args(name, &call.arguments)?)?),
            LIST_FAILED_DOCUMENTS => {
                let NoArgs {} = parse_args(name, &call.arguments)?;
                to_value(name, self.list_failed())
            }
            APPLY_CORRECTION => {
                to_value(name, self.apply_correction(parse_args(name, &call.arguments)?)?)
            }
            _ => Err(ToolError::invalid(
                name,
                format!("unknown tool, expected one of: {}", TOOL_NAMES.join(", ")),
            )),
        }
    }

    fn find_items(&self, args: FindItemsArgs) -> Result<FindItemsResult, ToolError> {
        let limit = check_limit(
            FIND_ITEMS,
            args.limit,
            FIND_ITEMS_DEFAULT_LIMIT,
            FIND_ITEMS_MAX_LIMIT,
        )?;
        if let (Some(min), Some(max)) = (args.min_amount, args.max_amount) {
            if min > max {
                return Err(ToolError::invalid(
                    FIND_ITEMS,
                    "min_amount must not exceed max_amount",
                ));
            }
        }

        let supplier = args.supplier.map(|s| s.trim().to_lowercase());
        let needle = args.name_contains.map(|s| s.trim().to_lowercase());

        let ledger = self.session.read();
        let matches: Vec<&AuditedItem> = ledger
            .items()
            .filter(|line| args.severity.is_none_or(|s| line.finding.severity == s))
            .filter(|line| {
                args.document_id
                    .as_deref()
                    .is_none_or(|id| line.item.source_document_id.as_str() == id)
            })
            .filter(|line| {
                supplier.as_deref().is_none_or(|wanted| {
                    line.item
                        .supplier
                        .as_deref()
                        .is_some_and(|s| s.trim().to_lowercase() == wanted)
                })
            })
            .filter(|line| {
                needle
                    .as_deref()
                    .is_none_or(|n| line.item.item_name.to_lowercase().contains(n))
            })
            .filter(|line| {
                args.min_amount
                    .is_none_or(|min| line.item.amount.is_some_and(|a| a >= min))
            })
            .filter(|line| {
                args.max_amount
                    .is_none_or(|max| line.item.amount.is_some_and(|a| a <= max))
            })
            .collect();

        Ok(FindItemsResult {
            total_matches: matches.len(),
            items: matches.into_iter().take(limit).map(ItemView::from).collect(),
        })
    }

    fn summarize(&self, args: SummarizeArgs) -> SummaryView {
        SummaryView::new(
            self.session.summary(),
            args.group_by_supplier.unwrap_or(true),
        )
    }

    fn lookup_row(&self, args: LookupRowArgs) -> Result<ItemView, ToolError> {
        let key = RowKey::new(args.document_id, args.row_index);
        let ledger = self.session.read();
        ledger
            .get(&key)
            .map(ItemView::from)
            .ok_or_else(|| ToolError::invalid(LOOKUP_ROW, format!("no line item at {}", key)))
    }

    fn top_items(&self, args: TopItemsArgs) -> Result<TopItemsResult, ToolError> {
        let limit = check_limit(
            TOP_ITEMS,
            args.limit,
            TOP_ITEMS_DEFAULT_LIMIT,
            TOP_ITEMS_MAX_LIMIT,
        )?;

        let ledger = self.session.read();
        let mut ranked: Vec<(Decimal, &AuditedItem)> = ledger
            .items()
            .filter_map(|line| args.by.value(line).map(|v| (v, line)))
            .collect();
        // Stable sort keeps ledger order among ties
        ranked.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(TopItemsResult {
            by: args.by.as_str().to_string(),
            items: ranked
                .into_iter()
                .take(limit)
                .map(|(_, line)| ItemView::from(line))
                .collect(),
        })
    }

    fn list_failed(&self) -> FailedDocumentsResult {
        let ledger = self.session.read();
        let documents: Vec<FailedDocumentView> =
            ledger.failures().map(FailedDocumentView::from).collect();
        FailedDocumentsResult {
            count: documents.len(),
            documents,
        }
    }

    fn apply_correction(&self, args: ApplyCorrectionArgs) -> Result<CorrectionResult, ToolError> {
        let key = RowKey::new(args.document_id, args.row_index);
        let correction = self
            .session
            .apply_correction(&key, &args.changes)
            .map_err(|err| ToolError::invalid(APPLY_CORRECTION, err.to_string()))?;

        Ok(CorrectionResult {
            item: ItemView::from(&correction.item),
            previous_severity: correction.previous.severity,
        })
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: &Value) -> Result<T, ToolError> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        Value::Object(_) => arguments.clone(),
        other => {
            return Err(ToolError::invalid(
                tool,
                format!("arguments must be an object, got {}", other),
            ));
        }
    };
    serde_json::from_value(arguments).map_err(|e| ToolError::invalid(tool, e.to_string()))
}

fn check_limit(
    tool: &str,
    limit: Option<usize>,
    default: usize,
    max: usize,
) -> Result<usize, ToolError> {
    match limit {
        None => Ok(default),
        Some(n) if (1..=max).contains(&n) => Ok(n),
        Some(n) => Err(ToolError::invalid(
            tool,
            format!("limit must be between 1 and {}, got {}", max, n),
        )),
    }
}

fn to_value<T: Serialize>(tool: &str, result: T) -> Result<Value, ToolError> {
    serde_json::to_value(result).map_err(|e| ToolError::invalid(tool, e.to_string()))
}
