//! Tabular export of the ledger.
//!
//! Both formats share one column layout: one row per line item covering every
//! line item and finding field, and a separate table for failed documents.

mod csv;
mod xlsx;

pub use self::csv::{FAILURES_SECTION, write_csv, write_csv_to};
pub use self::xlsx::write_xlsx;

use rust_decimal::Decimal;

use crate::ledger::FailedDocument;
use crate::models::line_item::AuditedItem;

/// Header of the line item table.
pub const ITEM_COLUMNS: [&str; 19] = [
    "document_id",
    "row_index",
    "item_name",
    "spec",
    "unit",
    "quantity",
    "unit_price",
    "amount",
    "expected_amount",
    "deviation",
    "relative_deviation",
    "severity",
    "reason",
    "message",
    "supplier",
    "order_number",
    "purchase_date",
    "missing_fields",
    "used_price_fallback",
];

/// Header of the failed document table.
pub const FAILURE_COLUMNS: [&str; 5] = [
    "document_id",
    "document_name",
    "error_kind",
    "message",
    "elapsed_ms",
];

/// A single exported value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cell {
    Text(String),
    Number(Decimal),
    /// Indices and durations, shown without decimals.
    Integer(u64),
    Empty,
}

impl Cell {
    fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    fn opt_text(value: Option<impl ToString>) -> Self {
        value.map_or(Cell::Empty, |v| Cell::Text(v.to_string()))
    }

    fn opt_number(value: Option<Decimal>) -> Self {
        value.map_or(Cell::Empty, Cell::Number)
    }

    /// Rendering used by CSV and for column width estimates.
    pub(crate) fn render(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(d) => d.normalize().to_string(),
            Cell::Integer(n) => n.to_string(),
            Cell::Empty => String::new(),
        }
    }
}

pub(crate) fn item_cells(line: &AuditedItem) -> [Cell; 19] {
    let item = &line.item;
    let finding = &line.finding;
    let missing = item
        .missing_fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    [
        Cell::text(item.source_document_id.as_str()),
        Cell::Integer(item.row_index as u64),
        Cell::text(item.item_name.as_str()),
        Cell::opt_text(item.spec.as_deref()),
        Cell::opt_text(item.unit.as_deref()),
        Cell::opt_number(item.quantity),
        Cell::opt_number(item.unit_price),
        Cell::opt_number(item.amount),
        Cell::opt_number(finding.expected_amount),
        Cell::opt_number(finding.deviation.map(|d| d.absolute)),
        Cell::opt_number(finding.deviation.and_then(|d| d.relative)),
        Cell::text(finding.severity.as_str()),
        Cell::text(finding.reason.as_str()),
        Cell::text(finding.message.as_str()),
        Cell::opt_text(item.supplier.as_deref()),
        Cell::opt_text(item.order_number.as_deref()),
        Cell::opt_text(item.purchase_date.map(|d| d.format("%Y-%m-%d"))),
        Cell::text(missing),
        Cell::text(if item.used_price_fallback { "yes" } else { "no" }),
    ]
}

pub(crate) fn failure_cells(failed: &FailedDocument) -> [Cell; 5] {
    [
        Cell::text(failed.document_id.as_str()),
        Cell::text(failed.document_name.as_str()),
        Cell::text(failed.kind.as_str()),
        Cell::text(failed.message.as_str()),
        Cell::Integer(failed.elapsed_ms),
    ]
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::audit::AuditPolicy;
    use crate::error::ErrorKind;
    use crate::ledger::Ledger;
    use crate::models::document::{MediaType, SourceDocument};
    use crate::models::line_item::LineItem;
    use crate::models::task::{ProcessingTask, TaskFailure};
    use rust_decimal::Decimal;

    /// Two lines (one ERROR, one incomplete) and one failed document.
    pub fn ledger() -> Ledger {
        let policy = AuditPolicy::default();
        let source = SourceDocument::new("po-1", "po-1.pdf", MediaType::Pdf, Vec::new());
        let mut task = ProcessingTask::queued(&source);

        let mut bolt = LineItem::new("po-1", 0);
        bolt.item_name = "Hex bolt".to_string();
        bolt.spec = Some("M8x40".to_string());
        bolt.unit_price = Some(Decimal::new(1000, 2));
        bolt.quantity = Some(Decimal::from(3));
        bolt.amount = Some(Decimal::new(4500, 2));
        bolt.supplier = Some("Acme, Inc.".to_string());

        let mut nut = LineItem::new("po-1", 1);
        nut.item_name = "Nut".to_string();
        nut.unit_price = Some(Decimal::new(50, 2));
        nut.amount = Some(Decimal::from(5));
        nut.missing_fields = vec![crate::models::line_item::CanonicalField::Quantity];

        task.succeed(vec![policy.audit_item(bolt), policy.audit_item(nut)], 12);

        let broken = SourceDocument::new("po-2", "po-2.png", MediaType::Png, Vec::new());
        let mut failed = ProcessingTask::queued(&broken);
        failed.fail(TaskFailure::new(ErrorKind::RecognitionServiceError, "HTTP 502"), 40);

        let mut ledger = Ledger::new();
        ledger.append_outcomes([task, failed]);
        ledger
    }
}
