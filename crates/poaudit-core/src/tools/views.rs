//! Result shapes returned by the ledger tools.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::ledger::{FailedDocument, LedgerSummary, SeverityCounts, SupplierSummary};
use crate::models::line_item::{AuditedItem, FindingReason, Severity};

/// Flat view of one audited line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemView {
    pub document_id: String,
    pub row_index: usize,
    pub item_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
    pub unit_price: Option<Decimal>,
    pub quantity: Option<Decimal>,
    pub amount: Option<Decimal>,
    pub expected_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<NaiveDate>,
    pub severity: Severity,
    pub reason: FindingReason,
    /// Set for incomplete rows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub message: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub used_price_fallback: bool,
}

impl From<&AuditedItem> for ItemView {
    fn from(line: &AuditedItem) -> Self {
        let item = &line.item;
        let finding = &line.finding;
        Self {
            document_id: item.source_document_id.to_string(),
            row_index: item.row_index,
            item_name: item.item_name.clone(),
            spec: item.spec.clone(),
            unit_price: item.unit_price,
            quantity: item.quantity,
            amount: item.amount,
            expected_amount: finding.expected_amount,
            unit: item.unit.clone(),
            supplier: item.supplier.clone(),
            order_number: item.order_number.clone(),
            purchase_date: item.purchase_date,
            severity: finding.severity,
            reason: finding.reason,
            error_kind: (finding.reason == FindingReason::Incomplete)
                .then_some(ErrorKind::IncompleteLineItem),
            message: finding.message.clone(),
            used_price_fallback: item.used_price_fallback,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindItemsResult {
    /// Matches before the limit was applied.
    pub total_matches: usize,
    pub items: Vec<ItemView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopItemsResult {
    pub by: String,
    pub items: Vec<ItemView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryView {
    pub documents_processed: usize,
    pub documents_failed: usize,
    pub line_items: usize,
    pub severity: SeverityCounts,
    pub incomplete: usize,
    pub total_amount: Decimal,
    pub total_expected_amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suppliers: Option<Vec<SupplierSummary>>,
}

impl SummaryView {
    pub fn new(summary: LedgerSummary, group_by_supplier: bool) -> Self {
        Self {
            documents_processed: summary.documents_processed,
            documents_failed: summary.documents_failed,
            line_items: summary.line_items,
            severity: summary.severity,
            incomplete: summary.incomplete,
            total_amount: summary.total_amount,
            total_expected_amount: summary.total_expected_amount,
            suppliers: group_by_supplier.then_some(summary.suppliers),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedDocumentView {
    pub document_id: String,
    pub document_name: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&FailedDocument> for FailedDocumentView {
    fn from(failed: &FailedDocument) -> Self {
        Self {
            document_id: failed.document_id.to_string(),
            document_name: failed.document_name.clone(),
            kind: failed.kind,
            message: failed.message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedDocumentsResult {
    pub count: usize,
    pub documents: Vec<FailedDocumentView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionResult {
    pub item: ItemView,
    /// Severity before the correction.
    pub previous_severity: Severity,
}
