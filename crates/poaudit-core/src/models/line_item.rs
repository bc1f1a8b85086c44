//! Canonical line items and their audit findings.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::document::DocumentId;

/// Canonical fields a raw recognition key can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    ItemName,
    Spec,
    UnitPrice,
    Quantity,
    Amount,
    Unit,
    Supplier,
    OrderNumber,
    PurchaseDate,
    /// Every price-like number seen on the row, space separated.
    RawPrices,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 10] = [
        CanonicalField::ItemName,
        CanonicalField::Spec,
        CanonicalField::UnitPrice,
        CanonicalField::Quantity,
        CanonicalField::Amount,
        CanonicalField::Unit,
        CanonicalField::Supplier,
        CanonicalField::OrderNumber,
        CanonicalField::PurchaseDate,
        CanonicalField::RawPrices,
    ];

    /// Fields whose absence from the alias map makes normalization pointless.
    pub const REQUIRED: [CanonicalField; 4] = [
        CanonicalField::ItemName,
        CanonicalField::UnitPrice,
        CanonicalField::Quantity,
        CanonicalField::Amount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::ItemName => "item_name",
            CanonicalField::Spec => "spec",
            CanonicalField::UnitPrice => "unit_price",
            CanonicalField::Quantity => "quantity",
            CanonicalField::Amount => "amount",
            CanonicalField::Unit => "unit",
            CanonicalField::Supplier => "supplier",
            CanonicalField::OrderNumber => "order_number",
            CanonicalField::PurchaseDate => "purchase_date",
            CanonicalField::RawPrices => "raw_prices",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance key of a line item: source document and row position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowKey {
    pub document_id: DocumentId,
    pub row_index: usize,
}

impl RowKey {
    pub fn new(document_id: impl Into<DocumentId>, row_index: usize) -> Self {
        Self {
            document_id: document_id.into(),
            row_index,
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.document_id, self.row_index)
    }
}

/// One purchase-order row after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Document this row was extracted from.
    pub source_document_id: DocumentId,

    /// Position within the source document, as returned by recognition.
    pub row_index: usize,

    /// Product name (with size/model text when split mode is off).
    pub item_name: String,

    /// Size/model text split off the name. Only set in split mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,

    pub unit_price: Option<Decimal>,

    pub quantity: Option<Decimal>,

    /// Line amount as printed on the document.
    pub amount: Option<Decimal>,

    /// Unit of measure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<NaiveDate>,

    /// Canonical fields that were absent or failed coercion.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<CanonicalField>,

    /// Prices were allocated from the raw price list instead of labeled fields.
    #[serde(default)]
    pub used_price_fallback: bool,
}

impl LineItem {
    /// Create an empty line item at the given position.
    pub fn new(source_document_id: impl Into<DocumentId>, row_index: usize) -> Self {
        Self {
            source_document_id: source_document_id.into(),
            row_index,
            item_name: String::new(),
            spec: None,
            unit_price: None,
            quantity: None,
            amount: None,
            unit: None,
            supplier: None,
            order_number: None,
            purchase_date: None,
            missing_fields: Vec::new(),
            used_price_fallback: false,
        }
    }

    pub fn key(&self) -> RowKey {
        RowKey::new(self.source_document_id.clone(), self.row_index)
    }

    /// Whether all three numeric fields are present.
    pub fn is_complete(&self) -> bool {
        self.unit_price.is_some() && self.quantity.is_some() && self.amount.is_some()
    }

    pub(crate) fn mark_missing(&mut self, field: CanonicalField) {
        if !self.missing_fields.contains(&field) {
            self.missing_fields.push(field);
        }
    }

    pub(crate) fn clear_missing(&mut self, field: CanonicalField) {
        self.missing_fields.retain(|f| *f != field);
    }
}

/// Audit severity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "OK", alias = "ok", alias = "Ok")]
    Ok,
    #[serde(rename = "WARN", alias = "warn", alias = "Warn")]
    Warn,
    #[serde(rename = "ERROR", alias = "error", alias = "Error")]
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Ok => "OK",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a finding has its severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingReason {
    WithinTolerance,
    /// A numeric field is missing, so the row cannot be checked.
    Incomplete,
    /// Zero price or quantity with a non-zero amount.
    ZeroValue,
    OutOfTolerance,
}

impl FindingReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingReason::WithinTolerance => "within_tolerance",
            FindingReason::Incomplete => "incomplete",
            FindingReason::ZeroValue => "zero_value",
            FindingReason::OutOfTolerance => "out_of_tolerance",
        }
    }
}

impl fmt::Display for FindingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Difference between the printed and the computed amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deviation {
    /// `|actual - expected|`.
    pub absolute: Decimal,
    /// `absolute / |expected|`; absent when expected is zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative: Option<Decimal>,
}

/// Result of auditing one line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditFinding {
    /// `round(unit_price * quantity, precision)`.
    pub expected_amount: Option<Decimal>,
    pub actual_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deviation: Option<Deviation>,
    pub severity: Severity,
    pub reason: FindingReason,
    /// Human-readable explanation.
    pub message: String,
}

/// A line item together with its latest audit finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditedItem {
    pub item: LineItem,
    pub finding: AuditFinding,
}

/// Partial update of a line item, applied by user or tool edits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LineItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
}

impl LineItemPatch {
    pub fn is_empty(&self) -> bool {
        self.item_name.is_none()
            && self.spec.is_none()
            && self.unit_price.is_none()
            && self.quantity.is_none()
            && self.amount.is_none()
            && self.unit.is_none()
            && self.supplier.is_none()
    }

    /// Apply the patch in place. Returns true if a numeric field changed.
    pub fn apply(&self, item: &mut LineItem) -> bool {
        let mut numeric_changed = false;

        if let Some(name) = &self.item_name {
            item.item_name = name.trim().to_string();
            item.clear_missing(CanonicalField::ItemName);
        }
        if let Some(spec) = &self.spec {
            item.spec = Some(spec.trim().to_string()).filter(|s| !s.is_empty());
        }
        if let Some(unit) = &self.unit {
            item.unit = Some(unit.trim().to_string()).filter(|s| !s.is_empty());
        }
        if let Some(supplier) = &self.supplier {
            item.supplier = Some(supplier.trim().to_string()).filter(|s| !s.is_empty());
        }

        let numeric = [
            (self.unit_price, &mut item.unit_price, CanonicalField::UnitPrice),
            (self.quantity, &mut item.quantity, CanonicalField::Quantity),
            (self.amount, &mut item.amount, CanonicalField::Amount),
        ];
        let mut cleared = Vec::new();
        for (new_value, slot, field) in numeric {
            if let Some(value) = new_value {
                if *slot != Some(value) {
                    numeric_changed = true;
                }
                *slot = Some(value);
                cleared.push(field);
            }
        }
        for field in cleared {
            item.clear_missing(field);
        }

        numeric_changed
    }
}
