//! Alias table mapping raw recognition keys to canonical fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::line_item::CanonicalField;

/// Canonical field -> accepted raw key spellings, in priority order.
///
/// Keys are compared after lowercasing and dropping spaces, underscores and
/// hyphens, so `Unit Price`, `unit_price` and `UnitPrice` are the same key.
/// Entries missing from a deserialized map keep their default spellings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<CanonicalField, Vec<String>>")]
pub struct FieldAliases(BTreeMap<CanonicalField, Vec<String>>);

impl FieldAliases {
    /// An alias table with no spellings at all.
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Accepted spellings for a field, highest priority first.
    pub fn aliases(&self, field: CanonicalField) -> &[String] {
        self.0.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace the spellings of one field.
    pub fn set(&mut self, field: CanonicalField, aliases: Vec<String>) {
        self.0.insert(field, aliases);
    }

    /// Find the value for a canonical field among raw `(key, value)` pairs.
    ///
    /// Aliases are tried in priority order; for each alias the pairs are
    /// scanned in the order returned, and the first non-blank value wins.
    pub fn resolve<'a>(&self, field: CanonicalField, pairs: &'a [(String, String)]) -> Option<&'a str> {
        for alias in self.aliases(field) {
            let wanted = normalize_key(alias);
            let found = pairs
                .iter()
                .filter(|(key, _)| normalize_key(key) == wanted)
                .map(|(_, value)| value.trim())
                .find(|value| !value.is_empty());

            if found.is_some() {
                return found;
            }
        }
        None
    }
}

impl Default for FieldAliases {
    fn default() -> Self {
        let table: [(CanonicalField, &[&str]); 10] = [
            (
                CanonicalField::ItemName,
                &["item_name", "ProductName", "product", "name", "description", "item", "品名", "品項", "名稱"],
            ),
            (
                CanonicalField::Spec,
                &["spec", "specification", "size", "model", "規格", "型號"],
            ),
            (
                CanonicalField::UnitPrice,
                &["unit_price", "UnitPrice", "price", "unit_cost", "單價"],
            ),
            (
                CanonicalField::Quantity,
                &["quantity", "qty", "count", "採購數", "數量"],
            ),
            (
                CanonicalField::Amount,
                &["amount", "line_total", "total", "subtotal", "金額", "小計"],
            ),
            (CanonicalField::Unit, &["unit", "uom", "單位"]),
            (CanonicalField::Supplier, &["supplier", "vendor", "供應商", "廠商"]),
            (
                CanonicalField::OrderNumber,
                &["order_number", "ItemOrderNo", "VendorOrderNo", "PONumber", "訂單號碼", "採購單號"],
            ),
            (
                CanonicalField::PurchaseDate,
                &["purchase_date", "ItemDate", "PurchaseDate", "date", "採購日期", "日期"],
            ),
            (CanonicalField::RawPrices, &["raw_prices", "RawPrices"]),
        ];

        Self(
            table
                .into_iter()
                .map(|(field, aliases)| (field, aliases.iter().map(|a| a.to_string()).collect()))
                .collect(),
        )
    }
}

impl From<BTreeMap<CanonicalField, Vec<String>>> for FieldAliases {
    fn from(overrides: BTreeMap<CanonicalField, Vec<String>>) -> Self {
        let mut aliases = FieldAliases::default();
        for (field, spellings) in overrides {
            aliases.set(field, spellings);
        }
        aliases
    }
}

/// Canonical comparison form of a raw key.
pub fn normalize_key(key: &str) -> String {
    key.trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}
