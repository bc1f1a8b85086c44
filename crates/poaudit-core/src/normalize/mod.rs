//! Field normalization: raw recognition output to canonical line items.

mod aliases;
mod dates;
mod numbers;
mod prices;
mod split;

pub use aliases::{FieldAliases, normalize_key};
pub use dates::parse_purchase_date;
pub use numbers::{parse_decimal, parse_quantity};
pub use prices::{AllocatedPrices, allocate_raw_prices};
pub use split::{DEFAULT_SPEC_PATTERNS, NameSpecSplitter};

use tracing::debug;

use crate::error::{ExtractionError, Result};
use crate::models::config::ExtractionConfig;
use crate::models::document::DocumentId;
use crate::models::line_item::{CanonicalField, LineItem};
use crate::recognition::{RawExtraction, RawRow};

/// Turns a [`RawExtraction`] into canonical [`LineItem`]s.
///
/// Coercion failures are contained per field: the field is left empty and
/// recorded in `missing_fields`, and the row is still emitted.
#[derive(Debug, Clone)]
pub struct FieldNormalizer {
    aliases: FieldAliases,
    splitter: Option<NameSpecSplitter>,
    auto_correct: bool,
}

/// Document-level values rows fall back to.
struct HeaderDefaults<'a> {
    supplier: Option<&'a str>,
    order_number: Option<&'a str>,
    purchase_date: Option<&'a str>,
}

impl FieldNormalizer {
    /// Build a normalizer from configuration. Fails on invalid spec patterns.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        let splitter = if config.name_spec_split {
            Some(NameSpecSplitter::new(&config.spec_patterns)?)
        } else {
            None
        };

        Ok(Self {
            aliases: config.field_alias_map.clone(),
            splitter,
            auto_correct: config.auto_correct,
        })
    }

    /// Whether item names are split into name and spec.
    pub fn splits_names(&self) -> bool {
        self.splitter.is_some()
    }

    /// Normalize every row of a raw extraction.
    ///
    /// `row_index` is the row's position in the recognition output. An empty
    /// table yields no items. Rows without any recognizable field are
    /// skipped; if rows were present but none remain the extraction is
    /// malformed.
    pub fn normalize(
        &self,
        raw: &RawExtraction,
        document_id: &DocumentId,
    ) -> std::result::Result<Vec<LineItem>, ExtractionError> {
        if raw.rows.is_empty() {
            debug!("No table rows in {}", document_id);
            return Ok(Vec::new());
        }

        let header = HeaderDefaults {
            supplier: self.aliases.resolve(CanonicalField::Supplier, &raw.header),
            order_number: self.aliases.resolve(CanonicalField::OrderNumber, &raw.header),
            purchase_date: self.aliases.resolve(CanonicalField::PurchaseDate, &raw.header),
        };

        let items: Vec<LineItem> = raw
            .rows
            .iter()
            .enumerate()
            .filter_map(|(row_index, row)| self.normalize_row(row, row_index, document_id, &header))
            .collect();

        if items.is_empty() {
            return Err(ExtractionError::Malformed(format!(
                "none of {} rows carry a recognizable field",
                raw.rows.len()
            )));
        }

        debug!(
            "Normalized {} of {} rows from {}",
            items.len(),
            raw.rows.len(),
            document_id
        );
        Ok(items)
    }

    fn normalize_row(
        &self,
        row: &RawRow,
        row_index: usize,
        document_id: &DocumentId,
        header: &HeaderDefaults<'_>,
    ) -> Option<LineItem> {
        let get = move |field| self.aliases.resolve(field, row);

        if CanonicalField::ALL.iter().all(|field| get(*field).is_none()) {
            debug!("Skipping blank row {} of {}", row_index, document_id);
            return None;
        }

        let mut item = LineItem::new(document_id.clone(), row_index);

        // Name and spec
        let raw_name = get(CanonicalField::ItemName).unwrap_or_default();
        let raw_spec = get(CanonicalField::Spec);
        match &self.splitter {
            Some(splitter) => {
                let (name, split_spec) = splitter.split(raw_name);
                item.item_name = name;
                item.spec = match (split_spec, raw_spec) {
                    (Some(split), Some(given)) => Some(format!("{} {}", split, given)),
                    (split, given) => split.or_else(|| given.map(str::to_string)),
                };
            }
            None => {
                item.item_name = match raw_spec {
                    Some(spec) if !raw_name.is_empty() => format!("{} {}", raw_name, spec),
                    Some(spec) => spec.to_string(),
                    None => raw_name.to_string(),
                };
            }
        }
        if item.item_name.is_empty() {
            item.mark_missing(CanonicalField::ItemName);
        }

        // Quantity and unit
        let (quantity, parsed_unit) = get(CanonicalField::Quantity)
            .map(|q| parse_quantity(q, self.auto_correct))
            .unwrap_or((None, None));
        item.quantity = quantity;
        item.unit = get(CanonicalField::Unit).map(str::to_string).or(parsed_unit);

        // Prices
        let raw_unit_price = get(CanonicalField::UnitPrice);
        let raw_amount = get(CanonicalField::Amount);
        item.unit_price = raw_unit_price.and_then(|p| parse_decimal(p, self.auto_correct));
        item.amount = raw_amount.and_then(|a| parse_decimal(a, self.auto_correct));

        if raw_unit_price.is_none() && raw_amount.is_none() {
            if let Some(allocated) = get(CanonicalField::RawPrices)
                .and_then(|raw| allocate_raw_prices(raw, item.quantity, self.auto_correct))
            {
                debug!(
                    "Allocated prices for {}#{} from raw price list",
                    document_id, row_index
                );
                item.unit_price = Some(allocated.unit_price);
                item.amount = Some(allocated.amount);
                item.used_price_fallback = true;
            }
        }

        for (field, value) in [
            (CanonicalField::UnitPrice, item.unit_price),
            (CanonicalField::Quantity, item.quantity),
            (CanonicalField::Amount, item.amount),
        ] {
            if value.is_none() {
                item.mark_missing(field);
            }
        }

        // Provenance fields, row values first
        item.supplier = get(CanonicalField::Supplier)
            .or(header.supplier)
            .map(str::to_string);
        item.order_number = get(CanonicalField::OrderNumber)
            .or(header.order_number)
            .map(str::to_string);
        item.purchase_date = get(CanonicalField::PurchaseDate)
            .or(header.purchase_date)
            .and_then(parse_purchase_date);

        Some(item)
    }

    /// Re-split an item's name in place. A no-op when splitting is disabled
    /// or the name is already split.
    pub fn resplit(&self, item: &mut LineItem) {
        if let Some(splitter) = &self.splitter {
            let (name, split_spec) = splitter.split(&item.item_name);
            if let Some(split) = split_spec {
                item.item_name = name;
                item.spec = Some(match item.spec.take() {
                    Some(existing) => format!("{} {}", split, existing),
                    None => split,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn normalizer(split: bool) -> FieldNormalizer {
        let config = ExtractionConfig {
            name_spec_split: split,
            ..Default::default()
        };
        FieldNormalizer::from_config(&config).unwrap()
    }

    fn doc() -> DocumentId {
        DocumentId::new("po-1.pdf")
    }

    #[test]
    fn test_normalize_complete_row() {
        let raw = RawExtraction::new()
            .with_header("Supplier", "Acme Supply")
            .with_header("PurchaseDate", "1141028")
            .with_row([
                ("Item Name", "Copy paper"),
                ("Qty", "3"),
                ("Unit Price", "$10.00"),
                ("Amount", "30.00"),
                ("Unit", "box"),
            ]);

        let items = normalizer(false).normalize(&raw, &doc()).unwrap();
        assert_eq!(items.len(), 1);

        let item = &items[0];
        assert_eq!(item.item_name, "Copy paper");
        assert_eq!(item.quantity, Some(dec("3")));
        assert_eq!(item.unit_price, Some(dec("10.00")));
        assert_eq!(item.amount, Some(dec("30.00")));
        assert_eq!(item.unit.as_deref(), Some("box"));
        assert_eq!(item.supplier.as_deref(), Some("Acme Supply"));
        assert_eq!(item.purchase_date, NaiveDate::from_ymd_opt(2025, 10, 28));
        assert!(item.missing_fields.is_empty());
        assert!(item.is_complete());
    }

    #[test]
    fn test_missing_quantity_is_marked_not_fatal() {
        let raw = RawExtraction::new().with_row([
            ("name", "Bolt"),
            ("price", "10.00"),
            ("amount", "30.00"),
        ]);

        let items = normalizer(false).normalize(&raw, &doc()).unwrap();
        assert_eq!(items[0].quantity, None);
        assert_eq!(items[0].missing_fields, vec![CanonicalField::Quantity]);
    }

    #[test]
    fn test_unparseable_price_is_marked() {
        let raw = RawExtraction::new().with_row([
            ("name", "Bolt"),
            ("qty", "3"),
            ("price", "call us"),
            ("amount", "30.00"),
        ]);

        let items = normalizer(false).normalize(&raw, &doc()).unwrap();
        assert_eq!(items[0].unit_price, None);
        assert_eq!(items[0].missing_fields, vec![CanonicalField::UnitPrice]);
    }

    #[test]
    fn test_row_order_and_indices_follow_recognition() {
        let raw = RawExtraction::new()
            .with_row([("name", "C"), ("qty", "1")])
            .with_row([("Remarks", "")])
            .with_row([("name", "A"), ("qty", "2")]);

        let items = normalizer(false).normalize(&raw, &doc()).unwrap();
        let names: Vec<_> = items.iter().map(|i| (i.item_name.as_str(), i.row_index)).collect();
        assert_eq!(names, vec![("C", 0), ("A", 2)]);
    }

    #[test]
    fn test_empty_table_yields_no_items() {
        let raw = RawExtraction::new().with_header("Supplier", "Acme Supply");
        let items = normalizer(false).normalize(&raw, &doc()).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_only_blank_rows_is_malformed() {
        let blank = RawExtraction::new()
            .with_row([("Remarks", "n/a")])
            .with_row([("Remarks", "")]);
        let err = normalizer(false).normalize(&blank, &doc()).unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed(_)));
    }

    #[test]
    fn test_merge_mode_keeps_spec_in_name() {
        let raw = RawExtraction::new().with_row([("ProductName", "膠合劑"), ("Spec", "1KG")]);

        let items = normalizer(false).normalize(&raw, &doc()).unwrap();
        assert_eq!(items[0].item_name, "膠合劑 1KG");
        assert_eq!(items[0].spec, None);
    }

    #[test]
    fn test_split_mode_splits_names() {
        let raw = RawExtraction::new()
            .with_row([("ProductName", "軟管 1\"")])
            .with_row([("ProductName", "膠合劑"), ("Spec", "1KG")]);

        let items = normalizer(true).normalize(&raw, &doc()).unwrap();
        assert_eq!(items[0].item_name, "軟管");
        assert_eq!(items[0].spec.as_deref(), Some("1\""));
        assert_eq!(items[1].item_name, "膠合劑");
        assert_eq!(items[1].spec.as_deref(), Some("1KG"));
    }

    #[test]
    fn test_resplit_is_noop_on_split_items() {
        let normalizer = normalizer(true);
        let raw = RawExtraction::new().with_row([("name", "Garden hose 1\" 10m")]);
        let items = normalizer.normalize(&raw, &doc()).unwrap();

        let mut again = items[0].clone();
        normalizer.resplit(&mut again);
        assert_eq!(again, items[0]);
    }

    #[test]
    fn test_quantity_with_unit() {
        let raw = RawExtraction::new().with_row([("name", "Adhesive"), ("qty", "40 罐")]);
        let items = normalizer(false).normalize(&raw, &doc()).unwrap();
        assert_eq!(items[0].quantity, Some(dec("40")));
        assert_eq!(items[0].unit.as_deref(), Some("罐"));
    }

    #[test]
    fn test_raw_price_fallback() {
        let raw = RawExtraction::new().with_row([
            ("ProductName", "膠合劑"),
            ("Quantity", "40"),
            ("RawPrices", "250 80 200 8000"),
        ]);

        let items = normalizer(false).normalize(&raw, &doc()).unwrap();
        assert!(items[0].used_price_fallback);
        assert_eq!(items[0].unit_price, Some(dec("200")));
        assert_eq!(items[0].amount, Some(dec("8000")));
        assert!(items[0].missing_fields.is_empty());
    }

    #[test]
    fn test_row_values_override_header() {
        let raw = RawExtraction::new()
            .with_header("VendorOrderNo", "H-1")
            .with_row([("name", "A"), ("ItemOrderNo", "R-9")])
            .with_row([("name", "B")]);

        let items = normalizer(false).normalize(&raw, &doc()).unwrap();
        assert_eq!(items[0].order_number.as_deref(), Some("R-9"));
        assert_eq!(items[1].order_number.as_deref(), Some("H-1"));
    }

    #[test]
    fn test_invalid_spec_pattern_is_config_error() {
        let config = ExtractionConfig {
            name_spec_split: true,
            spec_patterns: vec!["(".into()],
            ..Default::default()
        };
        assert!(FieldNormalizer::from_config(&config).is_err());
    }
}
