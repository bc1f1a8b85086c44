//! On-demand aggregates over the ledger.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Ledger;
use crate::models::line_item::{FindingReason, Severity};
use crate::models::task::TaskState;

/// Line counts per severity tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub ok: usize,
    pub warn: usize,
    pub error: usize,
}

impl SeverityCounts {
    fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Ok => self.ok += 1,
            Severity::Warn => self.warn += 1,
            Severity::Error => self.error += 1,
        }
    }
}

/// Aggregates for one supplier. Lines without a supplier group under `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierSummary {
    pub supplier: Option<String>,
    pub lines: usize,
    pub total_amount: Decimal,
    pub warn: usize,
    pub error: usize,
}

/// Aggregate statistics, always computed from the current ledger state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub documents_processed: usize,
    pub documents_failed: usize,
    pub line_items: usize,
    pub severity: SeverityCounts,
    /// Lines that could not be checked because a numeric field is missing.
    pub incomplete: usize,
    /// Sum of the amounts present on the documents.
    pub total_amount: Decimal,
    /// Sum of `unit_price * quantity` where computable.
    pub total_expected_amount: Decimal,
    /// Per-supplier groups in order of first appearance.
    pub suppliers: Vec<SupplierSummary>,
}

impl LedgerSummary {
    pub(crate) fn compute(ledger: &Ledger) -> Self {
        let documents_processed = ledger
            .documents()
            .iter()
            .filter(|d| d.state == TaskState::Succeeded)
            .count();

        let mut summary = LedgerSummary {
            documents_processed,
            documents_failed: ledger.documents().len() - documents_processed,
            line_items: 0,
            severity: SeverityCounts::default(),
            incomplete: 0,
            total_amount: Decimal::ZERO,
            total_expected_amount: Decimal::ZERO,
            suppliers: Vec::new(),
        };

        for line in ledger.items() {
            let amount = line.item.amount.unwrap_or_default();
            summary.line_items += 1;
            summary.severity.add(line.finding.severity);
            if line.finding.reason == FindingReason::Incomplete {
                summary.incomplete += 1;
            }
            summary.total_amount += amount;
            summary.total_expected_amount += line.finding.expected_amount.unwrap_or_default();

            let group = match summary
                .suppliers
                .iter()
                .position(|s| s.supplier == line.item.supplier)
            {
                Some(index) => &mut summary.suppliers[index],
                None => {
                    summary.suppliers.push(SupplierSummary {
                        supplier: line.item.supplier.clone(),
                        lines: 0,
                        total_amount: Decimal::ZERO,
                        warn: 0,
                        error: 0,
                    });
                    let last = summary.suppliers.len() - 1;
                    &mut summary.suppliers[last]
                }
            };

            group.lines += 1;
            group.total_amount += amount;
            match line.finding.severity {
                Severity::Warn => group.warn += 1,
                Severity::Error => group.error += 1,
                Severity::Ok => {}
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditPolicy;
    use crate::error::ErrorKind;
    use crate::models::document::{MediaType, SourceDocument};
    use crate::models::line_item::{LineItem, LineItemPatch, RowKey};
    use crate::models::task::{ProcessingTask, TaskFailure};

    fn task(doc: &str, rows: &[(Option<&str>, Option<i64>, i64)]) -> ProcessingTask {
        let policy = AuditPolicy::default();
        let source = SourceDocument::new(doc, doc, MediaType::Png, Vec::new());
        let mut task = ProcessingTask::queued(&source);
        let items = rows
            .iter()
            .enumerate()
            .map(|(i, (supplier, quantity, amount))| {
                let mut item = LineItem::new(doc, i);
                item.supplier = supplier.map(str::to_string);
                item.unit_price = Some(Decimal::from(10));
                item.quantity = quantity.map(Decimal::from);
                item.amount = Some(Decimal::from(*amount));
                policy.audit_item(item)
            })
            .collect();
        task.succeed(items, 1);
        task
    }

    #[test]
    fn test_summary_counts_and_groups() {
        let mut failed = ProcessingTask::queued(&SourceDocument::new("z", "z", MediaType::Png, Vec::new()));
        failed.fail(TaskFailure::new(ErrorKind::MalformedExtraction, "no rows"), 1);

        let mut ledger = Ledger::new();
        ledger.append_outcomes([
            task("a", &[(Some("Acme"), Some(3), 30), (None, Some(3), 45)]),
            failed,
            task("b", &[(Some("Acme"), None, 20), (Some("Bolt Co"), Some(2), 21)]),
        ]);

        let summary = ledger.summary();
        assert_eq!(summary.documents_processed, 2);
        assert_eq!(summary.documents_failed, 1);
        assert_eq!(summary.line_items, 4);
        assert_eq!(summary.severity, SeverityCounts { ok: 1, warn: 2, error: 1 });
        assert_eq!(summary.incomplete, 1);
        assert_eq!(summary.total_amount, Decimal::from(116));
        assert_eq!(summary.total_expected_amount, Decimal::from(80));

        let names: Vec<_> = summary.suppliers.iter().map(|s| s.supplier.as_deref()).collect();
        assert_eq!(names, vec![Some("Acme"), None, Some("Bolt Co")]);
        assert_eq!(summary.suppliers[0].lines, 2);
        assert_eq!(summary.suppliers[0].total_amount, Decimal::from(50));
        assert_eq!(summary.suppliers[0].warn, 1);
        assert_eq!(summary.suppliers[1].error, 1);
    }

    #[test]
    fn test_summary_follows_edits() {
        let mut ledger = Ledger::new();
        ledger.append_outcomes([task("a", &[(None, Some(3), 45)])]);
        assert_eq!(ledger.summary().severity.error, 1);

        let patch = LineItemPatch {
            amount: Some(Decimal::from(30)),
            ..Default::default()
        };
        ledger
            .apply_correction(&RowKey::new("a", 0), &patch, &AuditPolicy::default())
            .unwrap();

        let summary = ledger.summary();
        assert_eq!(summary.severity.error, 0);
        assert_eq!(summary.severity.ok, 1);
        assert_eq!(summary.total_amount, Decimal::from(30));
    }
}
