//! Arithmetic audit of line items.
//!
//! Every finding is a pure function of the line item and the policy, so an
//! edited item is re-audited simply by calling [`AuditPolicy::audit`] again.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::config::AuditConfig;
use crate::models::line_item::{
    AuditFinding, AuditedItem, CanonicalField, Deviation, FindingReason, LineItem, Severity,
};

/// Tolerance policy applied to `unit_price * quantity = amount`.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditPolicy {
    absolute_tolerance: Decimal,
    relative_tolerance: Decimal,
    escalation_factor: Decimal,
    currency_precision: u32,
}

impl Default for AuditPolicy {
    fn default() -> Self {
        Self::from_config(&AuditConfig::default())
    }
}

impl AuditPolicy {
    pub fn from_config(config: &AuditConfig) -> Self {
        Self {
            absolute_tolerance: config.absolute_tolerance.abs(),
            relative_tolerance: config.relative_tolerance.abs(),
            escalation_factor: config.escalation_factor.max(Decimal::ONE),
            currency_precision: config.currency_precision,
        }
    }

    /// Policy with the given tolerances and default escalation and precision.
    pub fn new(absolute_tolerance: Decimal, relative_tolerance: Decimal) -> Self {
        Self::from_config(&AuditConfig {
            absolute_tolerance,
            relative_tolerance,
            ..Default::default()
        })
    }

    pub fn with_escalation_factor(mut self, factor: Decimal) -> Self {
        self.escalation_factor = factor.max(Decimal::ONE);
        self
    }

    pub fn with_currency_precision(mut self, precision: u32) -> Self {
        self.currency_precision = precision;
        self
    }

    /// `round(unit_price * quantity, precision)`, half away from zero.
    pub fn expected_amount(&self, item: &LineItem) -> Option<Decimal> {
        let product = item.unit_price?.checked_mul(item.quantity?)?;
        Some(product.round_dp_with_strategy(
            self.currency_precision,
            RoundingStrategy::MidpointAwayFromZero,
        ))
    }

    /// Largest deviation still considered OK for an expected amount.
    pub fn threshold(&self, expected: Decimal) -> Decimal {
        let relative = self
            .relative_tolerance
            .checked_mul(expected.abs())
            .unwrap_or(Decimal::MAX);
        self.absolute_tolerance.max(relative)
    }

    /// Audit one line item.
    pub fn audit(&self, item: &LineItem) -> AuditFinding {
        let expected = self.expected_amount(item);
        let actual = item.amount;

        let missing: Vec<&str> = [
            (CanonicalField::UnitPrice, item.unit_price.is_none()),
            (CanonicalField::Quantity, item.quantity.is_none()),
            (CanonicalField::Amount, item.amount.is_none()),
        ]
        .into_iter()
        .filter(|(_, absent)| *absent)
        .map(|(field, _)| field.as_str())
        .collect();

        if !missing.is_empty() {
            return AuditFinding {
                expected_amount: expected,
                actual_amount: actual,
                deviation: None,
                severity: Severity::Warn,
                reason: FindingReason::Incomplete,
                message: format!("cannot check arithmetic, missing {}", missing.join(", ")),
            };
        }

        let (Some(expected), Some(actual)) = (expected, actual) else {
            // All three fields are present, so only the product can be absent
            return AuditFinding {
                expected_amount: None,
                actual_amount: actual,
                deviation: None,
                severity: Severity::Error,
                reason: FindingReason::OutOfTolerance,
                message: "unit price times quantity is out of range".to_string(),
            };
        };

        let absolute = (actual - expected).abs();
        let deviation = Deviation {
            absolute,
            relative: (!expected.is_zero())
                .then(|| absolute.checked_div(expected.abs()))
                .flatten(),
        };

        let zero_input = item.unit_price.is_some_and(|p| p.is_zero())
            || item.quantity.is_some_and(|q| q.is_zero());

        let (severity, reason, message) = if zero_input {
            if actual.abs() <= self.absolute_tolerance {
                (
                    Severity::Ok,
                    FindingReason::WithinTolerance,
                    "zero price or quantity with zero amount".to_string(),
                )
            } else {
                (
                    Severity::Error,
                    FindingReason::ZeroValue,
                    format!("zero price or quantity but amount is {}", actual),
                )
            }
        } else {
            let threshold = self.threshold(expected);
            let escalated = threshold
                .checked_mul(self.escalation_factor)
                .unwrap_or(Decimal::MAX);

            if absolute <= threshold {
                (
                    Severity::Ok,
                    FindingReason::WithinTolerance,
                    format!("amount {} matches expected {}", actual, expected),
                )
            } else {
                let severity = if absolute <= escalated {
                    Severity::Warn
                } else {
                    Severity::Error
                };
                (
                    severity,
                    FindingReason::OutOfTolerance,
                    format!(
                        "amount {} differs from expected {} by {} (tolerance {})",
                        actual, expected, absolute, threshold
                    ),
                )
            }
        };

        AuditFinding {
            expected_amount: Some(expected),
            actual_amount: Some(actual),
            deviation: Some(deviation),
            severity,
            reason,
            message,
        }
    }

    /// Audit an item and pair it with its finding.
    pub fn audit_item(&self, item: LineItem) -> AuditedItem {
        let finding = self.audit(&item);
        AuditedItem { item, finding }
    }
}
