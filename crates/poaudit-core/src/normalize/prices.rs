//! Price allocation from an unlabeled list of numbers.
//!
//! Some documents only yield the row's price-like numbers in reading order
//! (list price, discount, unit price, amount, in some order). This module
//! recovers the unit price and the line amount from such a list.

use rust_decimal::Decimal;

use super::numbers::parse_decimal;

/// Prices recovered from a raw price list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatedPrices {
    pub unit_price: Decimal,
    pub amount: Decimal,
}

/// Allocate a unit price and amount from whitespace separated numbers.
///
/// The largest value is the amount. The unit price is the remaining value
/// closest to `amount / quantity`, or the largest remaining value when the
/// quantity is unknown. Zero and unparseable tokens are ignored; fewer than
/// two usable values yield nothing.
pub fn allocate_raw_prices(
    raw_prices: &str,
    quantity: Option<Decimal>,
    auto_correct: bool,
) -> Option<AllocatedPrices> {
    let mut prices: Vec<Decimal> = raw_prices
        .split_whitespace()
        .filter_map(|token| parse_decimal(token, auto_correct))
        .filter(|value| !value.is_zero())
        .collect();

    if prices.len() < 2 {
        return None;
    }

    let amount_idx = prices
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.cmp(b))
        .map(|(i, _)| i)?;
    let amount = prices.remove(amount_idx);

    let unit_price = match quantity.filter(|q| *q > Decimal::ZERO) {
        Some(qty) => {
            let target = amount / qty;
            prices
                .iter()
                .copied()
                .min_by_key(|p| (*p - target).abs())?
        }
        None => prices.iter().copied().max()?,
    };

    Some(AllocatedPrices { unit_price, amount })
}
