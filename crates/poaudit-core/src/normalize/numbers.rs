//! Numeric coercion of free-text prices and quantities.

use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;

lazy_static! {
    // Currency codes and symbols that may surround a price
    static ref CURRENCY_TOKENS: Regex = Regex::new(
        r"(?i)(NT\$|US\$|HK\$|NTD|TWD|USD|EUR|GBP|PLN|RMB|CNY|JPY|zł|元|圓|円|[$€£¥₩])"
    ).unwrap();

    // "40 pcs", "1.5kg", "12 罐"
    static ref QUANTITY_WITH_UNIT: Regex = Regex::new(
        r"^\s*([-+]?\d[\d.,\s]*?)\s*([^\d\s.,][^\d]*?)\s*$"
    ).unwrap();
}

/// Parse a price-like string into a decimal.
///
/// Strips currency symbols, whitespace and thousands separators. Handles
/// `1,234.56`, `1.234,56`, `1 234,56`, `1,200` (comma as thousands separator
/// when followed by exactly three digits) and accounting negatives `(30.00)`.
/// With `auto_correct`, the OCR confusions `O/o -> 0` and `l/I -> 1` are fixed.
pub fn parse_decimal(raw: &str, auto_correct: bool) -> Option<Decimal> {
    let stripped = CURRENCY_TOKENS.replace_all(raw, "");
    let corrected = if auto_correct {
        correct_ocr_digits(&stripped)
    } else {
        stripped.into_owned()
    };

    let mut s: String = corrected
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\'')
        .collect();

    if s.is_empty() {
        return None;
    }

    let mut negative = false;
    if s.starts_with('(') && s.ends_with(')') && s.len() > 2 {
        negative = true;
        s = s[1..s.len() - 1].to_string();
    }

    let body = if let Some(rest) = s.strip_prefix('-') {
        negative = !negative;
        rest
    } else {
        s.strip_prefix('+').unwrap_or(&s)
    };

    if body.is_empty()
        || !body.chars().any(|c| c.is_ascii_digit())
        || !body.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.')
    {
        return None;
    }

    let normalized = normalize_separators(body);
    let value = Decimal::from_str(&normalized).ok()?;

    Some(if negative { -value } else { value })
}

/// Parse a quantity that may carry its unit, e.g. `"40 pcs"`.
///
/// Returns the number and, when present, the trailing unit text.
pub fn parse_quantity(raw: &str, auto_correct: bool) -> (Option<Decimal>, Option<String>) {
    if let Some(value) = parse_decimal(raw, auto_correct) {
        return (Some(value), None);
    }

    if let Some(caps) = QUANTITY_WITH_UNIT.captures(raw) {
        if let Some(value) = parse_decimal(&caps[1], false) {
            let unit = caps[2].trim();
            let unit = (!unit.is_empty()).then(|| unit.to_string());
            return (Some(value), unit);
        }
    }

    (None, None)
}

/// Replace letters commonly misread for digits, but only when they touch a
/// digit, so that a unit such as `5 l` is left alone. A lowercase `l` must
/// also be followed by a digit: trailing it reads as litres (`1l`, `0.5l`).
fn correct_ocr_digits(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let is_digit_at = |i: Option<usize>| {
        i.and_then(|i| chars.get(i))
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, 'O' | 'o' | 'l' | 'I'))
    };

    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| match c {
            'l' if is_digit_at(Some(i + 1)) => '1',
            'O' | 'o' | 'I' if is_digit_at(i.checked_sub(1)) || is_digit_at(Some(i + 1)) => {
                if c == 'I' { '1' } else { '0' }
            }
            other => other,
        })
        .collect()
}

fn normalize_separators(body: &str) -> String {
    let commas = body.matches(',').count();
    let dots = body.matches('.').count();

    match (commas, dots) {
        (0, 0) | (0, 1) => body.to_string(),
        // 1.234.567
        (0, _) => body.replace('.', ""),
        (1, 0) => {
            let (int, frac) = body.split_once(',').unwrap_or((body, ""));
            if frac.len() == 3 && !int.is_empty() && int != "0" {
                format!("{}{}", int, frac)
            } else {
                format!("{}.{}", int, frac)
            }
        }
        // 1,234,567
        (_, 0) => body.replace(',', ""),
        _ => {
            // Both present: whichever comes last is the decimal separator
            let comma_pos = body.rfind(',');
            let dot_pos = body.rfind('.');
            match (comma_pos, dot_pos) {
                (Some(c), Some(d)) if c > d => body.replace('.', "").replace(',', "."),
                _ => body.replace(',', ""),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_plain_and_grouped() {
        assert_eq!(parse_decimal("30.00", true), Some(dec("30.00")));
        assert_eq!(parse_decimal("1,234.56", true), Some(dec("1234.56")));
        assert_eq!(parse_decimal("1 234,56", true), Some(dec("1234.56")));
        assert_eq!(parse_decimal("1.234.567,89", true), Some(dec("1234567.89")));
        assert_eq!(parse_decimal("1,200", true), Some(dec("1200")));
        assert_eq!(parse_decimal("12,5", true), Some(dec("12.5")));
    }

    #[test]
    fn test_parse_strips_currency() {
        assert_eq!(parse_decimal("NT$ 1,200", true), Some(dec("1200")));
        assert_eq!(parse_decimal(" $500 ", true), Some(dec("500")));
        assert_eq!(parse_decimal("8000元", true), Some(dec("8000")));
        assert_eq!(parse_decimal("€ 9,99", true), Some(dec("9.99")));
    }

    #[test]
    fn test_parse_negative() {
        assert_eq!(parse_decimal("(30.00)", true), Some(dec("-30.00")));
        assert_eq!(parse_decimal("-4", true), Some(dec("-4")));
    }

    #[test]
    fn test_ocr_correction_is_optional() {
        assert_eq!(parse_decimal("4O", true), Some(dec("40")));
        assert_eq!(parse_decimal("l2.5", true), Some(dec("12.5")));
        assert_eq!(parse_decimal("4O", false), None);
        assert_eq!(parse_quantity("5 l", true), (Some(dec("5")), Some("l".to_string())));
    }

    #[test]
    fn test_trailing_unit_letter_is_not_a_digit() {
        assert_eq!(parse_quantity("1l", true), (Some(dec("1")), Some("l".to_string())));
        assert_eq!(parse_quantity("0.5l", true), (Some(dec("0.5")), Some("l".to_string())));
        assert_eq!(parse_quantity("5ml", true), (Some(dec("5")), Some("ml".to_string())));
        assert_eq!(parse_decimal("1l", true), None);
        assert_eq!(parse_decimal("1l0", true), Some(dec("110")));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_decimal("", true), None);
        assert_eq!(parse_decimal("   ", true), None);
        assert_eq!(parse_decimal("n/a", true), None);
        assert_eq!(parse_decimal("see note", true), None);
        assert_eq!(parse_decimal("$", true), None);
    }

    #[test]
    fn test_parse_quantity_with_unit() {
        assert_eq!(parse_quantity("3", true), (Some(dec("3")), None));
        assert_eq!(
            parse_quantity("40 pcs", true),
            (Some(dec("40")), Some("pcs".to_string()))
        );
        assert_eq!(
            parse_quantity("1.5kg", true),
            (Some(dec("1.5")), Some("kg".to_string()))
        );
        assert_eq!(
            parse_quantity("12 罐", true),
            (Some(dec("12")), Some("罐".to_string()))
        );
        assert_eq!(parse_quantity("several", true), (None, None));
    }
}
