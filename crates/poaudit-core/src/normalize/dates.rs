//! Purchase date parsing, including Minguo (ROC) calendar years.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // 2025-10-28, 2025/10/28, 114/10/28, 114.10.28, 114年10月28日
    static ref DATE_SEPARATED: Regex = Regex::new(
        r"^(\d{2,4})\s*[./\-年]\s*(\d{1,2})\s*[./\-月]\s*(\d{1,2})\s*日?$"
    ).unwrap();

    // 20251028, 1141028, 991028
    static ref DATE_COMPACT: Regex = Regex::new(
        r"^(\d{2,4})(\d{2})(\d{2})$"
    ).unwrap();
}

/// Offset between ROC (Minguo) years and Gregorian years.
const ROC_YEAR_OFFSET: i32 = 1911;

/// Parse a purchase date as printed on the document.
///
/// Years below 1900 are taken as ROC years.
pub fn parse_purchase_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let caps = DATE_SEPARATED
        .captures(raw)
        .or_else(|| DATE_COMPACT.captures(raw))?;

    let year = parse_year(&caps[1])?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;

    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_year(s: &str) -> Option<i32> {
    let year: i32 = s.parse().ok()?;
    if year < 1900 {
        Some(year + ROC_YEAR_OFFSET)
    } else {
        Some(year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_roc_dates() {
        assert_eq!(parse_purchase_date("1141028"), Some(date(2025, 10, 28)));
        assert_eq!(parse_purchase_date("114/10/28"), Some(date(2025, 10, 28)));
        assert_eq!(parse_purchase_date("114年10月28日"), Some(date(2025, 10, 28)));
        assert_eq!(parse_purchase_date("991231"), Some(date(2010, 12, 31)));
    }

    #[test]
    fn test_parse_gregorian_dates() {
        assert_eq!(parse_purchase_date("2025-10-28"), Some(date(2025, 10, 28)));
        assert_eq!(parse_purchase_date("2025/1/5"), Some(date(2025, 1, 5)));
        assert_eq!(parse_purchase_date("20251028"), Some(date(2025, 10, 28)));
    }

    #[test]
    fn test_parse_invalid_dates() {
        assert_eq!(parse_purchase_date(""), None);
        assert_eq!(parse_purchase_date("1141332"), None);
        assert_eq!(parse_purchase_date("next week"), None);
        assert_eq!(parse_purchase_date("2025-02-30"), None);
    }
}
