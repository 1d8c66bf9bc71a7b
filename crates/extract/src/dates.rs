use chrono::NaiveDate;

use crate::re;

re!(re_time_suffix, r"\s+\d{1,2}:\d{2}(?::\d{2})?$");
re!(re_compact_two_digit_year, r"^(\d{1,2})[/-](\d{1,2})[/-](\d{2})$");

// Tried in order; more specific formats first. Mirrors the date shapes seen
// in bank SMS notifications.
const FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d-%b-%y",
    "%d-%b-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%B %d %Y",
    "%Y%m%d",
    "%y%m%d",
];

/// Normalize a date string in any supported format to a `NaiveDate`.
///
/// Compact two-digit-year forms are resolved manually before the format
/// list runs: the leading component is the year (`< 50` maps to 20xx,
/// otherwise 19xx), so `"25-3-26"` is 2025-03-26. A trailing clock time is
/// discarded. Unparseable input yields `None`, never a default date.
pub fn normalize_date(input: &str) -> Option<NaiveDate> {
    let trimmed = re_time_suffix().replace(input.trim(), "");
    let trimmed = trimmed.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(caps) = re_compact_two_digit_year().captures(trimmed) {
        let yy: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        let year = if yy < 50 { 2000 + yy } else { 1900 + yy };
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
        // Fall through: component order did not form a real date.
    }

    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iso(input: &str) -> Option<String> {
        normalize_date(input).map(|d| d.format("%Y-%m-%d").to_string())
    }

    #[test]
    fn compact_two_digit_year_is_year_first() {
        assert_eq!(iso("25-3-26").as_deref(), Some("2025-03-26"));
        assert_eq!(iso("25-3-30").as_deref(), Some("2025-03-30"));
    }

    #[test]
    fn two_digit_year_century_threshold() {
        assert_eq!(iso("49-1-1").as_deref(), Some("2049-01-01"));
        assert_eq!(iso("99-1-1").as_deref(), Some("1999-01-01"));
    }

    #[test]
    fn slash_day_month_year() {
        assert_eq!(iso("15/01/2024").as_deref(), Some("2024-01-15"));
    }

    #[test]
    fn iso_passthrough() {
        assert_eq!(iso("2024-01-15").as_deref(), Some("2024-01-15"));
        assert_eq!(iso("2024/01/15").as_deref(), Some("2024-01-15"));
    }

    #[test]
    fn abbreviated_month_forms() {
        assert_eq!(iso("15-Jan-24").as_deref(), Some("2024-01-15"));
        assert_eq!(iso("15 Jan 2024").as_deref(), Some("2024-01-15"));
        assert_eq!(iso("15 January 2024").as_deref(), Some("2024-01-15"));
        assert_eq!(iso("January 15, 2024").as_deref(), Some("2024-01-15"));
    }

    #[test]
    fn compact_numeric_forms() {
        assert_eq!(iso("20240115").as_deref(), Some("2024-01-15"));
        assert_eq!(iso("240115").as_deref(), Some("2024-01-15"));
    }

    #[test]
    fn trailing_time_is_discarded() {
        assert_eq!(iso("15/01/2024 14:35").as_deref(), Some("2024-01-15"));
        assert_eq!(iso("2024-01-15 09:00:12").as_deref(), Some("2024-01-15"));
    }

    #[test]
    fn garbage_yields_none() {
        assert_eq!(normalize_date("not-a-date"), None);
        assert_eq!(normalize_date(""), None);
        assert_eq!(normalize_date("99/99/9999"), None);
    }

    #[test]
    fn year_first_wins_when_components_form_a_real_date() {
        assert_eq!(iso("31-12-25").as_deref(), Some("2031-12-25"));
    }

    #[test]
    fn impossible_month_component_yields_none() {
        assert_eq!(iso("12-13-25"), None);
        assert_eq!(iso("25-13-12"), None);
    }
}
