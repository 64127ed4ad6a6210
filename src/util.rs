// Utility helpers for parsing, basic statistics and number formatting.
//
// This module owns all locale handling for the Norwegian exports: `;` as the
// field separator, `,` as the decimal mark, and `DD,MM,YYYY` dates.
use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};

/// Byte-order marker that spreadsheet exports like to prepend.
pub const BOM: char = '\u{feff}';

/// Normalize a header name: trim, strip a BOM, and case-fold.
pub fn normalize_header(s: &str) -> String {
    s.trim().trim_start_matches(BOM).trim().to_lowercase()
}

/// Parse a comma-decimal number while being forgiving about formatting.
///
/// - Trims whitespace and removes space/non-breaking-space thousands
///   separators.
/// - Accepts `,` or `.` as the decimal mark.
/// - Returns `None` for empty, non-numeric or non-finite input.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\u{202f}'))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a date in either ISO `YYYY-MM-DD` or `DD,MM,YYYY` form.
///
/// The comma form is rewritten to `DD.MM.YYYY` first; that dotted form is
/// therefore accepted too.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    let dotted = s.replace(',', ".");
    NaiveDate::parse_from_str(&dotted, "%d.%m.%Y").ok()
}

/// Normalize a clock time to zero-padded `HH:MM` so that lexicographic
/// order matches clock order. Seconds are dropped. Anything that does not
/// look like a clock time is returned trimmed and unchanged.
pub fn normalize_clock(s: &str) -> String {
    let s = s.trim();
    let mut parts = s.split(':');
    let (Some(h), Some(m)) = (parts.next(), parts.next()) else {
        return s.to_string();
    };
    match (h.trim().parse::<u32>(), m.trim().parse::<u32>()) {
        (Ok(h), Ok(m)) if h < 24 && m < 60 => format!("{:02}:{:02}", h, m),
        _ => s.to_string(),
    }
}

pub fn format_date(d: NaiveDate) -> String {
    d.format("%d.%m.%Y").to_string()
}

/// Round half away from zero to `decimals` places.
pub fn round_to(v: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (v * factor).round() / factor
}

pub fn round_opt(v: Option<f64>, decimals: u32) -> Option<f64> {
    v.map(|x| round_to(x, decimals))
}

/// Median of the present values; `None` when there are none.
pub fn median<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut v: Vec<f64> = values.into_iter().flatten().collect();
    if v.is_empty() {
        return None;
    }
    v.sort_by(|a, b| a.total_cmp(b));
    let mid = v.len() / 2;
    if v.len() % 2 == 1 {
        Some(v[mid])
    } else {
        Some((v[mid - 1] + v[mid]) / 2.0)
    }
}

/// Fixed-decimal number with a comma decimal mark and no grouping, the
/// format spreadsheet tools read back as a number.
pub fn format_decimal(n: f64, decimals: usize) -> String {
    format!("{:.*}", decimals, n).replace('.', ",")
}

/// Like [`format_decimal`], but nulls render as an empty cell.
pub fn format_cell(n: Option<f64>, decimals: usize) -> String {
    n.map(|v| format_decimal(v, decimals)).unwrap_or_default()
}

/// Counts in console messages (e.g. `12 345 rader`).
pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::nb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_trimmed_bom_stripped_and_folded() {
        assert_eq!(normalize_header("\u{feff}Dato "), "dato");
        assert_eq!(normalize_header("  KO_MIN_KM"), "ko_min_km");
    }

    #[test]
    fn numbers_accept_comma_decimal() {
        assert_eq!(parse_f64_safe(Some("3,25")), Some(3.25));
        assert_eq!(parse_f64_safe(Some(" 1 234,5 ")), Some(1234.5));
        assert_eq!(parse_f64_safe(Some("7")), Some(7.0));
    }

    #[test]
    fn unparseable_numbers_become_null() {
        assert_eq!(parse_f64_safe(Some("")), None);
        assert_eq!(parse_f64_safe(Some("n/a")), None);
        assert_eq!(parse_f64_safe(Some("NaN")), None);
        assert_eq!(parse_f64_safe(None), None);
    }

    #[test]
    fn dates_accept_iso_and_comma_forms() {
        let expected = NaiveDate::from_ymd_opt(2025, 10, 16).unwrap();
        assert_eq!(parse_date("2025-10-16"), Some(expected));
        assert_eq!(parse_date("16,10,2025"), Some(expected));
        assert_eq!(parse_date("16.10.2025"), Some(expected));
    }

    #[test]
    fn bad_dates_are_rejected() {
        assert_eq!(parse_date("2025/10/16"), None);
        assert_eq!(parse_date("32,10,2025"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn clock_times_are_zero_padded() {
        assert_eq!(normalize_clock("7:05"), "07:05");
        assert_eq!(normalize_clock("16:30:00"), "16:30");
        assert_eq!(normalize_clock("ukjent"), "ukjent");
    }

    #[test]
    fn median_ignores_nulls() {
        assert_eq!(median(vec![Some(3.0), None, Some(1.0), Some(2.0)]), Some(2.0));
        assert_eq!(median(vec![Some(1.0), Some(4.0)]), Some(2.5));
        assert_eq!(median(vec![None, None]), None);
    }

    #[test]
    fn decimals_use_comma() {
        assert_eq!(format_decimal(5.75, 3), "5,750");
        assert_eq!(format_cell(None, 2), "");
        assert_eq!(round_to(1.23456, 3), 1.235);
    }
}
