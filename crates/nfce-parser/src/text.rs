//! Text and number helpers for portal markup.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use nfce_core::Brl;
use scraper::ElementRef;

/// Brasília time, used when the portal omits the offset.
const BRASILIA_OFFSET_SECS: i32 = -3 * 3600;

/// Replace NBSP, trim, and collapse runs of whitespace.
#[must_use]
pub fn normalize_text(s: &str) -> String {
    s.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized text content of an element.
#[must_use]
pub fn element_text(element: ElementRef<'_>) -> String {
    normalize_text(&element.text().collect::<String>())
}

/// Keep only ASCII digits.
#[must_use]
pub fn digits(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

/// First value that is not blank, or `""`.
#[must_use]
pub fn first_non_empty<'a>(values: &[Option<&'a str>]) -> &'a str {
    values
        .iter()
        .flatten()
        .copied()
        .find(|v| !v.trim().is_empty())
        .unwrap_or("")
}

/// Parse a Brazilian decimal (`1.234,567`). Zero when unparseable.
#[must_use]
pub fn parse_quantity(s: &str) -> f64 {
    let cleaned = s.trim().replace('.', "").replace(',', ".");
    if cleaned.is_empty() {
        return 0.0;
    }
    cleaned.parse().unwrap_or(0.0)
}

/// Parse a percentage such as `18,00 %`. Zero when unparseable.
#[must_use]
pub fn parse_percent(s: &str) -> f64 {
    parse_quantity(&s.replace('%', ""))
}

/// Parse a non-negative integer. Zero when unparseable.
#[must_use]
pub fn parse_int(s: &str) -> u32 {
    s.trim().parse().unwrap_or(0)
}

/// Parse a currency value. Zero when blank or malformed.
#[must_use]
pub fn money_or_zero(s: &str) -> Brl {
    if s.trim().is_empty() {
        return Brl::ZERO;
    }
    Brl::parse(s).unwrap_or_else(|e| {
        tracing::warn!("Unparseable money value, using zero: {}", e);
        Brl::ZERO
    })
}

/// Parse the portal's date formats.
///
/// Accepts `dd/mm/yyyy HH:MM:SS-03:00`, `dd/mm/yyyy HH:MM:SS` and
/// `dd/mm/yyyy`. Offset-less values are read in Brasília time.
#[must_use]
pub fn parse_br_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = normalize_text(raw);
    if raw.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_str(&raw, "%d/%m/%Y %H:%M:%S%:z") {
        return Some(ts);
    }

    let brasilia = FixedOffset::east_opt(BRASILIA_OFFSET_SECS)?;

    if let Ok(naive) = NaiveDateTime::parse_from_str(&raw, "%d/%m/%Y %H:%M:%S") {
        return brasilia.from_local_datetime(&naive).single();
    }

    let date = NaiveDate::parse_from_str(&raw, "%d/%m/%Y").ok()?;
    brasilia
        .from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
        .single()
}

/// Drop a leading `code - ` prefix, as in `2927408 - SALVADOR`.
#[must_use]
pub fn strip_code_prefix(s: &str) -> &str {
    match s.split_once(" - ") {
        Some((code, rest)) if !code.is_empty() && code.bytes().all(|b| b.is_ascii_digit()) => {
            rest.trim()
        }
        _ => s.trim(),
    }
}
