//! Last-resort extraction by pattern matching over raw text.

use crate::output::{DateBasis, ExtractedInfo};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

/// Confidence reported for every heuristic result.
pub const HEURISTIC_CONFIDENCE: f64 = 0.25;

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").expect("iso regex is valid"));
static US_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{2,4})\b").expect("us date regex is valid"));
static PAGE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)page\s+\d+").expect("page regex is valid"));
static HAS_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]").expect("letter regex is valid"));
static TITLE_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(invoice|statement|receipt|bill|report|contract|agreement|policy|notice|letter|form)\b")
        .expect("title regex is valid")
});

const DOC_TYPES: [(&str, &str); 11] = [
    ("invoice", "Invoice"),
    ("statement", "Statement"),
    ("receipt", "Receipt"),
    ("bill", "Bill"),
    ("report", "Report"),
    ("contract", "Contract"),
    ("agreement", "Agreement"),
    ("policy", "Policy"),
    ("notice", "Notice"),
    ("letter", "Letter"),
    ("form", "Form"),
];

/// Build a low-confidence result from raw document text.
///
/// Only the first 60 non-blank lines are examined. `date_basis` is always
/// [`DateBasis::Unknown`].
pub fn heuristic_extract(text: &str) -> ExtractedInfo {
    let top: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(60)
        .collect();

    let date = top
        .iter()
        .find_map(|l| ISO_DATE.captures(l).map(|c| c[1].to_string()))
        .or_else(|| top.iter().find_map(|l| us_date(l)));

    let provider = top
        .iter()
        .take(15)
        .find(|l| l.chars().count() >= 4 && !PAGE_MARKER.is_match(l) && HAS_LETTER.is_match(l))
        .map(|l| l.to_string());

    let blob = top.join("\n").to_lowercase();
    // Substring match, so "billing" counts as a bill.
    let document_type = DOC_TYPES
        .iter()
        .find(|(k, _)| blob.contains(k))
        .map(|(_, v)| v.to_string());

    let title = top
        .iter()
        .take(20)
        .find(|l| TITLE_WORD.is_match(l))
        .map(|l| l.to_string());

    ExtractedInfo {
        date,
        date_basis: Some(DateBasis::Unknown),
        provider,
        document_type,
        title,
        confidence: Some(HEURISTIC_CONFIDENCE),
        ..Default::default()
    }
}

/// First valid `m/d/y` date on the line, as `YYYY-MM-DD`. Two-digit years
/// are read as 20xx.
fn us_date(line: &str) -> Option<String> {
    let c = US_DATE.captures(line)?;
    let month: u32 = c[1].parse().ok()?;
    let day: u32 = c[2].parse().ok()?;
    let year_str = &c[3];
    let year: i32 = if year_str.len() == 2 {
        format!("20{year_str}").parse().ok()?
    } else {
        year_str.parse().ok()?
    };
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utility_bill() {
        let text = "\n  Page 1 of 2\nACME POWER & LIGHT\n123 Main St\nMonthly Statement\nBill date: 3/7/24\n";
        let info = heuristic_extract(text);
        assert_eq!(info.date.as_deref(), Some("2024-03-07"));
        assert_eq!(info.provider.as_deref(), Some("ACME POWER & LIGHT"));
        assert_eq!(info.document_type.as_deref(), Some("Statement"));
        assert_eq!(info.title.as_deref(), Some("Monthly Statement"));
        assert_eq!(info.date_basis, Some(DateBasis::Unknown));
        assert_eq!(info.confidence, Some(HEURISTIC_CONFIDENCE));
    }

    #[test]
    fn iso_date_wins_over_earlier_us_date() {
        let text = "Clinic\nVisit 01/02/2023\nPrinted 2024-05-06\n";
        assert_eq!(heuristic_extract(text).date.as_deref(), Some("2024-05-06"));
    }

    #[test]
    fn invalid_us_dates_are_skipped() {
        let text = "Somewhere\n13/45/2023\n2/28/2022\n";
        assert_eq!(heuristic_extract(text).date.as_deref(), Some("2022-02-28"));
    }

    #[test]
    fn short_and_numeric_lines_are_not_providers() {
        let text = "abc\n1234 5678\nPage 3\nReal Name Inc\n";
        assert_eq!(heuristic_extract(text).provider.as_deref(), Some("Real Name Inc"));
    }

    #[test]
    fn empty_text_gives_mostly_empty_result() {
        let info = heuristic_extract("");
        assert_eq!(info.date, None);
        assert_eq!(info.provider, None);
        assert_eq!(info.document_type, None);
        assert_eq!(info.title, None);
        assert_eq!(info.confidence, Some(HEURISTIC_CONFIDENCE));
    }
}
