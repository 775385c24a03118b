//! Field normalization: canonical dates and document types, and the
//! "unknown field" count that drives the vision cross-check.

use crate::output::{is_blank, ExtractedInfo};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date regex is valid"));
static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s{2,}").expect("whitespace regex is valid"));
static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9 &/+-]").expect("charset regex is valid"));

/// Ordered keyword table: the first word-bounded hit wins.
static DOC_TYPES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        ("invoice", "Invoice"),
        ("inv", "Invoice"),
        ("statement", "Statement"),
        ("receipt", "Receipt"),
        ("bill", "Bill"),
        ("report", "Report"),
        ("letter", "Letter"),
        ("notice", "Notice"),
        ("contract", "Contract"),
        ("agreement", "Agreement"),
        ("policy", "Policy"),
        ("form", "Form"),
        ("summary", "Summary"),
        ("tax", "Tax Document"),
    ]
    .into_iter()
    .map(|(k, v)| {
        let re = Regex::new(&format!(r"\b{}\b", regex::escape(k))).expect("keyword regex is valid");
        (re, v)
    })
    .collect()
});

/// Maximum length of a title-cased fallback document type.
const DOC_TYPE_MAX: usize = 40;

/// Return the trimmed date if it is a real `YYYY-MM-DD` calendar date.
///
/// No reformatting is attempted: `2024-1-5` and `01/05/2024` are rejected.
pub fn normalize_date(s: Option<&str>) -> Option<String> {
    let s = s?.trim();
    if !ISO_DATE.is_match(s) {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    Some(s.to_string())
}

/// Canonicalize a free-form document-type label.
pub fn normalize_document_type(s: Option<&str>) -> Option<String> {
    let s = s?;
    let collapsed = WHITESPACE_RUN.replace_all(s, " ");
    let cleaned = DISALLOWED.replace_all(collapsed.trim(), "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    let low = cleaned.to_lowercase();
    if let Some((_, label)) = DOC_TYPES.iter().find(|(re, _)| re.is_match(&low)) {
        return Some((*label).to_string());
    }

    let titled = cleaned
        .split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ");
    Some(titled.chars().take(DOC_TYPE_MAX).collect())
}

/// Upper-case the first character and lower-case the rest.
pub(crate) fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Number of core naming fields (date, provider, document type, title) that
/// are missing or unusable. Range `0..=4`.
pub fn unknown_count(info: &ExtractedInfo) -> usize {
    let mut count = 0;
    if normalize_date(info.date.as_deref()).is_none() {
        count += 1;
    }
    if is_blank(info.provider.as_deref()) {
        count += 1;
    }
    if normalize_document_type(info.document_type.as_deref()).is_none() {
        count += 1;
    }
    if info.title.as_deref().map_or(0, |t| t.trim().chars().count()) < 3 {
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates() {
        assert_eq!(normalize_date(Some(" 2024-02-29 ")), Some("2024-02-29".into()));
        assert_eq!(normalize_date(Some("2023-02-29")), None);
        assert_eq!(normalize_date(Some("2024-1-5")), None);
        assert_eq!(normalize_date(Some("01/05/2024")), None);
        assert_eq!(normalize_date(Some("2024-01-05T00:00")), None);
        assert_eq!(normalize_date(None), None);
    }

    #[test]
    fn document_types_from_table() {
        let n = |s| normalize_document_type(Some(s));
        assert_eq!(n("INVOICE #123"), Some("Invoice".into()));
        assert_eq!(n("inv."), Some("Invoice".into()));
        assert_eq!(n("Monthly   Statement"), Some("Statement".into()));
        assert_eq!(n("Annual tax form"), Some("Form".into()));
        assert_eq!(n("Property Tax"), Some("Tax Document".into()));
        assert_eq!(n("Lease Agreement"), Some("Agreement".into()));
    }

    #[test]
    fn document_type_fallback_is_title_cased_and_capped() {
        let n = |s| normalize_document_type(Some(s));
        assert_eq!(n("explanation of BENEFITS"), Some("Explanation Of Benefits".into()));
        assert_eq!(n("billing"), Some("Billing".into()));
        let long = "word ".repeat(20);
        assert_eq!(n(&long).unwrap().chars().count(), 40);
    }

    #[test]
    fn document_type_empty_after_cleanup() {
        assert_eq!(normalize_document_type(Some("   ")), None);
        assert_eq!(normalize_document_type(Some("!!!")), None);
        assert_eq!(normalize_document_type(None), None);
    }

    #[test]
    fn unknown_count_range() {
        assert_eq!(unknown_count(&ExtractedInfo::default()), 4);
        let full = ExtractedInfo {
            date: Some("2024-01-05".into()),
            provider: Some("Acme".into()),
            document_type: Some("invoice".into()),
            title: Some("January bill".into()),
            ..Default::default()
        };
        assert_eq!(unknown_count(&full), 0);
        let partial = ExtractedInfo {
            date: Some("Jan 5".into()),
            provider: Some("  ".into()),
            document_type: Some("invoice".into()),
            title: Some("ok".into()),
            ..Default::default()
        };
        assert_eq!(unknown_count(&partial), 3);
    }
}
