//! Text compaction: shrink oversized text to a character budget while keeping
//! the lines most likely to carry naming metadata.
//!
//! Lengths are counted in `char`s so a budget never splits a code point.

use once_cell::sync::Lazy;
use regex::Regex;

/// Lines matching any of these are kept ahead of plain head/tail context.
static SIGNAL: Lazy<Regex> = Lazy::new(|| {
    let patterns = [
        r"\b\d{1,2}/\d{1,2}/\d{2,4}\b",
        r"\b\d{4}-\d{2}-\d{2}\b",
        r"\b(jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\b",
        r"\b(invoice|statement|receipt|bill|balance|amount|total|due|paid|payment|account|acct|order|purchase)\b",
        r"\b(service|date of service|dos|appointment|visit|delivered|shipped)\b",
        r"\b(policy|contract|agreement|notice|letter|form|report|summary|renewal)\b",
        r"\b(tax|irs|1099|w-2|utility|electric|gas|water|internet|insurance|mortgage|bank|credit)\b",
    ];
    Regex::new(&format!("(?i){}", patterns.join("|"))).expect("signal regex is valid")
});

/// Lines of plain context taken from each end of the document.
const CONTEXT_LINES: usize = 250;

/// Compact `text` to at most `max_chars` characters.
///
/// Text within budget is returned trimmed and otherwise unchanged. Otherwise
/// signal lines are kept in order; if they alone fill the budget they are
/// truncated, else the first and last [`CONTEXT_LINES`] lines are appended
/// (blank-line separated) and the whole is truncated.
pub fn compact_text(text: &str, max_chars: usize) -> String {
    let t = text.trim();
    if t.chars().count() <= max_chars {
        return t.to_string();
    }

    let lines: Vec<&str> = t
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        return truncate_chars(t, max_chars);
    }

    let picked = lines
        .iter()
        .copied()
        .filter(|l| SIGNAL.is_match(l))
        .collect::<Vec<_>>()
        .join("\n");
    if picked.chars().count() >= max_chars {
        return truncate_chars(&picked, max_chars);
    }

    let head = lines[..lines.len().min(CONTEXT_LINES)].join("\n");
    let tail = lines[lines.len().saturating_sub(CONTEXT_LINES)..].join("\n");
    let combo = format!("{picked}\n\n{head}\n\n{tail}");
    truncate_chars(combo.trim(), max_chars)
}

pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_returned_trimmed() {
        assert_eq!(compact_text("  hello \n", 100), "hello");
    }

    #[test]
    fn never_exceeds_budget() {
        let text = "filler line without signal\n".repeat(2000);
        for budget in [1, 10, 500, 1600] {
            assert!(compact_text(&text, budget).chars().count() <= budget);
        }
    }

    #[test]
    fn signal_lines_come_first() {
        let mut text = String::new();
        for i in 0..400 {
            text.push_str(&format!("lorem ipsum {i}\n"));
        }
        text.push_str("Invoice total due 01/05/2024\n");
        let out = compact_text(&text, 300);
        assert!(out.starts_with("Invoice total due 01/05/2024\n\nlorem ipsum 0"));
    }

    #[test]
    fn matching_is_word_bounded_and_case_insensitive() {
        let body = "x".repeat(50);
        let text = format!("{body}\nBILLING DEPT\nStatement Date\n{body}\n");
        let out = compact_text(&text, 60);
        // "billing" is not the word "bill"; "Statement" is a signal word.
        assert!(out.starts_with("Statement Date"));
    }

    #[test]
    fn overflowing_signal_is_truncated() {
        let text = "Invoice 2024-01-01 payment due\n".repeat(100);
        let out = compact_text(&text, 40);
        assert_eq!(out, "Invoice 2024-01-01 payment due\nInvoice 2");
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "é".repeat(20);
        assert_eq!(compact_text(&text, 5).chars().count(), 5);
    }
}
