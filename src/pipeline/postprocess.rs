//! Post-processing: deterministic cleanup of model-derived results.
//!
//! Models follow the field list loosely: subjects come back as paragraphs,
//! keyword lists repeat themselves or exceed the requested count, and author
//! strings carry stray whitespace. Each rule below fixes one of these
//! without touching meaning.
//!
//! ## Rule Order
//!
//! 1. `subject` → first non-blank line, or dropped
//! 2. `keywords` → trimmed, non-blank, de-duplicated, capped
//! 3. `author` → trimmed, or dropped when blank

/// Apply all cleanup rules to a model result.
pub fn clean_info(info: &mut crate::output::ExtractedInfo, keywords_count: usize) {
    info.subject = info.subject.as_deref().and_then(first_line);
    info.keywords = info
        .keywords
        .as_deref()
        .map(|k| clean_keywords(k, keywords_count));
    info.author = info.author.as_deref().and_then(trimmed_non_empty);
}

// ── Rule 1: Subject to a single line ─────────────────────────────────────────

fn first_line(s: &str) -> Option<String> {
    s.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

// ── Rule 2: Keyword cleanup ──────────────────────────────────────────────────

/// Trim, drop blanks and repeats (first occurrence wins), keep at most `cap`.
pub fn clean_keywords(keywords: &[String], cap: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for kw in keywords.iter().map(|k| k.trim()).filter(|k| !k.is_empty()) {
        if out.len() >= cap {
            break;
        }
        if !out.iter().any(|seen| seen == kw) {
            out.push(kw.to_string());
        }
    }
    out
}

// ── Rule 3: Author trimming ──────────────────────────────────────────────────

fn trimmed_non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ExtractedInfo;

    fn kw(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn subject_becomes_first_line() {
        let mut info = ExtractedInfo {
            subject: Some("\n  \n  Water usage for March \nsecond line".into()),
            ..Default::default()
        };
        clean_info(&mut info, 5);
        assert_eq!(info.subject.as_deref(), Some("Water usage for March"));
    }

    #[test]
    fn blank_subject_and_author_are_dropped() {
        let mut info = ExtractedInfo {
            subject: Some(" \n\t".into()),
            author: Some("   ".into()),
            ..Default::default()
        };
        clean_info(&mut info, 5);
        assert_eq!(info.subject, None);
        assert_eq!(info.author, None);
    }

    #[test]
    fn author_is_trimmed() {
        let mut info = ExtractedInfo {
            author: Some("  Dr. Jane Roe ".into()),
            ..Default::default()
        };
        clean_info(&mut info, 5);
        assert_eq!(info.author.as_deref(), Some("Dr. Jane Roe"));
    }

    #[test]
    fn keywords_are_deduplicated_and_capped() {
        let cleaned = clean_keywords(&kw(&[" water ", "", "water", "sewer", "billing", "march"]), 3);
        assert_eq!(cleaned, kw(&["water", "sewer", "billing"]));
    }

    #[test]
    fn zero_keyword_cap_gives_empty_list() {
        let mut info = ExtractedInfo {
            keywords: Some(kw(&["a", "b"])),
            ..Default::default()
        };
        clean_info(&mut info, 0);
        assert_eq!(info.keywords, Some(vec![]));
    }

    #[test]
    fn missing_keywords_stay_missing() {
        let mut info = ExtractedInfo::default();
        clean_info(&mut info, 5);
        assert_eq!(info.keywords, None);
    }
}
