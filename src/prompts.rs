//! Prompt text for metadata extraction.
//!
//! Every instruction sent to the model lives here so the wording can change
//! without touching cascade or retry logic, and so tests can inspect it
//! without a model.

use crate::output::ExtractedInfo;

/// System turn shared by the text and vision requests.
pub const SYSTEM_PROMPT: &str =
    "You extract metadata for naming scanned documents and output strict JSON only.";

const INTRO: &str = "You rename scanned documents by extracting filename metadata.";

/// Field list appended to both prompts. `{keywords_count}` is substituted.
const FIELDS: &str = r#"Return ONLY valid JSON (no markdown, no extra text) with:
- date: best single date for the filename in YYYY-MM-DD (prefer date of service if this doc is about a service/appointment/delivery; otherwise prefer the document/issue date). null if unknown.
- date_basis: "service" | "document" | "unknown"
- provider: short issuer/vendor/provider/organization name (e.g., bank, utility, clinic, school). null if unknown.
- document_type: short type like "Statement", "Invoice", "Receipt", "Bill", "Report", "Letter", "Notice", "Contract", "Policy", "Form", "Tax Document", or similar. null if unknown.
- title: short human-readable title (max ~8 words). If the document already has a clear title, use it; otherwise infer one from content. null if unknown.
- author: short author (person or organization) if clear from the document. null if unknown.
- subject: short subject line if clear from the document. null if unknown.
- keywords: array of strings (max {keywords_count} items). Each keyword should be a short topic phrase. [] if none.
- confidence: number 0 to 1
"#;

fn fields(keywords_count: usize) -> String {
    FIELDS.replace("{keywords_count}", &keywords_count.to_string())
}

/// User turn for the text cascade: the (compacted) document text and the
/// field list.
pub fn text_prompt(text: &str, keywords_count: usize) -> String {
    format!(
        "{INTRO}\n\nText from a scanned document:\n{text}\n\n{}",
        fields(keywords_count)
    )
}

/// User turn for the vision cascade.
///
/// `hint` is the partial text-cascade result during a cross-check; it is
/// rendered as JSON and the model is told it may be wrong. Without a hint an
/// empty object is shown.
pub fn vision_prompt(hint: Option<&ExtractedInfo>, keywords_count: usize) -> String {
    let hint_json = hint
        .and_then(|h| serde_json::to_string(h).ok())
        .unwrap_or_else(|| "{}".to_string());
    format!(
        "{INTRO}\n\n\
         If the user provides partial extracted JSON, use it as hints, but correct any obvious mistakes.\n\n\
         Partial extracted JSON hints (may be incomplete/wrong):\n{hint_json}\n\n{}",
        fields(keywords_count)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_prompt_embeds_text_and_keyword_cap() {
        let p = text_prompt("ACME POWER\nInvoice 2024-01-05", 7);
        assert!(p.contains("Text from a scanned document:\nACME POWER"));
        assert!(p.contains("max 7 items"));
        assert!(!p.contains("{keywords_count}"));
    }

    #[test]
    fn vision_prompt_without_hint_shows_empty_object() {
        let p = vision_prompt(None, 5);
        assert!(p.contains("(may be incomplete/wrong):\n{}\n"));
    }

    #[test]
    fn vision_prompt_serialises_hint() {
        let hint = ExtractedInfo {
            provider: Some("Acme".into()),
            ..Default::default()
        };
        let p = vision_prompt(Some(&hint), 5);
        assert!(p.contains("\"provider\":\"Acme\""));
        assert!(p.contains("\"date\":null"));
    }

    #[test]
    fn system_prompt_demands_json() {
        assert!(SYSTEM_PROMPT.contains("strict JSON"));
    }
}
