//! Turning an [`ExtractedInfo`] into a destination file name and a PDF
//! document-information dictionary.

use crate::output::{is_blank, ExtractedInfo};
use crate::pipeline::normalize::{capitalize, normalize_date, normalize_document_type};
use crate::pipeline::postprocess::clean_keywords;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};

static CONTROL_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\r\n\t]+").expect("valid regex"));
static RESERVED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[/\\:*?"<>|]+"#).expect("valid regex"));
static MULTI_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").expect("valid regex"));
static DATE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{1,2}-\d{1,2}$").expect("valid regex"));
static ACRONYM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2,6}$").expect("valid regex"));

const CONNECTORS: &[&str] = &["a", "an", "the", "and", "or", "of", "to", "for", "in"];

const PROVIDER_MAX: usize = 60;
const TITLE_MAX: usize = 80;
const BASENAME_MAX: usize = 180;
const UNIQUE_ATTEMPTS: u32 = 200;

/// Make `s` safe as a file-name component.
///
/// Control whitespace becomes a space, runs of reserved characters become
/// `-`, repeated whitespace collapses, and ` .-_` are stripped from both
/// ends before the result is cut to `max_len` characters.
pub fn safe_filename(s: &str, max_len: usize) -> String {
    let s = CONTROL_WS.replace_all(s, " ");
    let s = RESERVED.replace_all(&s, "-");
    let s = MULTI_WS.replace_all(&s, " ");
    s.trim()
        .trim_matches(|c| matches!(c, ' ' | '.' | '-' | '_'))
        .chars()
        .take(max_len)
        .collect()
}

/// `"{date} - {provider} - {document type} - {title}.pdf"`, with
/// placeholders for missing parts.
pub fn create_filename(info: &ExtractedInfo) -> String {
    let date = normalize_date(info.date.as_deref()).unwrap_or_else(|| "UnknownDate".into());
    let provider = safe_filename(
        non_blank(info.provider.as_deref()).unwrap_or("Unknown Provider"),
        PROVIDER_MAX,
    );
    let doc_type =
        normalize_document_type(info.document_type.as_deref()).unwrap_or_else(|| "Document".into());
    let title = safe_filename(non_blank(info.title.as_deref()).unwrap_or("Untitled"), TITLE_MAX);

    let base = [date, provider, doc_type, title]
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" - ");
    format!("{}.pdf", safe_filename(&base, BASENAME_MAX))
}

/// First free path among `path`, `name (2).ext` … `name (199).ext`, falling
/// back to the process id.
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let sibling = |tag: String| path.with_file_name(format!("{stem} ({tag}){ext}"));

    (2..UNIQUE_ATTEMPTS)
        .map(|i| sibling(i.to_string()))
        .find(|p| !p.exists())
        .unwrap_or_else(|| sibling(std::process::id().to_string()))
}

/// Human-readable title derived from a generated file name.
///
/// Words are title-cased except dates, short all-caps acronyms, and
/// connectors that do not start a segment.
pub fn pretty_title_from_filename(name: &str) -> String {
    let base = Path::new(name.trim())
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = base.trim();
    let cut = base.len().saturating_sub(4);
    let base = match base.get(cut..) {
        Some(ext) if ext.eq_ignore_ascii_case(".pdf") => &base[..cut],
        _ => base,
    };

    base.split(" - ")
        .filter_map(|part| {
            let words: Vec<String> = part
                .split_whitespace()
                .enumerate()
                .map(|(i, w)| pretty_word(w, i == 0))
                .collect();
            (!words.is_empty()).then(|| words.join(" "))
        })
        .collect::<Vec<_>>()
        .join(" - ")
}

fn pretty_word(word: &str, first: bool) -> String {
    if DATE_TOKEN.is_match(word) || ACRONYM.is_match(word) {
        return word.to_string();
    }
    let lower = word.to_lowercase();
    if !first && CONNECTORS.contains(&lower.as_str()) {
        lower
    } else {
        capitalize(word)
    }
}

/// PDF date string (`D:YYYYMMDD000000Z`) for a `YYYY-MM-DD` date.
pub fn pdf_creation_date(ymd: Option<&str>) -> Option<String> {
    let date = normalize_date(ymd)?;
    Some(format!("D:{}000000Z", date.replace('-', "")))
}

/// Join up to `n` cleaned keywords with `"; "`.
pub fn format_keywords(keywords: &[String], n: usize) -> Option<String> {
    let kept = clean_keywords(keywords, n);
    (!kept.is_empty()).then(|| kept.join("; "))
}

fn non_blank(v: Option<&str>) -> Option<&str> {
    if is_blank(v) {
        None
    } else {
        v
    }
}

/// Entries written to the PDF `/Info` dictionary.
///
/// Serializes with the PDF key names so a dry run prints exactly what would
/// be written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocInfo {
    #[serde(rename = "/Title")]
    pub title: Option<String>,
    #[serde(rename = "/Author")]
    pub author: Option<String>,
    #[serde(rename = "/Subject")]
    pub subject: Option<String>,
    #[serde(rename = "/Keywords")]
    pub keywords: Option<String>,
    #[serde(rename = "/CreationDate", skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    #[serde(rename = "/ModDate", skip_serializing_if = "Option::is_none")]
    pub mod_date: Option<String>,
}

impl DocInfo {
    /// Build the dictionary for `info`. The author falls back to the
    /// provider; both dates come from the document date.
    pub fn new(info: &ExtractedInfo, title: impl Into<String>, keywords_count: usize) -> Self {
        let author = non_blank(info.author.as_deref())
            .or_else(|| non_blank(info.provider.as_deref()))
            .map(str::to_string);
        let date = pdf_creation_date(info.date.as_deref());
        Self {
            title: Some(title.into()),
            author,
            subject: info.subject.clone(),
            keywords: info
                .keywords
                .as_deref()
                .and_then(|k| format_keywords(k, keywords_count)),
            creation_date: date.clone(),
            mod_date: date,
        }
    }

    /// Non-blank entries as `(key, value)` pairs, values trimmed.
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        [
            ("Title", &self.title),
            ("Author", &self.author),
            ("Subject", &self.subject),
            ("Keywords", &self.keywords),
            ("CreationDate", &self.creation_date),
            ("ModDate", &self.mod_date),
        ]
        .into_iter()
        .filter_map(|(k, v)| {
            let v = v.as_deref()?.trim();
            (!v.is_empty()).then_some((k, v))
        })
        .collect()
    }
}
