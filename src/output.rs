//! Result types: the extracted metadata and the outcome of one run.

use crate::error::ScanfileError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which date the `date` field refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateBasis {
    /// Date of service, appointment or delivery.
    Service,
    /// Issue date of the document itself.
    Document,
    Unknown,
}

impl DateBasis {
    /// Lenient parse of a model-supplied label. Unrecognised labels are `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "service" => Some(DateBasis::Service),
            "document" => Some(DateBasis::Document),
            "unknown" => Some(DateBasis::Unknown),
            _ => None,
        }
    }
}

/// Metadata extracted from one document.
///
/// Every field is independently optional; `None` means "unknown", never an
/// error. `date` keeps the string exactly as the model returned it and is
/// only trusted once it passes [`crate::pipeline::normalize::normalize_date`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedInfo {
    pub date: Option<String>,
    pub date_basis: Option<DateBasis>,
    pub provider: Option<String>,
    pub document_type: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub confidence: Option<f64>,
}

impl ExtractedInfo {
    /// Build from a JSON object returned by the model.
    ///
    /// Reading is tolerant: text fields accept strings or numbers, `keywords`
    /// must be an array (anything else is dropped, non-string items are
    /// skipped), `confidence` accepts a number or a numeric string and is
    /// clamped to `[0, 1]`.
    pub fn from_object(obj: &Map<String, Value>) -> Self {
        Self {
            date: text_field(obj, "date"),
            date_basis: obj
                .get("date_basis")
                .and_then(Value::as_str)
                .and_then(DateBasis::parse),
            provider: text_field(obj, "provider"),
            document_type: text_field(obj, "document_type"),
            title: text_field(obj, "title"),
            author: text_field(obj, "author"),
            subject: text_field(obj, "subject"),
            keywords: match obj.get("keywords") {
                Some(Value::Array(items)) => Some(
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect(),
                ),
                _ => None,
            },
            confidence: confidence_field(obj.get("confidence")),
        }
    }

    /// Confidence with "missing" read as zero.
    pub fn confidence_or_zero(&self) -> f64 {
        self.confidence.unwrap_or(0.0)
    }
}

fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn confidence_field(v: Option<&Value>) -> Option<f64> {
    let raw = match v? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if raw.is_nan() {
        return None;
    }
    Some(raw.clamp(0.0, 1.0))
}

/// `true` when the value is absent or only whitespace.
pub(crate) fn is_blank(v: Option<&str>) -> bool {
    v.map_or(true, |s| s.trim().is_empty())
}

/// Which stage produced the final [`ExtractedInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoSource {
    /// Text cascade alone.
    Text,
    /// Text cascade, gaps filled by the vision cross-check.
    TextWithVision,
    /// Vision cascade (no or too little text, or every text budget overflowed).
    Vision,
    /// Pattern matching over raw text after every model attempt failed.
    Heuristic,
}

/// The outcome of one extraction run.
///
/// `info` is `None` only when every stage failed; `raw_text` is always
/// returned so the caller can apply its own fallback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub info: Option<ExtractedInfo>,
    pub raw_text: String,
    pub source: Option<InfoSource>,
}

impl ExtractionOutcome {
    /// Convert a terminal failure into [`ScanfileError::NoInformation`].
    pub fn into_info(self) -> Result<ExtractedInfo, ScanfileError> {
        match self.info {
            Some(info) => Ok(info),
            None => Err(ScanfileError::NoInformation {
                raw_chars: self.raw_text.chars().count(),
            }),
        }
    }
}
