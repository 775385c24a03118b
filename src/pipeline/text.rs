//! Text-layer extraction.

use crate::pipeline::tools;
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Exit code reported when the extractor program cannot be run at all.
pub const EXIT_UNAVAILABLE: i32 = 127;

/// Result of one extraction attempt. Never an error: failure is a non-zero
/// `exit_code` with `error` carrying the tool's diagnostic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextExtraction {
    /// Trimmed text; empty on failure.
    pub text: String,
    pub exit_code: i32,
    pub error: String,
}

impl TextExtraction {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into().trim().to_string(),
            exit_code: 0,
            error: String::new(),
        }
    }

    pub fn failed(exit_code: i32, error: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            exit_code,
            error: error.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.exit_code == 0
    }
}

/// Pulls the embedded text layer out of a PDF.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, path: &Path) -> TextExtraction;
}

/// Default extractor: `pdftotext <pdf> -`.
#[derive(Debug, Clone)]
pub struct PdfToText {
    program: PathBuf,
}

impl PdfToText {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl TextExtractor for PdfToText {
    async fn extract_text(&self, path: &Path) -> TextExtraction {
        let output = match tools::run(&self.program, [path.as_os_str(), OsStr::new("-")]).await {
            Ok(o) => o,
            Err(e) => {
                warn!("Text extraction unavailable: {}", e);
                return TextExtraction::failed(EXIT_UNAVAILABLE, e.to_string());
            }
        };
        if !output.status.success() {
            let code = tools::exit_code(&output);
            let err = tools::diagnostic(&output);
            warn!("pdftotext failed (rc={}): {}", code, crate::error::clip(&err, 200));
            return TextExtraction::failed(code, err);
        }
        let extraction = TextExtraction::ok(String::from_utf8_lossy(&output.stdout));
        info!("pdftotext ok: {} chars", extraction.text.chars().count());
        extraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_trims_text() {
        let t = TextExtraction::ok("\n  hello \n");
        assert_eq!(t.text, "hello");
        assert!(t.is_ok());
    }

    #[tokio::test]
    async fn missing_tool_is_exit_127() {
        let ex = PdfToText::new("definitely-not-pdftotext-91b2");
        let t = ex.extract_text(Path::new("/nonexistent.pdf")).await;
        assert_eq!(t.exit_code, EXIT_UNAVAILABLE);
        assert!(t.text.is_empty());
        assert!(t.error.contains("not available"));
    }
}
