//! Error types for the scanfile-rename library.
//!
//! Four error types map onto four distinct failure modes:
//!
//! * [`ScanfileError`]: **Fatal**: the run cannot proceed at all (input
//!   missing, not a PDF, invalid configuration). Returned as `Err` from the
//!   top-level `extract*` functions.
//!
//! * [`ToolError`]: an external program (`pdftotext`, `pdftoppm`, `qpdf`,
//!   `gs`) was missing or failed. Absorbed by the orchestrator: it either
//!   drives a repair attempt or moves the cascade along.
//!
//! * [`ServiceError`]: the language-model service failed. The variant
//!   decides whether the call is retried, and the message decides whether
//!   the input gets shrunk (context overflow).
//!
//! * [`MetadataSkip`]: the in-place DocumentInfo update refused or failed.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the scanfile-rename library.
#[derive(Debug, Error)]
pub enum ScanfileError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// Every model-based attempt failed and there was no text to fall back on.
    #[error("Failed to extract information ({raw_chars} chars of raw text available)")]
    NoInformation { raw_chars: usize },

    /// The configured provider could not be constructed (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create, copy or move the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure of an external document tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The program is neither at the configured path nor on `PATH`.
    #[error("{tool} is not available (not found on PATH)")]
    Unavailable { tool: String },

    /// The program ran and exited non-zero.
    #[error("{tool} failed (rc={code}): {}", clip(.detail, 200))]
    Failed {
        tool: String,
        code: i32,
        detail: String,
    },

    /// The program exited cleanly but produced nothing usable.
    #[error("{tool} produced no output")]
    NoOutput { tool: String },

    /// Spawning the program or reading its output failed.
    #[error("{tool}: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// Neither repair tool produced a replacement document.
    #[error("No repair tool succeeded (qpdf/gs not available or failed)")]
    RepairExhausted,
}

impl ToolError {
    /// Full diagnostic text, untruncated.
    ///
    /// Repair-signature detection reads this rather than the `Display`
    /// output so a signature deep in a long stderr dump is still seen.
    pub fn diagnostic(&self) -> String {
        match self {
            ToolError::Failed { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

/// A failure of the language-model completion service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// The request never produced an HTTP response (DNS, connect, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// HTTP 5xx: retryable.
    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// HTTP 4xx: not retryable.
    #[error("client error (HTTP {status}): {message}")]
    Client { status: u16, message: String },

    /// A 2xx response whose envelope could not be read.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ServiceError {
    /// Transport and server-class failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Transport(_) | ServiceError::Server { .. })
    }

    /// Whether the message reads like the input exceeded the model's window.
    ///
    /// Backends phrase this differently ("context length exceeded",
    /// "prompt overflows", "not enough tokens"), so match on the message.
    pub fn is_context_overflow(&self) -> bool {
        let s = self.to_string().to_lowercase();
        s.contains("context length") || s.contains("overflow") || s.contains("not enough")
    }
}

/// Why the in-place DocumentInfo update did not happen.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetadataSkip {
    #[error("no_metadata")]
    NoMetadata,

    #[error("encrypted")]
    Encrypted,

    #[error("signed")]
    Signed,

    /// Loading, rewriting or renaming failed; the original is untouched.
    #[error("write_failed")]
    WriteFailed(String),
}

/// Truncate `s` to at most `max` characters.
pub(crate) fn clip(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_failure_display_is_truncated() {
        let e = ToolError::Failed {
            tool: "pdftotext".into(),
            code: 1,
            detail: "x".repeat(500),
        };
        let msg = e.to_string();
        assert!(msg.starts_with("pdftotext failed (rc=1): "), "got: {msg}");
        assert!(msg.len() < 300);
        assert_eq!(e.diagnostic().len(), 500);
    }

    #[test]
    fn retryable_classes() {
        assert!(ServiceError::Transport("connection refused".into()).is_retryable());
        assert!(ServiceError::Server {
            status: 503,
            message: "busy".into()
        }
        .is_retryable());
        assert!(!ServiceError::Client {
            status: 400,
            message: "bad".into()
        }
        .is_retryable());
        assert!(!ServiceError::MalformedResponse("no choices".into()).is_retryable());
    }

    #[test]
    fn context_overflow_detection() {
        let e = ServiceError::Client {
            status: 400,
            message: "This model's maximum Context Length is 8192 tokens".into(),
        };
        assert!(e.is_context_overflow());

        let e = ServiceError::Client {
            status: 400,
            message: "The number of tokens to keep from the initial prompt is greater than the context; prompt overflows".into(),
        };
        assert!(e.is_context_overflow());

        let e = ServiceError::Client {
            status: 401,
            message: "invalid api key".into(),
        };
        assert!(!e.is_context_overflow());
    }

    #[test]
    fn metadata_skip_display_matches_reason_codes() {
        assert_eq!(MetadataSkip::Signed.to_string(), "signed");
        assert_eq!(MetadataSkip::Encrypted.to_string(), "encrypted");
        assert_eq!(MetadataSkip::NoMetadata.to_string(), "no_metadata");
        assert_eq!(
            MetadataSkip::WriteFailed("disk full".into()).to_string(),
            "write_failed"
        );
    }

    #[test]
    fn clip_counts_characters() {
        assert_eq!(clip("héllo", 2), "hé");
        assert_eq!(clip("hi", 10), "hi");
    }
}
