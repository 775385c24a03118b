//! # scanfile-rename
//!
//! Extract naming metadata (date, provider, document type, title, author,
//! subject, keywords) from scanned PDFs using a language model, and use it
//! to rename the file and fill in its document-information dictionary.
//!
//! ## Why this crate?
//!
//! Scanned paperwork arrives as `scan_0042.pdf`. The text layer, when there
//! is one, is OCR noise; when there isn't, only the page images carry the
//! information. This crate tries the cheap path first (the text layer, cut
//! down to fit the model's context) and falls back to sending rendered
//! pages to a vision model, repairing broken PDFs along the way.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     validate path and %PDF header
//!  ├─ 2. Text      pdftotext (repair with qpdf/gs on structural errors)
//!  ├─ 3. Text LLM  compacted text at decreasing budgets
//!  ├─ 4. Vision    pdftoppm pages at decreasing page counts
//!  ├─ 5. Merge     vision fills gaps in a weak text result
//!  ├─ 6. Cleanup   subject, keywords, author
//!  └─ 7. Fallback  pattern matching over the raw text
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scanfile_rename::{create_filename, extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Defaults to an OpenAI-compatible server at localhost:1234 (LM Studio).
//!     let config = ExtractionConfig::default();
//!     let info = extract("scan_0042.pdf", &config).await?.into_info()?;
//!     println!("{}", create_filename(&info));
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `scanfile-rename` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## External Tools
//!
//! `pdftotext` and `pdftoppm` (poppler) are required; `qpdf` and `gs` are
//! optional and only used for repair. Each path is configurable and
//! resolved through `PATH` when given as a bare name.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod signature;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{MetadataSkip, ScanfileError, ServiceError, ToolError};
pub use extract::{extract, extract_information, extract_sync};
pub use metadata::{write_pdf_metadata, write_pdf_metadata_in_place};
pub use naming::{
    create_filename, format_keywords, pdf_creation_date, pretty_title_from_filename,
    safe_filename, unique_path, DocInfo,
};
pub use output::{DateBasis, ExtractedInfo, ExtractionOutcome, InfoSource};
pub use pipeline::encode::PageImage;
pub use pipeline::llm::{ChatTurn, CompletionRequest, CompletionService, ContentPart, Role};
pub use pipeline::render::Rasterizer;
pub use pipeline::repair::DocumentRepairer;
pub use pipeline::text::{TextExtraction, TextExtractor};
pub use progress::{ExtractionProgressCallback, Modality, NoopProgressCallback, ProgressCallback};
pub use signature::is_signed;
