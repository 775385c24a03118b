//! Extraction entry points and the cascade orchestrator.
//!
//! One run works through the cheapest usable strategy first:
//!
//! ```text
//! text extract ──(≥ min_text_chars)──▶ text cascade ──▶ parsed ──(≥ 2 unknowns)──▶ vision cross-check
//!      │                                   │                                         (merge gaps)
//!      │                                   └─ every budget overflowed ─┐
//!      └─(too little text)─────────────────────────────────────────────┴──▶ vision cascade
//! ```
//!
//! Every transition is driven by what the tools and the service report
//! (exit codes, error text), the text length, whether the reply parsed, and
//! the unknown-field count. A structural-corruption failure from either
//! tool triggers the single repair attempt of the run.

use crate::config::ExtractionConfig;
use crate::error::ScanfileError;
use crate::output::{ExtractedInfo, ExtractionOutcome, InfoSource};
use crate::pipeline::compact::compact_text;
use crate::pipeline::heuristic::heuristic_extract;
use crate::pipeline::input::validate_pdf;
use crate::pipeline::llm::{complete_with_retry, resolve_service, ChatTurn, CompletionRequest, CompletionService};
use crate::pipeline::merge::merge_fill_missing;
use crate::pipeline::normalize::unknown_count;
use crate::pipeline::parse::parse_json_loose;
use crate::pipeline::postprocess::clean_info;
use crate::pipeline::render::{PdfToPpm, Rasterizer};
use crate::pipeline::repair::{DocumentRepairer, QpdfGsRepairer, RepairCoordinator};
use crate::pipeline::text::{PdfToText, TextExtractor};
use crate::progress::{ExtractionProgressCallback, Modality, ProgressCallback};
use crate::prompts::{text_prompt, vision_prompt, SYSTEM_PROMPT};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract metadata from a scanned PDF, falling back to pattern matching
/// over the raw text when every model attempt fails.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(outcome)` whenever the input was a readable PDF. `outcome.info` is
/// `None` only when no model result was produced and there was no raw text
/// to fall back on; use [`ExtractionOutcome::into_info`] to turn that into
/// an error.
///
/// # Errors
/// - File not found / permission denied / not a PDF
/// - The named provider could not be constructed
pub async fn extract(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutcome, ScanfileError> {
    let mut outcome = run_cascade(path.as_ref(), config).await?;
    if outcome.info.is_none() && !outcome.raw_text.is_empty() {
        info!("Falling back to heuristic extraction");
        if let Some(ref cb) = config.progress_callback {
            cb.on_heuristic_fallback();
        }
        outcome.info = Some(heuristic_extract(&outcome.raw_text));
        outcome.source = Some(InfoSource::Heuristic);
    }
    Ok(outcome)
}

/// Run the model cascade only, without the heuristic fallback.
///
/// Returns the model result (if any) and the raw extracted text, which is
/// empty when text extraction failed.
pub async fn extract_information(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<(Option<ExtractedInfo>, String), ScanfileError> {
    let outcome = run_cascade(path.as_ref(), config).await?;
    Ok((outcome.info, outcome.raw_text))
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime. Do not call from within an existing
/// async context.
pub fn extract_sync(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutcome, ScanfileError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ScanfileError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(path, config))
}

async fn run_cascade(
    path: &Path,
    config: &ExtractionConfig,
) -> Result<ExtractionOutcome, ScanfileError> {
    let start = Instant::now();
    info!("Starting extraction: {}", path.display());

    // ── Step 1: Validate input and resolve collaborators ─────────────────
    let pdf = validate_pdf(path)?;
    let service = resolve_service(config)?;
    let text_extractor: Arc<dyn TextExtractor> = match config.text_extractor {
        Some(ref t) => Arc::clone(t),
        None => Arc::new(PdfToText::new(config.pdftotext.clone())),
    };
    let rasterizer: Arc<dyn Rasterizer> = match config.rasterizer {
        Some(ref r) => Arc::clone(r),
        None => Arc::new(PdfToPpm::new(config.pdftoppm.clone(), config.max_rendered_pixels)),
    };
    let repairer: Arc<dyn DocumentRepairer> = match config.repairer {
        Some(ref r) => Arc::clone(r),
        None => Arc::new(QpdfGsRepairer::new(config.qpdf.clone(), config.gs.clone())),
    };

    let progress = config.progress_callback.as_ref();
    let mut run = Cascade {
        config,
        service,
        rasterizer,
        repair: RepairCoordinator::new(&pdf, repairer.as_ref(), config.allow_repair, progress),
        progress,
    };

    // ── Step 2: Text layer, with one repair-driven retry ─────────────────
    let mut extraction = text_extractor.extract_text(run.repair.work_path()).await;
    if !extraction.is_ok()
        && run.repair.maybe_repair(&extraction.error).await.is_some()
    {
        extraction = text_extractor.extract_text(run.repair.work_path()).await;
    }
    let raw_text = extraction.text.trim().to_string();
    let chars = raw_text.chars().count();
    run.emit(|cb| cb.on_text_extracted(chars, extraction.is_ok()));
    debug!("Text layer: {} chars (rc={})", chars, extraction.exit_code);

    // ── Step 3: Text cascade ─────────────────────────────────────────────
    if chars >= config.min_text_chars {
        match run.text_cascade(&raw_text).await {
            TextOutcome::Parsed(mut info) => {
                let mut source = InfoSource::Text;
                let unknowns = unknown_count(&info);
                if unknowns >= 2 {
                    info!("{} unknown fields; cross-checking with vision", unknowns);
                    if let Some(vision) = run.vision_cascade(Some(&info)).await {
                        info = merge_fill_missing(&info, &vision);
                        source = InfoSource::TextWithVision;
                    }
                }
                clean_info(&mut info, config.keywords_count);
                info!("Extraction finished via {:?} in {:?}", source, start.elapsed());
                return Ok(ExtractionOutcome {
                    info: Some(info),
                    raw_text,
                    source: Some(source),
                });
            }
            TextOutcome::Stopped => {
                return Ok(ExtractionOutcome {
                    info: None,
                    raw_text,
                    source: None,
                });
            }
            TextOutcome::Exhausted => {
                info!("Every text budget overflowed the context");
            }
        }
    }

    // ── Step 4: Vision fallback ──────────────────────────────────────────
    info!("Falling back to vision");
    let info = run.vision_cascade(None).await;
    let source = info.as_ref().map(|_| InfoSource::Vision);
    info!("Extraction finished via {:?} in {:?}", source, start.elapsed());
    Ok(ExtractionOutcome {
        info,
        raw_text,
        source,
    })
}

/// How the text cascade ended.
enum TextOutcome {
    Parsed(ExtractedInfo),
    /// Unusable reply or a non-overflow service error: the run ends without
    /// a model result and without trying vision.
    Stopped,
    /// Every budget overflowed the model's context.
    Exhausted,
}

/// State shared by both cascades for one run.
struct Cascade<'a> {
    config: &'a ExtractionConfig,
    service: Arc<dyn CompletionService>,
    rasterizer: Arc<dyn Rasterizer>,
    repair: RepairCoordinator<'a>,
    progress: Option<&'a ProgressCallback>,
}

impl Cascade<'_> {
    fn emit(&self, f: impl FnOnce(&dyn ExtractionProgressCallback)) {
        if let Some(cb) = self.progress {
            f(cb.as_ref());
        }
    }

    fn stopped(&self, modality: Modality, reason: &str) {
        warn!("{} cascade stopped: {}", modality, crate::error::clip(reason, 200));
        self.emit(|cb| cb.on_cascade_stopped(modality, reason));
    }

    async fn text_cascade(&self, raw_text: &str) -> TextOutcome {
        let config = self.config;
        let budgets = &config.text_budgets;
        let total = budgets.len();
        for (idx, &budget) in budgets.iter().enumerate() {
            info!("Text pass {}/{}: budget={}", idx + 1, total, budget);
            self.emit(|cb| cb.on_text_pass(idx + 1, total, budget));

            let compacted = compact_text(raw_text, budget);
            let request = CompletionRequest::new(
                self.config,
                vec![
                    ChatTurn::system(SYSTEM_PROMPT),
                    ChatTurn::user(text_prompt(&compacted, self.config.keywords_count)),
                ],
                self.config.text_max_tokens,
            );

            match complete_with_retry(self.service.as_ref(), &request, self.config.retry_backoff_ms)
                .await
            {
                Ok(reply) => {
                    return match usable_result(&reply) {
                        Some(info) => {
                            debug!("Text reply parsed");
                            TextOutcome::Parsed(info)
                        }
                        None => {
                            self.stopped(Modality::Text, "reply was not a usable JSON object");
                            TextOutcome::Stopped
                        }
                    };
                }
                Err(e) if e.is_context_overflow() => {
                    info!("Context overflow; reducing budget");
                }
                Err(e) => {
                    self.stopped(Modality::Text, &e.to_string());
                    return TextOutcome::Stopped;
                }
            }
        }
        TextOutcome::Exhausted
    }

    /// Run the page-count cascade. Returns a cleaned result, or `None` when
    /// every pass failed or the first reply was unusable.
    async fn vision_cascade(&mut self, hint: Option<&ExtractedInfo>) -> Option<ExtractedInfo> {
        let counts = self.config.vision_page_counts();
        let total = counts.len();
        let mut pass = 0;
        while pass < total {
            let pages = counts[pass];
            info!("Vision pass {}/{}: pages={}", pass + 1, total, pages);
            self.emit(|cb| cb.on_vision_pass(pass + 1, total, pages));

            let images = match self
                .rasterizer
                .rasterize(self.repair.work_path(), pages, self.config.dpi)
                .await
            {
                Ok(images) => images,
                Err(e) => {
                    warn!("Rasterization failed: {}", e);
                    if self.repair.maybe_repair(&e.diagnostic()).await.is_some() {
                        info!("Restarting vision cascade on repaired copy");
                        pass = 0;
                    } else {
                        pass += 1;
                    }
                    continue;
                }
            };

            let request = CompletionRequest::new(
                self.config,
                vec![
                    ChatTurn::system(SYSTEM_PROMPT),
                    ChatTurn::user_with_images(
                        vision_prompt(hint, self.config.keywords_count),
                        &images,
                    ),
                ],
                self.config.vision_max_tokens,
            );

            match complete_with_retry(self.service.as_ref(), &request, self.config.retry_backoff_ms)
                .await
            {
                Ok(reply) => {
                    return match usable_result(&reply) {
                        Some(mut info) => {
                            clean_info(&mut info, self.config.keywords_count);
                            Some(info)
                        }
                        None => {
                            self.stopped(Modality::Vision, "reply was not a usable JSON object");
                            None
                        }
                    };
                }
                Err(e) if e.is_context_overflow() => {
                    info!("Context overflow; reducing pages");
                    pass += 1;
                }
                Err(e) => {
                    self.stopped(Modality::Vision, &e.to_string());
                    return None;
                }
            }
        }
        None
    }
}

/// A reply is usable when it contains a non-empty JSON object.
fn usable_result(reply: &str) -> Option<ExtractedInfo> {
    parse_json_loose(reply)
        .filter(|obj| !obj.is_empty())
        .map(|obj| ExtractedInfo::from_object(&obj))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usable_result_rejects_empty_and_prose() {
        assert!(usable_result("{}").is_none());
        assert!(usable_result("").is_none());
        assert!(usable_result("I could not read the document.").is_none());
        let info = usable_result("Result: {\"title\": \"Lab report\"}").unwrap();
        assert_eq!(info.title.as_deref(), Some("Lab report"));
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let config = ExtractionConfig::default();
        let err = extract("/definitely/not/here.pdf", &config).await.unwrap_err();
        assert!(matches!(err, ScanfileError::FileNotFound { .. }));
    }

    #[test]
    fn sync_wrapper_propagates_errors() {
        let config = ExtractionConfig::default();
        let err = extract_sync("/definitely/not/here.pdf", &config).unwrap_err();
        assert!(matches!(err, ScanfileError::FileNotFound { .. }));
    }
}
