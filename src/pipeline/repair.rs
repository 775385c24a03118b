//! Structural repair of malformed PDFs.
//!
//! Scanner firmware and some PDF writers emit files with broken
//! cross-reference tables or missing trailers. Poppler refuses those, while
//! qpdf and Ghostscript can usually rewrite them into something readable.
//! [`RepairCoordinator`] decides when a failure warrants a rewrite and makes
//! sure at most one is attempted per run.

use crate::error::{clip, ToolError};
use crate::pipeline::tools;
use crate::progress::ProgressCallback;
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Rewrites a damaged PDF into a new file.
#[async_trait]
pub trait DocumentRepairer: Send + Sync {
    /// Write a repaired copy of `input` to `output`.
    async fn repair(&self, input: &Path, output: &Path) -> Result<(), ToolError>;
}

/// Default repairer: qpdf first, then a Ghostscript `pdfwrite` pass.
#[derive(Debug, Clone)]
pub struct QpdfGsRepairer {
    qpdf: PathBuf,
    gs: PathBuf,
}

impl QpdfGsRepairer {
    pub fn new(qpdf: impl Into<PathBuf>, gs: impl Into<PathBuf>) -> Self {
        Self {
            qpdf: qpdf.into(),
            gs: gs.into(),
        }
    }
}

#[async_trait]
impl DocumentRepairer for QpdfGsRepairer {
    async fn repair(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        // qpdf exits 3 when it succeeded with warnings, which is the usual
        // outcome for a file it had to reconstruct.
        match tools::run(&self.qpdf, [input.as_os_str(), output.as_os_str()]).await {
            Ok(out) if matches!(tools::exit_code(&out), 0 | 3) && output.exists() => {
                info!("qpdf repaired {}", input.display());
                return Ok(());
            }
            Ok(out) => warn!(
                "qpdf repair failed (rc={}): {}",
                tools::exit_code(&out),
                clip(&tools::diagnostic(&out), 200)
            ),
            Err(e) => debug!("Skipping qpdf: {}", e),
        }

        let args = [
            OsStr::new("-o"),
            output.as_os_str(),
            OsStr::new("-sDEVICE=pdfwrite"),
            OsStr::new("-dNOPAUSE"),
            OsStr::new("-dBATCH"),
            OsStr::new("-dSAFER"),
            input.as_os_str(),
        ];
        match tools::run(&self.gs, args).await {
            Ok(out) if out.status.success() && output.exists() => {
                info!("Ghostscript rewrote {}", input.display());
                return Ok(());
            }
            Ok(out) => warn!(
                "Ghostscript rewrite failed (rc={}): {}",
                tools::exit_code(&out),
                clip(&tools::diagnostic(&out), 200)
            ),
            Err(e) => debug!("Skipping gs: {}", e),
        }

        Err(ToolError::RepairExhausted)
    }
}

/// Whether a tool diagnostic names PDF structural corruption.
///
/// Only these failures are worth a repair; a missing file or a permission
/// error would fail the same way after a rewrite.
pub fn looks_like_pdf_syntax_error(msg: &str) -> bool {
    let s = msg.to_lowercase();
    s.contains("couldn't find trailer dictionary")
        || s.contains("couldn't read xref table")
        || s.contains("pdfsyntaxerror")
        || (s.contains("syntax error") && (s.contains("xref") || s.contains("trailer")))
}

/// Per-run repair state.
///
/// Holds the original path and, after a successful repair, the temporary
/// directory with the repaired copy. The directory is deleted when the
/// coordinator is dropped.
pub struct RepairCoordinator<'a> {
    original: PathBuf,
    repairer: &'a dyn DocumentRepairer,
    enabled: bool,
    attempted: bool,
    repaired: Option<(TempDir, PathBuf)>,
    progress: Option<&'a ProgressCallback>,
}

impl<'a> RepairCoordinator<'a> {
    pub fn new(
        original: impl Into<PathBuf>,
        repairer: &'a dyn DocumentRepairer,
        enabled: bool,
        progress: Option<&'a ProgressCallback>,
    ) -> Self {
        Self {
            original: original.into(),
            repairer,
            enabled,
            attempted: false,
            repaired: None,
            progress,
        }
    }

    /// The path every extraction should read: the repaired copy once one
    /// exists, the original otherwise.
    pub fn work_path(&self) -> &Path {
        match &self.repaired {
            Some((_, path)) => path,
            None => &self.original,
        }
    }

    pub fn is_repaired(&self) -> bool {
        self.repaired.is_some()
    }

    /// Try to repair the original document in response to `reason`.
    ///
    /// Returns the repaired path only when this call performed a successful
    /// repair. Returns `None` when repair is disabled, was already attempted
    /// in this run, `reason` is not a structural-corruption signature, or
    /// the repair failed.
    pub async fn maybe_repair(&mut self, reason: &str) -> Option<PathBuf> {
        if !self.enabled || self.attempted || !looks_like_pdf_syntax_error(reason) {
            return None;
        }
        self.attempted = true;
        info!("Attempting to repair {}", self.original.display());
        if let Some(cb) = self.progress {
            cb.on_repair_start();
        }

        let result = self.attempt().await;
        if let Some(cb) = self.progress {
            cb.on_repair_complete(result.is_ok());
        }
        match result {
            Ok(path) => {
                info!("Using repaired PDF for extraction");
                Some(path)
            }
            Err(e) => {
                warn!("Repair not available/failed: {}", e);
                None
            }
        }
    }

    async fn attempt(&mut self) -> Result<PathBuf, ToolError> {
        let dir = tempfile::Builder::new()
            .prefix("scan_pdf_repair_")
            .tempdir()
            .map_err(|source| ToolError::Io {
                tool: "repair".into(),
                source,
            })?;
        let out = dir.path().join("repaired.pdf");
        self.repairer.repair(&self.original, &out).await?;
        self.repaired = Some((dir, out.clone()));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        succeed: bool,
    }

    #[async_trait]
    impl DocumentRepairer for Counting {
        async fn repair(&self, _input: &Path, output: &Path) -> Result<(), ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                std::fs::write(output, b"%PDF-1.4 repaired").expect("write repaired");
                Ok(())
            } else {
                Err(ToolError::RepairExhausted)
            }
        }
    }

    const XREF: &str = "Syntax Error: Couldn't read xref table";

    #[test]
    fn syntax_error_signatures() {
        assert!(looks_like_pdf_syntax_error("Syntax Error: Couldn't find trailer dictionary"));
        assert!(looks_like_pdf_syntax_error(XREF));
        assert!(looks_like_pdf_syntax_error("PdfSyntaxError: bad object"));
        assert!(looks_like_pdf_syntax_error("syntax error near trailer"));
        assert!(!looks_like_pdf_syntax_error("syntax error in line 4"));
        assert!(!looks_like_pdf_syntax_error("Permission denied"));
        assert!(!looks_like_pdf_syntax_error(""));
    }

    #[tokio::test]
    async fn repairs_at_most_once() {
        let repairer = Counting {
            calls: AtomicUsize::new(0),
            succeed: false,
        };
        let mut coord = RepairCoordinator::new("/tmp/in.pdf", &repairer, true, None);
        assert_eq!(coord.maybe_repair(XREF).await, None);
        assert_eq!(coord.maybe_repair(XREF).await, None);
        assert_eq!(repairer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(coord.work_path(), Path::new("/tmp/in.pdf"));
    }

    #[tokio::test]
    async fn unrelated_failures_do_not_consume_the_attempt() {
        let repairer = Counting {
            calls: AtomicUsize::new(0),
            succeed: true,
        };
        let mut coord = RepairCoordinator::new("/tmp/in.pdf", &repairer, true, None);
        assert_eq!(coord.maybe_repair("No such file or directory").await, None);
        assert_eq!(repairer.calls.load(Ordering::SeqCst), 0);
        assert!(coord.maybe_repair(XREF).await.is_some());
    }

    #[tokio::test]
    async fn disabled_never_calls_repairer() {
        let repairer = Counting {
            calls: AtomicUsize::new(0),
            succeed: true,
        };
        let mut coord = RepairCoordinator::new("/tmp/in.pdf", &repairer, false, None);
        assert_eq!(coord.maybe_repair(XREF).await, None);
        assert_eq!(repairer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn repaired_copy_is_used_then_deleted() {
        let repairer = Counting {
            calls: AtomicUsize::new(0),
            succeed: true,
        };
        let mut coord = RepairCoordinator::new("/tmp/in.pdf", &repairer, true, None);
        let repaired = coord.maybe_repair(XREF).await.expect("repaired");
        assert_eq!(coord.work_path(), repaired.as_path());
        assert!(coord.is_repaired());
        assert!(repaired.exists());
        assert!(repaired.ends_with("repaired.pdf"));
        drop(coord);
        assert!(!repaired.exists());
    }

    #[tokio::test]
    async fn default_repairer_without_tools_is_exhausted() {
        let r = QpdfGsRepairer::new("no-such-qpdf-3f1a", "no-such-gs-3f1a");
        let dir = TempDir::new().unwrap();
        let err = r
            .repair(Path::new("/nonexistent.pdf"), &dir.path().join("out.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::RepairExhausted));
    }
}
