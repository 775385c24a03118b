//! PDF rasterisation: render the first pages to JPEG via `pdftoppm`.
//!
//! Every call renders into its own `TempDir`, so images from a previous
//! attempt are never reused and the directory is removed however the call
//! returns. Image capping and decoding run in `spawn_blocking` since they
//! are CPU-bound.

use crate::error::ToolError;
use crate::pipeline::encode::{prepare_page, PageImage};
use crate::pipeline::tools;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

static PAGE_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^page-(\d+)\.jpg$").expect("page file regex is valid"));

/// Renders the first pages of a PDF to images.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Render pages `1..=max_pages` at `dpi`. Fails when the tool fails or
    /// produces no images.
    async fn rasterize(
        &self,
        path: &Path,
        max_pages: u32,
        dpi: u32,
    ) -> Result<Vec<PageImage>, ToolError>;
}

/// Default rasterizer: `pdftoppm -f 1 -l N -r DPI -jpeg <pdf> <prefix>`.
#[derive(Debug, Clone)]
pub struct PdfToPpm {
    program: PathBuf,
    max_rendered_pixels: u32,
}

impl PdfToPpm {
    pub fn new(program: impl Into<PathBuf>, max_rendered_pixels: u32) -> Self {
        Self {
            program: program.into(),
            max_rendered_pixels,
        }
    }
}

#[async_trait]
impl Rasterizer for PdfToPpm {
    async fn rasterize(
        &self,
        path: &Path,
        max_pages: u32,
        dpi: u32,
    ) -> Result<Vec<PageImage>, ToolError> {
        let tool = tools::tool_name(&self.program);
        let io_err = |source| ToolError::Io {
            tool: tool.clone(),
            source,
        };

        let dir = tempfile::Builder::new()
            .prefix("scan_vlm_")
            .tempdir()
            .map_err(io_err)?;
        let prefix = dir.path().join("page");

        let last = max_pages.to_string();
        let res = dpi.to_string();
        let output = tools::run(
            &self.program,
            [
                OsStr::new("-f"),
                OsStr::new("1"),
                OsStr::new("-l"),
                OsStr::new(&last),
                OsStr::new("-r"),
                OsStr::new(&res),
                OsStr::new("-jpeg"),
                path.as_os_str(),
                prefix.as_os_str(),
            ],
        )
        .await?;
        tools::check(&self.program, &output)?;

        let files = rendered_pages(&dir).map_err(io_err)?;
        if files.is_empty() {
            return Err(ToolError::NoOutput { tool: tool.clone() });
        }

        let max_px = self.max_rendered_pixels;
        let mut images = Vec::with_capacity(files.len());
        for file in files {
            let bytes = tokio::fs::read(&file).await.map_err(io_err)?;
            let page = tokio::task::spawn_blocking(move || prepare_page(bytes, max_px))
                .await
                .map_err(|e| ToolError::Failed {
                    tool: tool.clone(),
                    code: -1,
                    detail: format!("Image task panicked: {e}"),
                })?
                .map_err(|e| ToolError::Failed {
                    tool: tool.clone(),
                    code: -1,
                    detail: format!("Unreadable page image {}: {e}", file.display()),
                })?;
            debug!("Prepared {} ({} bytes)", file.display(), page.data.len());
            images.push(page);
        }

        info!("Rendered {} image(s) at {} DPI", images.len(), dpi);
        Ok(images)
    }
}

/// `page-N.jpg` files in `dir`, ordered by page number.
///
/// pdftoppm zero-pads the number to the width of the page count, so sorting
/// by name would misorder documents with ten or more pages.
fn rendered_pages(dir: &TempDir) -> std::io::Result<Vec<PathBuf>> {
    let mut pages: Vec<(u32, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir.path())? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(num) = PAGE_FILE
            .captures(name)
            .and_then(|c| c[1].parse::<u32>().ok())
        {
            pages.push((num, path));
        }
    }
    pages.sort_by_key(|(n, _)| *n);
    Ok(pages.into_iter().map(|(_, p)| p).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_sorted_numerically() {
        let dir = TempDir::new().unwrap();
        for name in ["page-10.jpg", "page-2.jpg", "page-01.jpg", "other.jpg", "page-3.png"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let names: Vec<String> = rendered_pages(&dir)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["page-01.jpg", "page-2.jpg", "page-10.jpg"]);
    }

    #[tokio::test]
    async fn missing_tool_is_an_error() {
        let r = PdfToPpm::new("definitely-not-pdftoppm-5d0a", 2400);
        let err = r.rasterize(Path::new("/nonexistent.pdf"), 3, 200).await.unwrap_err();
        assert!(matches!(err, ToolError::Unavailable { .. }));
    }
}
