//! Page image preparation: size cap and base64 encoding for the vision request.
//!
//! `pdftoppm` renders JPEG at the requested DPI. A letter page at 200 DPI is
//! 1700 × 2200 px, well inside the cap, so most pages pass through as the
//! original bytes. Oversized pages (posters, high DPI) are downscaled so the
//! longest edge is at most `max_rendered_pixels` and re-encoded as JPEG.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// One rendered page, ready to attach to a model request.
#[derive(Clone, PartialEq, Eq)]
pub struct PageImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for PageImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageImage")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl PageImage {
    pub fn jpeg(data: Vec<u8>) -> Self {
        Self {
            mime_type: "image/jpeg".to_string(),
            data,
        }
    }

    pub fn base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    /// `data:<mime>;base64,<payload>` for OpenAI-style `image_url` parts.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64())
    }

    /// Attachment for `edgequake-llm` providers.
    ///
    /// `detail: "high"` keeps fine print legible on GPT-4-class models.
    pub fn to_image_data(&self) -> ImageData {
        ImageData::new(self.base64(), self.mime_type.clone()).with_detail("high")
    }
}

/// Cap a rendered JPEG page to `max_px` on its longest edge.
pub fn prepare_page(jpeg: Vec<u8>, max_px: u32) -> Result<PageImage, image::ImageError> {
    let img = image::load_from_memory(&jpeg)?;
    let (w, h) = img.dimensions();
    if w.max(h) <= max_px {
        return Ok(PageImage::jpeg(jpeg));
    }

    let scaled = img.resize(max_px, max_px, FilterType::Triangle);
    debug!("Downscaled page {}x{} → {}x{}", w, h, scaled.width(), scaled.height());

    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(scaled.to_rgb8()).write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)?;
    Ok(PageImage::jpeg(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn jpeg_of(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([200, 10, 10])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
            .expect("encode should succeed");
        buf
    }

    #[test]
    fn small_page_passes_through_unchanged() {
        let bytes = jpeg_of(40, 60);
        let page = prepare_page(bytes.clone(), 100).unwrap();
        assert_eq!(page.data, bytes);
        assert_eq!(page.mime_type, "image/jpeg");
    }

    #[test]
    fn large_page_is_downscaled() {
        let page = prepare_page(jpeg_of(400, 200), 100).unwrap();
        let img = image::load_from_memory(&page.data).unwrap();
        assert_eq!(img.dimensions(), (100, 50));
    }

    #[test]
    fn data_url_is_base64_jpeg() {
        let page = PageImage::jpeg(vec![1, 2, 3]);
        assert_eq!(page.data_url(), "data:image/jpeg;base64,AQID");
        let decoded = STANDARD.decode(page.base64()).expect("valid base64");
        assert_eq!(decoded, vec![1, 2, 3]);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(prepare_page(b"not a jpeg".to_vec(), 100).is_err());
    }
}
