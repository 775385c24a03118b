//! In-place PDF document-information (`/Info`) updates.
//!
//! The rewritten document goes to a temporary file next to the original and
//! is renamed over it only after a complete save, so a failed write never
//! leaves a truncated PDF behind. Encrypted and signed documents are refused
//! untouched.

use crate::error::MetadataSkip;
use crate::naming::DocInfo;
use crate::signature::is_signed;
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Write `doc_info` into the PDF at `path`, replacing the file atomically.
pub fn write_pdf_metadata_in_place(path: &Path, doc_info: &DocInfo) -> Result<(), MetadataSkip> {
    let result = write_inner(path, doc_info);
    match &result {
        Ok(()) => info!("Wrote document info to {}", path.display()),
        Err(reason) => warn!("Metadata skipped for {}: {}", path.display(), reason),
    }
    result
}

/// Async wrapper: the load/save work runs on the blocking thread pool.
pub async fn write_pdf_metadata(path: PathBuf, doc_info: DocInfo) -> Result<(), MetadataSkip> {
    tokio::task::spawn_blocking(move || write_pdf_metadata_in_place(&path, &doc_info))
        .await
        .map_err(|e| MetadataSkip::WriteFailed(format!("metadata task panicked: {e}")))?
}

fn write_inner(path: &Path, doc_info: &DocInfo) -> Result<(), MetadataSkip> {
    if doc_info.entries().is_empty() {
        return Err(MetadataSkip::NoMetadata);
    }

    let bytes = std::fs::read(path).map_err(write_failed)?;
    let mut doc = match Document::load_mem(&bytes) {
        Ok(doc) => doc,
        Err(e) if contains(&bytes, b"/Encrypt") => {
            debug!("Load failed on encrypted document: {}", e);
            return Err(MetadataSkip::Encrypted);
        }
        Err(e) => return Err(write_failed(e)),
    };

    apply_doc_info(&mut doc, doc_info)?;
    save_atomically(&mut doc, path)
}

/// Set the `/Info` entries on a loaded document.
///
/// Refuses encrypted and signed documents without modifying them.
pub fn apply_doc_info(doc: &mut Document, doc_info: &DocInfo) -> Result<(), MetadataSkip> {
    let entries = doc_info.entries();
    if entries.is_empty() {
        return Err(MetadataSkip::NoMetadata);
    }
    if doc.trailer.has(b"Encrypt") {
        return Err(MetadataSkip::Encrypted);
    }
    if is_signed(doc) {
        return Err(MetadataSkip::Signed);
    }

    let info_id = info_dictionary_id(doc);
    let info = doc
        .get_object_mut(info_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| MetadataSkip::WriteFailed(format!("/Info is unusable: {e}")))?;
    for (key, value) in entries {
        info.set(key, pdf_text(value));
    }
    Ok(())
}

/// The indirect `/Info` dictionary, created (or lifted out of the trailer
/// when stored inline) as needed.
fn info_dictionary_id(doc: &mut Document) -> ObjectId {
    if let Ok(id) = doc.trailer.get(b"Info").and_then(Object::as_reference) {
        if matches!(doc.get_object(id), Ok(Object::Dictionary(_))) {
            return id;
        }
    }
    let existing = doc
        .trailer
        .get(b"Info")
        .and_then(Object::as_dict)
        .cloned()
        .unwrap_or_else(|_| Dictionary::new());
    let id = doc.add_object(existing);
    doc.trailer.set("Info", id);
    id
}

/// PDF text string: a literal for ASCII, UTF-16BE with a byte-order mark
/// otherwise.
fn pdf_text(value: &str) -> Object {
    if value.is_ascii() {
        return Object::String(value.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn save_atomically(doc: &mut Document, path: &Path) -> Result<(), MetadataSkip> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    // Dropping `tmp` on any error path removes the temporary file.
    let mut tmp = tempfile::Builder::new()
        .prefix(".scanfile_meta_")
        .suffix(".pdf")
        .tempfile_in(dir)
        .map_err(write_failed)?;
    doc.save_to(&mut tmp).map_err(write_failed)?;
    tmp.as_file().sync_all().map_err(write_failed)?;

    if let Ok(meta) = std::fs::metadata(path) {
        if let Err(e) = std::fs::set_permissions(tmp.path(), meta.permissions()) {
            debug!("Could not copy permissions: {}", e);
        }
    }
    tmp.persist(path).map_err(|e| write_failed(e.error))?;
    Ok(())
}

fn write_failed(e: impl std::fmt::Display) -> MetadataSkip {
    MetadataSkip::WriteFailed(e.to_string())
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn one_page_doc() -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    fn write_pdf(doc: &mut Document, dir: &Path) -> PathBuf {
        let path = dir.join("scan.pdf");
        doc.save(&path).unwrap();
        path
    }

    fn sample_info() -> DocInfo {
        DocInfo {
            title: Some("2024-01-02 - Acme - Invoice - Widgets".into()),
            author: Some("Acme".into()),
            keywords: Some("widgets; acme".into()),
            creation_date: Some("D:20240102000000Z".into()),
            mod_date: Some("D:20240102000000Z".into()),
            ..Default::default()
        }
    }

    fn info_string(doc: &Document, key: &[u8]) -> Vec<u8> {
        let id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = doc.get_object(id).unwrap().as_dict().unwrap();
        info.get(key).unwrap().as_str().unwrap().to_vec()
    }

    #[test]
    fn writes_info_dictionary() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_pdf(&mut one_page_doc(), dir.path());

        write_pdf_metadata_in_place(&path, &sample_info()).unwrap();

        let doc = Document::load(&path).unwrap();
        assert_eq!(info_string(&doc, b"Title"), b"2024-01-02 - Acme - Invoice - Widgets");
        assert_eq!(info_string(&doc, b"Keywords"), b"widgets; acme");
        assert_eq!(info_string(&doc, b"CreationDate"), b"D:20240102000000Z");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(".scanfile_meta_"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn non_ascii_is_utf16_with_bom() {
        match pdf_text("Café") {
            Object::String(bytes, StringFormat::Hexadecimal) => {
                assert_eq!(&bytes[..2], &[0xFE, 0xFF]);
                assert_eq!(bytes.len(), 2 + 4 * 2);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(pdf_text("Cafe"), Object::String(_, StringFormat::Literal)));
    }

    #[test]
    fn empty_doc_info_is_no_metadata() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_pdf(&mut one_page_doc(), dir.path());
        let blank = DocInfo {
            title: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(
            write_pdf_metadata_in_place(&path, &blank),
            Err(MetadataSkip::NoMetadata)
        );
    }

    #[test]
    fn encrypted_is_refused() {
        let mut doc = one_page_doc();
        doc.trailer.set("Encrypt", dictionary! { "Filter" => "Standard" });
        assert_eq!(
            apply_doc_info(&mut doc, &sample_info()),
            Err(MetadataSkip::Encrypted)
        );
    }

    #[test]
    fn signed_file_is_left_unchanged() {
        let mut doc = one_page_doc();
        let field = doc.add_object(dictionary! { "FT" => "Sig" });
        let root_id = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
        doc.get_object_mut(root_id)
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .set("AcroForm", dictionary! { "Fields" => vec![field.into()] });

        let dir = tempfile::TempDir::new().unwrap();
        let path = write_pdf(&mut doc, dir.path());
        let before = std::fs::read(&path).unwrap();

        assert_eq!(
            write_pdf_metadata_in_place(&path, &sample_info()),
            Err(MetadataSkip::Signed)
        );
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn garbage_file_is_write_failed() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.pdf");
        std::fs::write(&path, b"%PDF-1.4 not really").unwrap();
        assert!(matches!(
            write_pdf_metadata_in_place(&path, &sample_info()),
            Err(MetadataSkip::WriteFailed(_))
        ));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4 not really");
    }

    #[test]
    fn inline_info_entries_are_kept() {
        let mut doc = one_page_doc();
        doc.trailer.set(
            "Info",
            dictionary! { "Producer" => Object::string_literal("Scanner 3000") },
        );
        apply_doc_info(&mut doc, &sample_info()).unwrap();
        assert_eq!(info_string(&doc, b"Producer"), b"Scanner 3000");
        assert_eq!(info_string(&doc, b"Author"), b"Acme");
    }

    #[tokio::test]
    async fn async_wrapper_writes() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_pdf(&mut one_page_doc(), dir.path());
        write_pdf_metadata(path.clone(), sample_info()).await.unwrap();
        let doc = Document::load(&path).unwrap();
        assert_eq!(info_string(&doc, b"Author"), b"Acme");
    }
}
