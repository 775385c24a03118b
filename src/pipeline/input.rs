//! Input validation: make sure the user-supplied path is a readable PDF.
//!
//! Checking up front turns "pdftotext failed" into a specific error before
//! any tool or model is involved. The `%PDF` header is accepted anywhere in
//! the first kilobyte, as PDF readers do, since some scanners prepend junk.

use crate::error::ScanfileError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

const HEADER_WINDOW: usize = 1024;

/// Validate that `path` exists, is readable, and carries a PDF header.
pub fn validate_pdf(path: &Path) -> Result<PathBuf, ScanfileError> {
    let path = path.to_path_buf();
    if !path.is_file() {
        return Err(ScanfileError::FileNotFound { path });
    }

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ScanfileError::PermissionDenied { path });
        }
        Err(_) => return Err(ScanfileError::FileNotFound { path }),
    };

    let mut head = Vec::with_capacity(HEADER_WINDOW);
    if let Err(e) = file.by_ref().take(HEADER_WINDOW as u64).read_to_end(&mut head) {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            return Err(ScanfileError::PermissionDenied { path });
        }
        return Err(ScanfileError::Internal(format!(
            "Failed to read '{}': {e}",
            path.display()
        )));
    }

    if !head.windows(4).any(|w| w == b"%PDF") {
        let mut magic = [0u8; 4];
        let n = head.len().min(4);
        magic[..n].copy_from_slice(&head[..n]);
        return Err(ScanfileError::NotAPdf { path, magic });
    }

    debug!("Validated local PDF: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn accepts_pdf_header() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.7\n...").unwrap();
        assert_eq!(validate_pdf(f.path()).unwrap(), f.path());
    }

    #[test]
    fn accepts_header_after_leading_junk() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"\r\n\0\0junk%PDF-1.4\n").unwrap();
        assert!(validate_pdf(f.path()).is_ok());
    }

    #[test]
    fn rejects_non_pdf() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"PK\x03\x04zipdata").unwrap();
        match validate_pdf(f.path()) {
            Err(ScanfileError::NotAPdf { magic, .. }) => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn missing_file() {
        let err = validate_pdf(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, ScanfileError::FileNotFound { .. }));
    }

    #[test]
    fn directory_is_not_a_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = validate_pdf(dir.path()).unwrap_err();
        assert!(matches!(err, ScanfileError::FileNotFound { .. }));
    }
}
