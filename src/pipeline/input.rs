//! Input validation: an upload must be a non-empty PDF before pdfium sees it.
//!
//! The `%PDF` magic check needs no pdfium library, so a wrong upload is
//! rejected with [`Pdf2TallyError::NotAPdf`] even where pdfium is missing.

use crate::error::{Pdf2TallyError, Result};
use std::path::Path;
use tracing::debug;

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Reject uploads that do not start with the PDF magic bytes.
pub fn validate_pdf_bytes(bytes: &[u8]) -> Result<()> {
    if bytes.len() < PDF_MAGIC.len() || &bytes[..PDF_MAGIC.len()] != PDF_MAGIC {
        return Err(Pdf2TallyError::NotAPdf {
            magic: bytes.iter().take(PDF_MAGIC.len()).copied().collect(),
        });
    }
    Ok(())
}

/// Read a local PDF, distinguishing missing files from permission problems.
pub async fn read_pdf_file(path: &Path) -> Result<Vec<u8>> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Pdf2TallyError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Pdf2TallyError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    validate_pdf_bytes(&bytes)?;
    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_pdf_magic() {
        assert!(validate_pdf_bytes(b"%PDF-1.7\n...").is_ok());
    }

    #[test]
    fn rejects_other_content() {
        match validate_pdf_bytes(b"PK\x03\x04rest") {
            Err(Pdf2TallyError::NotAPdf { magic }) => assert_eq!(magic, b"PK\x03\x04"),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
        assert!(validate_pdf_bytes(b"").is_err());
        assert!(validate_pdf_bytes(b"%PD").is_err());
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = read_pdf_file(Path::new("/definitely/not/a/real/file.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2TallyError::FileNotFound { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn non_pdf_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");
        std::fs::write(&path, "Name,Amount\n").unwrap();
        let err = read_pdf_file(&path).await.unwrap_err();
        assert!(matches!(err, Pdf2TallyError::NotAPdf { .. }), "got: {err}");
    }
}
