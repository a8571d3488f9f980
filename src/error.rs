//! Error types for the pdf2tally library.
//!
//! Every stage returns `Result<_, Pdf2TallyError>`. The variants are grouped
//! into a handful of [`ErrorKind`]s so a hosting layer can map a failure to a
//! reply without matching on every variant:
//!
//! * [`ErrorKind::Extraction`]: the uploaded document could not be turned
//!   into rows. Reported to the caller; nothing is persisted.
//! * [`ErrorKind::NotFound`]: Export or Retrieve ran before any successful
//!   Convert for that artifact key.
//! * [`ErrorKind::ImportTransport`]: the accounting endpoint was unreachable
//!   or rejected the payload. The artifact is untouched, so the caller may
//!   simply run Export again.
//! * [`ErrorKind::Storage`], [`ErrorKind::Config`], [`ErrorKind::Internal`]:
//!   local faults that are neither the caller's document nor the remote side.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Pdf2TallyError>;

/// All errors returned by the pdf2tally library.
#[derive(Debug, Error)]
pub enum Pdf2TallyError {
    // ── Extraction errors ─────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The upload is empty or does not start with the `%PDF` magic.
    #[error("Upload is not a PDF document (first bytes: {magic:?})")]
    NotAPdf { magic: Vec<u8> },

    /// pdfium could not parse the document.
    #[error("PDF is corrupt: {detail}")]
    CorruptPdf { detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired,

    /// A password was provided but it is wrong.
    #[error("Wrong password for encrypted PDF")]
    WrongPassword,

    /// The document parsed but no page carried any text.
    #[error("No extractable text found in {pages} page(s); scanned PDFs are not supported")]
    NoExtractableText { pages: usize },

    /// Extraction did not finish within the configured bound.
    #[error("Table extraction timed out after {secs}s\nIncrease --extract-timeout.")]
    ExtractionTimeout { secs: u64 },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/dir/containing/libpdfium, place the library in the\n\
working directory, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Artifact errors ───────────────────────────────────────────────────
    /// No artifact has been written for this key yet.
    #[error("Artifact '{key}' not found at '{path}'. Convert a PDF first.")]
    ArtifactNotFound { key: String, path: PathBuf },

    /// Writing or replacing the artifact failed; the previous one is intact.
    #[error("Failed to write artifact '{path}': {source}")]
    ArtifactWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The artifact exists but cannot be read back as a workbook.
    #[error("Artifact '{path}' is unreadable: {detail}")]
    ArtifactCorrupt { path: PathBuf, detail: String },

    /// The in-memory workbook could not be built or serialised.
    #[error("Spreadsheet generation failed: {0}")]
    WorkbookFailed(String),

    // ── Import transport errors ───────────────────────────────────────────
    /// Connection to the accounting endpoint failed.
    #[error("Accounting endpoint '{endpoint}' unreachable: {reason}")]
    ImportUnreachable { endpoint: String, reason: String },

    /// The accounting endpoint did not answer in time.
    #[error("Accounting endpoint '{endpoint}' timed out after {secs}s")]
    ImportTimeout { endpoint: String, secs: u64 },

    /// The accounting endpoint answered with a non-success status.
    #[error("Accounting endpoint rejected the import with HTTP {status}: {body}")]
    ImportRejected { status: u16, body: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or config-file validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Artifact keys are restricted to `[A-Za-z0-9_-]{1,64}`.
    #[error("Invalid artifact key '{0}': use 1–64 letters, digits, '-' or '_'")]
    InvalidArtifactKey(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`Pdf2TallyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Extraction,
    NotFound,
    ImportTransport,
    Storage,
    Config,
    Internal,
}

impl Pdf2TallyError {
    /// Which failure family this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        use Pdf2TallyError::*;
        match self {
            FileNotFound { .. }
            | PermissionDenied { .. }
            | NotAPdf { .. }
            | CorruptPdf { .. }
            | PasswordRequired
            | WrongPassword
            | NoExtractableText { .. }
            | ExtractionTimeout { .. }
            | PdfiumBindingFailed(_) => ErrorKind::Extraction,
            ArtifactNotFound { .. } => ErrorKind::NotFound,
            ImportUnreachable { .. } | ImportTimeout { .. } | ImportRejected { .. } => {
                ErrorKind::ImportTransport
            }
            ArtifactWriteFailed { .. } | ArtifactCorrupt { .. } | WorkbookFailed(_) => {
                ErrorKind::Storage
            }
            InvalidConfig(_) | InvalidArtifactKey(_) => ErrorKind::Config,
            Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP-style status a request-handling layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Pdf2TallyError::NotAPdf { .. } => 400,
            // A missing pdfium library is a server fault, not the caller's document.
            Pdf2TallyError::PdfiumBindingFailed(_) => 500,
            _ => match self.kind() {
                ErrorKind::Extraction => 422,
                ErrorKind::NotFound => 404,
                ErrorKind::ImportTransport => 502,
                ErrorKind::Config => 400,
                ErrorKind::Storage | ErrorKind::Internal => 500,
            },
        }
    }

    /// Whether a transport failure is worth another attempt under a retry policy.
    ///
    /// Client-side rejections (4xx) are final; connection failures, timeouts
    /// and server-side rejections (5xx) are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Pdf2TallyError::ImportUnreachable { .. } | Pdf2TallyError::ImportTimeout { .. } => true,
            Pdf2TallyError::ImportRejected { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let e = Pdf2TallyError::ArtifactNotFound {
            key: "output".into(),
            path: PathBuf::from("uploads/output.xlsx"),
        };
        assert_eq!(e.kind(), ErrorKind::NotFound);
        assert_eq!(e.status_code(), 404);
        assert!(e.to_string().contains("output.xlsx"), "got: {e}");
    }

    #[test]
    fn extraction_errors_classified() {
        assert_eq!(Pdf2TallyError::PasswordRequired.kind(), ErrorKind::Extraction);
        assert_eq!(
            Pdf2TallyError::NoExtractableText { pages: 2 }.status_code(),
            422
        );
        assert_eq!(
            Pdf2TallyError::NotAPdf { magic: b"PK".to_vec() }.status_code(),
            400
        );
        assert_eq!(
            Pdf2TallyError::PdfiumBindingFailed("missing".into()).status_code(),
            500
        );
    }

    #[test]
    fn rejected_display_includes_status() {
        let e = Pdf2TallyError::ImportRejected {
            status: 503,
            body: "busy".into(),
        };
        assert_eq!(e.kind(), ErrorKind::ImportTransport);
        assert_eq!(e.status_code(), 502);
        assert!(e.to_string().contains("503"));
        assert!(e.to_string().contains("busy"));
    }

    #[test]
    fn retryable_transport_errors() {
        assert!(Pdf2TallyError::ImportTimeout {
            endpoint: "http://localhost:9000".into(),
            secs: 5,
        }
        .is_retryable());
        assert!(Pdf2TallyError::ImportRejected {
            status: 502,
            body: String::new(),
        }
        .is_retryable());
        assert!(!Pdf2TallyError::ImportRejected {
            status: 400,
            body: String::new(),
        }
        .is_retryable());
        assert!(!Pdf2TallyError::WorkbookFailed("x".into()).is_retryable());
    }
}
