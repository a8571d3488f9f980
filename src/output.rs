//! Flow results and the reply envelopes handed back to whoever triggered
//! a flow.
//!
//! [`ConvertOutput`] and [`ExportOutput`] carry everything a library caller
//! might want. [`ConvertResponse`] and [`ExportResponse`] are the compact
//! `{ success, message }` replies a routing layer serialises as-is, paired
//! with [`ConvertResponse::status_code`] for the HTTP status.

use crate::error::{ErrorKind, Pdf2TallyError, Result};
use crate::store::ArtifactInfo;
use serde::{Deserialize, Serialize};

// ── Flow results ─────────────────────────────────────────────────────────

/// Result of a successful Convert flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertOutput {
    pub artifact: ArtifactInfo,
    /// Rows written, header included.
    pub rows: usize,
    /// Width of the widest row.
    pub columns: usize,
    pub stats: ConvertStats,
}

/// Wall-clock timings for one conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvertStats {
    pub extract_duration_ms: u64,
    pub write_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Result of a successful Export flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOutput {
    /// The document that was sent.
    pub xml: String,
    /// Body returned by the accounting endpoint.
    pub response: String,
    /// Number of ledger entries in the document.
    pub records: usize,
}

// ── Reply envelopes ──────────────────────────────────────────────────────

/// `{ success, message, file? }` reply for the Convert flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip)]
    status: u16,
}

impl ConvertResponse {
    pub fn from_result(result: &Result<ConvertOutput>) -> Self {
        match result {
            Ok(out) => Self {
                success: true,
                message: "Converted to Excel with structure".into(),
                file: Some(out.artifact.file_name.clone()),
                status: 200,
            },
            Err(e) => Self {
                success: false,
                message: convert_failure_message(e),
                file: None,
                status: e.status_code(),
            },
        }
    }

    /// HTTP status matching this reply.
    pub fn status_code(&self) -> u16 {
        self.status
    }
}

fn convert_failure_message(e: &Pdf2TallyError) -> String {
    match e {
        Pdf2TallyError::NotAPdf { magic } if magic.is_empty() => "No file uploaded".into(),
        e if e.kind() == ErrorKind::Extraction => format!("Failed to extract tables: {e}"),
        e => format!("Conversion failed: {e}"),
    }
}

/// `{ success, message }` reply for the Export flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip)]
    status: u16,
}

impl ExportResponse {
    pub fn from_result(result: &Result<ExportOutput>) -> Self {
        match result {
            Ok(out) => Self {
                success: true,
                message: format!("Exported to Tally Prime! Response: {}", out.response),
                status: 200,
            },
            Err(e) => Self {
                success: false,
                message: format!("Failed to export to Tally Prime: {e}"),
                status: e.status_code(),
            },
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ArtifactKey;
    use std::path::PathBuf;

    fn converted() -> ConvertOutput {
        let key = ArtifactKey::default();
        ConvertOutput {
            artifact: ArtifactInfo {
                file_name: key.file_name(),
                path: PathBuf::from("uploads/output.xlsx"),
                key,
                size_bytes: 4096,
            },
            rows: 3,
            columns: 2,
            stats: ConvertStats::default(),
        }
    }

    #[test]
    fn convert_success_names_the_file() {
        let resp = ConvertResponse::from_result(&Ok(converted()));
        assert!(resp.success);
        assert_eq!(resp.message, "Converted to Excel with structure");
        assert_eq!(resp.file.as_deref(), Some("output.xlsx"));
        assert_eq!(resp.status_code(), 200);

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["file"], "output.xlsx");
        assert!(json.get("status").is_none());
    }

    #[test]
    fn convert_failures() {
        let resp = ConvertResponse::from_result(&Err(Pdf2TallyError::NotAPdf { magic: vec![] }));
        assert_eq!(resp.message, "No file uploaded");
        assert_eq!(resp.status_code(), 400);

        let resp =
            ConvertResponse::from_result(&Err(Pdf2TallyError::NoExtractableText { pages: 2 }));
        assert!(!resp.success);
        assert!(resp.message.starts_with("Failed to extract tables"));
        assert_eq!(resp.status_code(), 422);
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("file").is_none());

        let resp = ConvertResponse::from_result(&Err(Pdf2TallyError::WorkbookFailed(
            "disk full".into(),
        )));
        assert!(resp.message.starts_with("Conversion failed"));
        assert_eq!(resp.status_code(), 500);
    }

    #[test]
    fn export_replies_wrap_remote_response() {
        let ok = ExportResponse::from_result(&Ok(ExportOutput {
            xml: String::new(),
            response: "<RESPONSE>1</RESPONSE>".into(),
            records: 1,
        }));
        assert_eq!(
            ok.message,
            "Exported to Tally Prime! Response: <RESPONSE>1</RESPONSE>"
        );

        let missing = ExportResponse::from_result(&Err(Pdf2TallyError::ArtifactNotFound {
            key: "output".into(),
            path: PathBuf::from("uploads/output.xlsx"),
        }));
        assert!(!missing.success);
        assert!(missing.message.starts_with("Failed to export to Tally Prime"));
        assert_eq!(missing.status_code(), 404);
    }
}
