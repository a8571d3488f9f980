//! # pdf2tally
//!
//! Turn tabular PDFs (bank statements, ledgers, invoices) into a spreadsheet
//! artifact, then push that artifact into an accounting server as a ledger
//! import.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Convert                                   Export
//!  │                                         │
//!  ├─ 1. Input    %PDF magic check           ├─ 1. Read     artifact → records
//!  ├─ 2. Extract  pdfium text segments       ├─ 2. Map      records → ledger XML
//!  ├─ 3. Layout   fragments → rows/cells     └─ 3. Send     POST text/xml
//!  └─ 4. Store    single-sheet .xlsx (atomic)
//! ```
//!
//! The two flows share nothing but the artifact, one `.xlsx` file per
//! [`ArtifactKey`] under [`BridgeConfig::artifact_dir`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2tally::{convert_file, export, ArtifactKey, BridgeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BridgeConfig::builder()
//!         .endpoint("http://localhost:9000")
//!         .build()?;
//!     let key = ArtifactKey::default();
//!
//!     let converted = convert_file("statement.pdf", &key, &config).await?;
//!     eprintln!("{} rows → {}", converted.rows, converted.artifact.file_name);
//!
//!     let exported = export(&key, &config).await?;
//!     println!("{}", exported.response);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2tally` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! pdf2tally = { version = "0.1", default-features = false }
//! ```
//!
//! ## PDFium
//!
//! Extraction needs the pdfium shared library at run time. It is looked up
//! in [`ExtractConfig::pdfium_lib_path`], then `PDFIUM_LIB_PATH`, then the
//! working directory, then the system library path.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod export;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{BridgeConfig, BridgeConfigBuilder, ExtractConfig, ImportConfig, RetryPolicy};
pub use convert::{convert_bytes, convert_file, convert_sync};
pub use error::{ErrorKind, Pdf2TallyError, Result};
pub use export::{export, export_sync, render_export, retrieve};
pub use output::{ConvertOutput, ConvertResponse, ConvertStats, ExportOutput, ExportResponse};
pub use pipeline::tally::build_envelope;
pub use pipeline::transport::ImportClient;
pub use progress::{Flow, NoopObserver, Observer, PipelineObserver, Stage};
pub use record::{Record, RecordSet, Row};
pub use store::{column_widths, ArtifactInfo, ArtifactKey, TabularStore};
