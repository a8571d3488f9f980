//! Convert flow: PDF upload → rows → spreadsheet artifact.
//!
//! ```text
//! Start ─▶ Extracted ─▶ Transformed ─▶ Persisted ─▶ Done
//! ```
//!
//! Nothing is written until extraction has fully succeeded, and the write
//! itself is an atomic replace, so a failed conversion never changes the
//! artifact stored under `key`.

use crate::config::BridgeConfig;
use crate::error::{Pdf2TallyError, Result};
use crate::output::{ConvertOutput, ConvertStats};
use crate::pipeline::{extract, input, run_blocking};
use crate::progress::{Flow, Stage, StageReporter};
use crate::store::{ArtifactKey, TabularStore};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Convert PDF bytes held in memory and persist them under `key`.
///
/// This is the primary entry point for the library; the bytes are usually
/// an upload body.
///
/// # Example
/// ```rust,no_run
/// use pdf2tally::{convert_bytes, ArtifactKey, BridgeConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("statement.pdf")?;
/// let out = convert_bytes(bytes, &ArtifactKey::default(), &BridgeConfig::default()).await?;
/// println!("{} rows → {}", out.rows, out.artifact.path.display());
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// - Extraction errors when the upload is not a readable PDF or carries no text
/// - [`Pdf2TallyError::ArtifactWriteFailed`] / `WorkbookFailed` when persisting fails
pub async fn convert_bytes(
    bytes: Vec<u8>,
    key: &ArtifactKey,
    config: &BridgeConfig,
) -> Result<ConvertOutput> {
    let reporter = StageReporter::new(Flow::Convert, config.observer.as_ref());
    reporter.finish(run_convert(bytes, key, config, &reporter).await)
}

/// Convert a PDF on the local file system and persist it under `key`.
pub async fn convert_file(
    path: impl AsRef<Path>,
    key: &ArtifactKey,
    config: &BridgeConfig,
) -> Result<ConvertOutput> {
    let reporter = StageReporter::new(Flow::Convert, config.observer.as_ref());
    let result = match input::read_pdf_file(path.as_ref()).await {
        Ok(bytes) => run_convert(bytes, key, config, &reporter).await,
        Err(e) => Err(e),
    };
    reporter.finish(result)
}

/// Synchronous wrapper around [`convert_bytes`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    bytes: Vec<u8>,
    key: &ArtifactKey,
    config: &BridgeConfig,
) -> Result<ConvertOutput> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2TallyError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_bytes(bytes, key, config))
}

async fn run_convert(
    bytes: Vec<u8>,
    key: &ArtifactKey,
    config: &BridgeConfig,
    reporter: &StageReporter<'_>,
) -> Result<ConvertOutput> {
    let total_start = Instant::now();
    info!("Starting conversion into artifact '{}'", key);

    // ── Step 1: Validate upload ──────────────────────────────────────────
    input::validate_pdf_bytes(&bytes)?;

    // ── Step 2: Extract rows ─────────────────────────────────────────────
    let extract_start = Instant::now();
    let rows = extract::extract_rows(bytes, &config.extract).await?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    reporter.stage(Stage::Extracted);

    // ── Step 3: Shape ────────────────────────────────────────────────────
    let row_count = rows.len();
    let columns = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    reporter.stage(Stage::Transformed);

    // ── Step 4: Persist (atomic replace) ─────────────────────────────────
    let write_start = Instant::now();
    let store = TabularStore::from_config(config);
    let write_key = key.clone();
    let artifact = run_blocking("artifact write", move || store.write(&write_key, &rows)).await?;
    let write_duration_ms = write_start.elapsed().as_millis() as u64;
    reporter.stage(Stage::Persisted);

    let stats = ConvertStats {
        extract_duration_ms,
        write_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Conversion complete: {} rows × {} columns → {} in {}ms",
        row_count,
        columns,
        artifact.file_name,
        stats.total_duration_ms
    );

    Ok(ConvertOutput {
        artifact,
        rows: row_count,
        columns,
        stats,
    })
}
