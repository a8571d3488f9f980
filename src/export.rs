//! Export flow: artifact → records → ledger XML → accounting endpoint.
//!
//! ```text
//! Start ─▶ Read ─▶ Transformed ─▶ Sent ─▶ Done
//! ```
//!
//! Export only reads the artifact. A failed export leaves it exactly as it
//! was, so the caller may simply run the flow again.

use crate::config::BridgeConfig;
use crate::error::{Pdf2TallyError, Result};
use crate::output::ExportOutput;
use crate::pipeline::tally::build_envelope;
use crate::pipeline::transport::ImportClient;
use crate::pipeline::run_blocking;
use crate::progress::{Flow, Stage, StageReporter};
use crate::record::RecordSet;
use crate::store::{ArtifactInfo, ArtifactKey, TabularStore};
use tracing::info;

/// Read the artifact for `key`, build the import document and POST it.
///
/// # Example
/// ```rust,no_run
/// use pdf2tally::{export, ArtifactKey, BridgeConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = BridgeConfig::builder().endpoint("http://tally.local:9000").build()?;
/// let out = export(&ArtifactKey::default(), &config).await?;
/// println!("{} ledger entries sent: {}", out.records, out.response);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// - [`Pdf2TallyError::ArtifactNotFound`] if no conversion has run for `key`
/// - Import transport errors when the endpoint is unreachable, times out or
///   rejects the document
pub async fn export(key: &ArtifactKey, config: &BridgeConfig) -> Result<ExportOutput> {
    let reporter = StageReporter::new(Flow::Export, config.observer.as_ref());
    reporter.finish(run_export(key, config, &reporter).await)
}

/// Synchronous wrapper around [`export`].
pub fn export_sync(key: &ArtifactKey, config: &BridgeConfig) -> Result<ExportOutput> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2TallyError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(export(key, config))
}

/// Build the import document for `key` without sending it.
pub async fn render_export(key: &ArtifactKey, config: &BridgeConfig) -> Result<String> {
    let records = read_records(key, config).await?;
    build_envelope(&records)
}

/// Locate the artifact for `key` so it can be downloaded.
pub fn retrieve(key: &ArtifactKey, config: &BridgeConfig) -> Result<ArtifactInfo> {
    TabularStore::from_config(config).locate(key)
}

async fn run_export(
    key: &ArtifactKey,
    config: &BridgeConfig,
    reporter: &StageReporter<'_>,
) -> Result<ExportOutput> {
    info!("Starting export of artifact '{}'", key);
    // Build the client first so a bad endpoint fails before any file I/O.
    let client = ImportClient::new(&config.import)?;

    let records = read_records(key, config).await?;
    reporter.stage(Stage::Read);

    let xml = build_envelope(&records)?;
    reporter.stage(Stage::Transformed);

    let response = client.send(&xml).await?;
    reporter.stage(Stage::Sent);

    info!(
        "Exported {} ledger entries to {}",
        records.len(),
        client.endpoint()
    );

    Ok(ExportOutput {
        xml,
        response,
        records: records.len(),
    })
}

async fn read_records(key: &ArtifactKey, config: &BridgeConfig) -> Result<RecordSet> {
    let store = TabularStore::from_config(config);
    let key = key.clone();
    run_blocking("artifact read", move || store.read(&key)).await
}
