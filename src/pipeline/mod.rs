//! Pipeline stages for the Convert and Export flows.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! Convert:  input ──▶ extract ──▶ layout ──▶ store.write
//!           (%PDF)    (pdfium)    (bands)    (xlsx, atomic)
//!
//! Export:   store.read ──▶ tally ──▶ transport
//!           (records)      (XML)     (HTTP POST)
//! ```
//!
//! 1. [`input`]: reject uploads that are not PDFs before pdfium runs
//! 2. [`extract`]: collect positioned text segments; runs in
//!    `spawn_blocking` under a timeout because pdfium is blocking
//! 3. [`layout`]: cluster fragments into rows and cells (pure)
//! 4. [`tally`]: render records into the ledger-import envelope
//! 5. [`transport`]: POST the envelope to the accounting endpoint; the only
//!    stage with network I/O

pub mod extract;
pub mod input;
pub mod layout;
pub mod tally;
pub mod transport;

use crate::error::{Pdf2TallyError, Result};
use std::time::Duration;

/// Run blocking work (file I/O, workbook encoding) off the async workers.
pub(crate) async fn run_blocking<T, F>(label: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Pdf2TallyError::Internal(format!("{label} task panicked: {e}")))?
}

/// Like [`run_blocking`], but give up after `secs` seconds.
///
/// On expiry the caller gets [`Pdf2TallyError::ExtractionTimeout`]; the
/// blocking thread cannot be cancelled and runs to completion on its own.
pub(crate) async fn run_blocking_bounded<T, F>(label: &'static str, secs: u64, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::task::spawn_blocking(f);
    match tokio::time::timeout(Duration::from_secs(secs), task).await {
        Err(_) => Err(Pdf2TallyError::ExtractionTimeout { secs }),
        Ok(joined) => {
            joined.map_err(|e| Pdf2TallyError::Internal(format!("{label} task panicked: {e}")))?
        }
    }
}
