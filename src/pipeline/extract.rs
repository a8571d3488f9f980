//! Table extraction: PDF bytes → positioned text fragments → rows.
//!
//! pdfium wraps a C++ library with thread-local state, so the document is
//! opened and walked inside `spawn_blocking`. The whole blocking section is
//! bounded by `ExtractConfig::timeout_secs`; when it expires the caller gets
//! [`Pdf2TallyError::ExtractionTimeout`] and the blocking thread is left to
//! finish on its own (pdfium offers no cancellation).

use crate::config::ExtractConfig;
use crate::error::{Pdf2TallyError, Result};
use crate::pipeline::layout::{cluster_rows, LayoutOptions, TextFragment};
use crate::pipeline::run_blocking_bounded;
use crate::record::Row;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Extract ordered rows of cells from a PDF held in memory.
pub async fn extract_rows(bytes: Vec<u8>, config: &ExtractConfig) -> Result<Vec<Row>> {
    let cfg = config.clone();
    let secs = config.timeout_secs;

    let (pages, fragments) = run_blocking_bounded("Extraction", secs, move || {
        extract_fragments_blocking(&bytes, &cfg)
    })
    .await?;

    let rows = cluster_rows(fragments, &LayoutOptions::from(config));
    if rows.is_empty() {
        return Err(Pdf2TallyError::NoExtractableText { pages });
    }

    info!("Extracted {} rows from {} page(s)", rows.len(), pages);
    Ok(rows)
}

/// Bind pdfium: explicit directory, then `PDFIUM_LIB_PATH`, then the working
/// directory, then the system library.
pub fn bind_pdfium(lib_dir: Option<&Path>) -> Result<Pdfium> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(dir) = lib_dir {
        candidates.push(dir.to_path_buf());
    }
    if let Ok(dir) = std::env::var("PDFIUM_LIB_PATH") {
        if !dir.is_empty() {
            candidates.push(PathBuf::from(dir));
        }
    }
    candidates.push(PathBuf::from("./"));

    for dir in &candidates {
        // PDFIUM_LIB_PATH may name the library file itself rather than its directory.
        let lib = if dir.is_file() {
            dir.clone()
        } else {
            Pdfium::pdfium_platform_library_name_at_path(dir)
        };
        if let Ok(bindings) = Pdfium::bind_to_library(&lib) {
            debug!("Bound pdfium from {}", lib.display());
            return Ok(Pdfium::new(bindings));
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| Pdf2TallyError::PdfiumBindingFailed(format!("{:?}", e)))
}

/// Open the document and collect every non-blank text segment.
///
/// Returns the page count alongside the fragments.
fn extract_fragments_blocking(
    bytes: &[u8],
    config: &ExtractConfig,
) -> Result<(usize, Vec<TextFragment>)> {
    let pdfium = bind_pdfium(config.pdfium_lib_path.as_deref())?;
    let password = config.password.as_deref();

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| classify_load_error(e, password.is_some()))?;

    let pages = document.pages();
    let page_count = pages.len() as usize;
    debug!("PDF loaded: {} pages", page_count);

    let mut fragments = Vec::new();
    for (page_index, page) in pages.iter().enumerate() {
        let text = page.text().map_err(|e| Pdf2TallyError::CorruptPdf {
            detail: format!("page {}: {:?}", page_index + 1, e),
        })?;

        let before = fragments.len();
        for segment in text.segments().iter() {
            let content = segment.text();
            if content.trim().is_empty() {
                continue;
            }
            let bounds = segment.bounds();
            fragments.push(TextFragment {
                page: page_index,
                text: content,
                left: bounds.left().value,
                right: bounds.right().value,
                top: bounds.top().value,
                bottom: bounds.bottom().value,
            });
        }
        debug!(
            "Page {}: {} text fragments",
            page_index + 1,
            fragments.len() - before
        );
    }

    Ok((page_count, fragments))
}

fn classify_load_error(e: PdfiumError, had_password: bool) -> Pdf2TallyError {
    let detail = format!("{:?}", e);
    if detail.contains("Password") || detail.contains("password") {
        if had_password {
            Pdf2TallyError::WrongPassword
        } else {
            Pdf2TallyError::PasswordRequired
        }
    } else {
        Pdf2TallyError::CorruptPdf { detail }
    }
}
