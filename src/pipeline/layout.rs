//! Row clustering: positioned text fragments → ordered rows of cells.
//!
//! Fragments whose vertical centres fall within `row_tolerance` of a band's
//! first fragment belong to that band. Bands are emitted top-to-bottom per
//! page, pages in document order, and each band's fragments become cells
//! left-to-right. PDF user space has its origin at the bottom-left, so "top"
//! means a larger y.

use crate::config::ExtractConfig;
use crate::record::Row;
use std::cmp::Ordering;

/// A run of text with its bounding box in PDF points.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    /// 0-based page index.
    pub page: usize,
    pub text: String,
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl TextFragment {
    fn center_y(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }
}

/// Tuning knobs for [`cluster_rows`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutOptions {
    pub row_tolerance: f32,
    pub merge_gap: f32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self::from(&ExtractConfig::default())
    }
}

impl From<&ExtractConfig> for LayoutOptions {
    fn from(c: &ExtractConfig) -> Self {
        Self {
            row_tolerance: c.row_tolerance,
            merge_gap: c.merge_gap,
        }
    }
}

/// Group fragments into rows of cells.
pub fn cluster_rows(fragments: Vec<TextFragment>, opts: &LayoutOptions) -> Vec<Row> {
    let mut fragments: Vec<TextFragment> = fragments
        .into_iter()
        .filter(|f| !f.text.trim().is_empty())
        .collect();

    fragments.sort_by(|a, b| {
        a.page
            .cmp(&b.page)
            .then_with(|| cmp_f32(b.center_y(), a.center_y()))
            .then_with(|| cmp_f32(a.left, b.left))
    });

    let mut rows = Vec::new();
    let mut band: Vec<TextFragment> = Vec::new();
    let mut anchor: Option<(usize, f32)> = None;

    for fragment in fragments {
        let same_band = matches!(
            anchor,
            Some((page, y)) if page == fragment.page
                && (y - fragment.center_y()).abs() <= opts.row_tolerance
        );
        if !same_band {
            if !band.is_empty() {
                rows.push(band_to_row(std::mem::take(&mut band), opts.merge_gap));
            }
            anchor = Some((fragment.page, fragment.center_y()));
        }
        band.push(fragment);
    }
    if !band.is_empty() {
        rows.push(band_to_row(band, opts.merge_gap));
    }

    rows
}

/// Order a band left-to-right and join fragments closer than `merge_gap`.
fn band_to_row(mut band: Vec<TextFragment>, merge_gap: f32) -> Row {
    band.sort_by(|a, b| cmp_f32(a.left, b.left));

    let mut cells: Row = Vec::with_capacity(band.len());
    let mut last_right: Option<f32> = None;

    for fragment in band {
        let text = fragment.text.trim();
        match (last_right, cells.last_mut()) {
            (Some(right), Some(cell)) if merge_gap > 0.0 && fragment.left - right < merge_gap => {
                cell.push(' ');
                cell.push_str(text);
            }
            _ => cells.push(text.to_string()),
        }
        last_right = Some(match last_right {
            Some(r) => r.max(fragment.right),
            None => fragment.right,
        });
    }

    cells
}

fn cmp_f32(a: f32, b: f32) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}
