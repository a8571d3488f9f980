//! Tabular store: one single-sheet `.xlsx` artifact per [`ArtifactKey`].
//!
//! ## Atomic replace
//!
//! `write` builds the whole workbook in memory, writes it to a temporary file
//! in the artifact directory and renames it over the target. The rename is
//! atomic on the same file system, so a reader sees either the previous
//! artifact or the complete new one, never a torn file. If anything fails
//! before the rename, the temporary file is removed when it drops and the
//! previous artifact is left as it was.
//!
//! ## Concurrency
//!
//! There is no locking. Two conversions under the same key race and the last
//! rename wins; conversions under different keys never touch each other.

use crate::error::{Pdf2TallyError, Result};
use crate::record::{Row, RecordSet};
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_xlsxwriter::{Workbook, XlsxError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Key used when the caller does not name a slot.
pub const DEFAULT_ARTIFACT_KEY: &str = "output";

/// Artifact file extension.
pub const ARTIFACT_EXTENSION: &str = "xlsx";

/// Narrowest presentation width a column is given.
pub const MIN_COLUMN_WIDTH: usize = 10;

/// Padding added to the widest cell of a column.
pub const COLUMN_PADDING: usize = 2;

static RE_ARTIFACT_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap());

/// OOXML escape for characters a shared string cannot hold literally.
static RE_OOXML_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_x([0-9A-Fa-f]{4})_").unwrap());

/// Identity of one artifact slot.
///
/// Threads through Convert, Export and Retrieve so concurrent callers with
/// different keys never overwrite each other's artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactKey(String);

impl ArtifactKey {
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if RE_ARTIFACT_KEY.is_match(&key) {
            Ok(Self(key))
        } else {
            Err(Pdf2TallyError::InvalidArtifactKey(key))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the artifact, e.g. `output.xlsx`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.0, ARTIFACT_EXTENSION)
    }
}

impl Default for ArtifactKey {
    fn default() -> Self {
        Self(DEFAULT_ARTIFACT_KEY.to_string())
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ArtifactKey {
    type Err = Pdf2TallyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ArtifactKey {
    type Error = Pdf2TallyError;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<ArtifactKey> for String {
    fn from(key: ArtifactKey) -> Self {
        key.0
    }
}

/// Where an artifact lives and how big it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub key: ArtifactKey,
    pub file_name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Persists rows as `.xlsx` artifacts under one directory.
#[derive(Debug, Clone)]
pub struct TabularStore {
    dir: PathBuf,
    sheet_name: String,
}

impl TabularStore {
    pub fn new(dir: impl Into<PathBuf>, sheet_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            sheet_name: sheet_name.into(),
        }
    }

    pub fn from_config(config: &crate::BridgeConfig) -> Self {
        Self::new(&config.artifact_dir, &config.sheet_name)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the artifact for `key` lives at, whether or not it exists.
    pub fn artifact_path(&self, key: &ArtifactKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Path and size of an existing artifact.
    pub fn locate(&self, key: &ArtifactKey) -> Result<ArtifactInfo> {
        let path = self.artifact_path(key);
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(ArtifactInfo {
                key: key.clone(),
                file_name: key.file_name(),
                path,
                size_bytes: meta.len(),
            }),
            _ => Err(Pdf2TallyError::ArtifactNotFound {
                key: key.to_string(),
                path,
            }),
        }
    }

    /// Replace the artifact for `key` with `rows`, atomically.
    pub fn write(&self, key: &ArtifactKey, rows: &[Row]) -> Result<ArtifactInfo> {
        let path = self.artifact_path(key);
        let buffer = self.build_workbook(rows)?;

        let io_err = |source: std::io::Error| Pdf2TallyError::ArtifactWriteFailed {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(io_err)?;
        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{}-", key.as_str()))
            .suffix(".xlsx.tmp")
            .tempfile_in(&self.dir)
            .map_err(io_err)?;
        tmp.write_all(&buffer).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;

        info!(
            "Wrote artifact {} ({} rows, {} bytes)",
            path.display(),
            rows.len(),
            buffer.len()
        );

        Ok(ArtifactInfo {
            key: key.clone(),
            file_name: key.file_name(),
            path,
            size_bytes: buffer.len() as u64,
        })
    }

    /// Read the artifact for `key` back as records (first row = header).
    pub fn read(&self, key: &ArtifactKey) -> Result<RecordSet> {
        let info = self.locate(key)?;
        let rows = read_first_sheet(&info.path)?;
        debug!("Read {} rows from {}", rows.len(), info.path.display());
        Ok(RecordSet::from_rows(rows))
    }

    fn build_workbook(&self, rows: &[Row]) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(&self.sheet_name).map_err(workbook_err)?;

        for (r, row) in rows.iter().enumerate() {
            let r = u32::try_from(r)
                .map_err(|_| Pdf2TallyError::WorkbookFailed(format!("row {r} out of range")))?;
            for (c, cell) in row.iter().enumerate() {
                if cell.is_empty() {
                    continue;
                }
                sheet
                    .write_string(r, column_index(c)?, cell)
                    .map_err(workbook_err)?;
            }
        }

        for (c, width) in column_widths(rows).into_iter().enumerate() {
            sheet
                .set_column_width(column_index(c)?, width as f64)
                .map_err(workbook_err)?;
        }

        workbook.save_to_buffer().map_err(workbook_err)
    }
}

/// Presentation width per column: `max(10, longest cell) + 2`.
///
/// Length is counted in characters, not bytes.
pub fn column_widths(rows: &[Row]) -> Vec<usize> {
    let columns = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    let mut widths = vec![MIN_COLUMN_WIDTH; columns];
    for row in rows {
        for (c, cell) in row.iter().enumerate() {
            widths[c] = widths[c].max(cell.chars().count());
        }
    }
    widths.into_iter().map(|w| w + COLUMN_PADDING).collect()
}

fn column_index(c: usize) -> Result<u16> {
    u16::try_from(c).map_err(|_| Pdf2TallyError::WorkbookFailed(format!("column {c} out of range")))
}

fn workbook_err(e: XlsxError) -> Pdf2TallyError {
    Pdf2TallyError::WorkbookFailed(e.to_string())
}

/// Load the first worksheet as a grid of display strings anchored at A1.
fn read_first_sheet(path: &Path) -> Result<Vec<Row>> {
    let corrupt = |detail: String| Pdf2TallyError::ArtifactCorrupt {
        path: path.to_path_buf(),
        detail,
    };

    let mut workbook =
        open_workbook::<Xlsx<_>, _>(path).map_err(|e| corrupt(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| corrupt("workbook has no worksheet".into()))?
        .map_err(|e| corrupt(e.to_string()))?;

    Ok(grid_from_range(&range))
}

/// Calamine ranges start at the first non-empty cell; re-anchor at A1 and
/// drop trailing empty cells so short rows stay short.
fn grid_from_range(range: &Range<Data>) -> Vec<Row> {
    let Some((row0, col0)) = range.start() else {
        return Vec::new();
    };

    let mut grid: Vec<Row> = vec![Vec::new(); row0 as usize];
    for row in range.rows() {
        let mut cells: Row = vec![String::new(); col0 as usize];
        cells.extend(row.iter().map(display_string));
        while cells.last().is_some_and(|c| c.is_empty()) {
            cells.pop();
        }
        grid.push(cells);
    }
    grid
}

/// Display string of a cell value.
pub fn display_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => decode_ooxml_escapes(s),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{:.0}", f)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#ERR:{:?}", e),
    }
}

/// Undo the `_xHHHH_` escapes the writer applies to control characters and
/// to literal `_xHHHH_` text (written as `_x005F_xHHHH_`).
fn decode_ooxml_escapes(s: &str) -> String {
    if !s.contains("_x") {
        return s.to_string();
    }
    RE_OOXML_ESCAPE
        .replace_all(s, |caps: &regex::Captures<'_>| {
            u32::from_str_radix(&caps[1], 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
