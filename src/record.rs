//! Record reconstruction: header row + data rows → ordered field/value pairs.
//!
//! A [`Record`] is an explicit ordered list of `(field_name, value)` pairs,
//! never a map, so the field order of the header row is exactly the order in
//! which ledger children are later emitted.
//!
//! Header names are resolved the way common sheet-to-object converters do it:
//! an empty header cell becomes `__EMPTY` (then `__EMPTY_1`, `__EMPTY_2`, …)
//! and a repeated name gets `_1`, `_2`, … on its later occurrences. Data cells
//! to the right of the header are named the same way as empty header cells,
//! so no value is dropped. Rows whose cells are all empty are skipped.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One row of cell strings as produced by extraction.
pub type Row = Vec<String>;

/// Placeholder used for header cells with no text.
pub const EMPTY_HEADER: &str = "__EMPTY";

/// An ordered list of `(field_name, value)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Value of the first field called `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_fields(self) -> Vec<(String, String)> {
        self.fields
    }
}

/// A finite, restartable sequence of [`Record`]s.
///
/// The set keeps the raw data rows and builds each `Record` only when the
/// iterator reaches it. [`RecordSet::iter`] can be called any number of
/// times and always yields the same sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSet {
    header: Vec<String>,
    names: Vec<String>,
    rows: Vec<Row>,
}

impl RecordSet {
    /// Treat the first row as header and the rest as data.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut rows = rows.into_iter();
        let header = rows.next().unwrap_or_default();
        let rows: Vec<Row> = rows.collect();

        let width = rows
            .iter()
            .map(|r| r.len())
            .chain(std::iter::once(header.len()))
            .max()
            .unwrap_or(0);
        let names = resolve_header(&header, width);

        Self {
            header: names[..header.len()].to_vec(),
            names,
            rows,
        }
    }

    /// Resolved field names of the header row, in column order.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Number of records the sequence yields (blank rows excluded).
    pub fn len(&self) -> usize {
        self.rows.iter().filter(|r| !is_blank(r)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> Records<'_> {
        Records { set: self, next: 0 }
    }

    fn build(&self, row: &Row) -> Record {
        let width = self.header.len().max(row.len());
        let fields = self.names[..width]
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), row.get(i).cloned().unwrap_or_default()))
            .collect();
        Record::new(fields)
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = Record;
    type IntoIter = Records<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over a [`RecordSet`].
pub struct Records<'a> {
    set: &'a RecordSet,
    next: usize,
}

impl Iterator for Records<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        while let Some(row) = self.set.rows.get(self.next) {
            self.next += 1;
            if !is_blank(row) {
                return Some(self.set.build(row));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.set.rows.len().saturating_sub(self.next)))
    }
}

fn is_blank(row: &Row) -> bool {
    row.iter().all(|c| c.is_empty())
}

/// Resolve `width` unique field names from a raw header row.
///
/// Columns past the end of `raw` are treated as empty header cells.
pub fn resolve_header(raw: &[String], width: usize) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::with_capacity(width);
    let mut counters: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::with_capacity(width);

    for i in 0..width {
        let base = match raw.get(i).map(|s| s.trim()) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => EMPTY_HEADER.to_string(),
        };

        let name = if used.contains(&base) {
            let counter = counters.entry(base.clone()).or_insert(0);
            loop {
                *counter += 1;
                let candidate = format!("{base}_{counter}");
                if !used.contains(&candidate) {
                    break candidate;
                }
            }
        } else {
            base
        };

        used.insert(name.clone());
        names.push(name);
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn header_consumed_and_order_preserved() {
        let set = RecordSet::from_rows(vec![
            row(&["Name", "Amount"]),
            row(&["Widget", "100"]),
            row(&["Gadget", "250"]),
        ]);
        assert_eq!(set.header(), &["Name".to_string(), "Amount".to_string()]);

        let records: Vec<Record> = set.iter().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].fields(),
            &[
                ("Name".to_string(), "Widget".to_string()),
                ("Amount".to_string(), "100".to_string())
            ]
        );
        assert_eq!(records[1].get("Amount"), Some("250"));
    }

    #[test]
    fn missing_trailing_cells_become_empty() {
        let set = RecordSet::from_rows(vec![row(&["A", "B", "C"]), row(&["1"])]);
        let r = set.iter().next().unwrap();
        assert_eq!(r.len(), 3);
        assert_eq!(r.get("B"), Some(""));
        assert_eq!(r.get("C"), Some(""));
    }

    #[test]
    fn extra_cells_get_generated_names() {
        let set = RecordSet::from_rows(vec![row(&["A"]), row(&["1", "2", "3"])]);
        let names: Vec<String> = set
            .iter()
            .next()
            .unwrap()
            .names()
            .map(String::from)
            .collect();
        assert_eq!(names, vec!["A", "__EMPTY", "__EMPTY_1"]);
    }

    #[test]
    fn duplicate_and_empty_headers_disambiguated() {
        let names = resolve_header(&row(&["Name", "", "Name", "", "Name_1"]), 5);
        assert_eq!(names, vec!["Name", "__EMPTY", "Name_1", "__EMPTY_1", "Name_1_1"]);
    }

    #[test]
    fn blank_rows_skipped() {
        let set = RecordSet::from_rows(vec![
            row(&["A", "B"]),
            row(&["", ""]),
            row(&["x", "y"]),
            row(&[]),
        ]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().count(), 1);
    }

    #[test]
    fn iteration_is_restartable() {
        let set = RecordSet::from_rows(vec![row(&["K"]), row(&["1"]), row(&["2"])]);
        let first: Vec<Record> = set.iter().collect();
        let second: Vec<Record> = (&set).into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn empty_input_yields_nothing() {
        let set = RecordSet::from_rows(Vec::new());
        assert!(set.header().is_empty());
        assert!(set.is_empty());
        assert_eq!(set.iter().next(), None);
    }
}
