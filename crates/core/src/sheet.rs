//! Raw workbook model: a [`Document`] owning up to three [`Sheet`]s of
//! string cells.
//!
//! Cells are never coerced. A numeric-looking value stays the string the
//! reader produced. Row numbers used throughout the crate are spreadsheet
//! row numbers: the header is row 1 and the first data row is row 2.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The three sheets an XLSForm workbook may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetKind {
    Survey,
    Choices,
    Settings,
}

impl SheetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SheetKind::Survey => "survey",
            SheetKind::Choices => "choices",
            SheetKind::Settings => "settings",
        }
    }
}

impl fmt::Display for SheetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True if the cell holds something other than whitespace.
pub fn cell_has_value(value: &str) -> bool {
    !value.trim().is_empty()
}

/// An ordered sequence of rows. `rows[0]` is the header row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sheet {
    rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Sheet { rows }
    }

    /// Build a sheet from string slices; convenient for fixtures and payloads.
    pub fn from_strs(rows: &[&[&str]]) -> Self {
        Sheet {
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<String>> {
        self.rows
    }

    pub fn header(&self) -> &[String] {
        self.rows.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of rows including the header.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cells of a row by spreadsheet row number; empty for rows past the end.
    pub fn row(&self, row_number: usize) -> &[String] {
        row_number
            .checked_sub(1)
            .and_then(|i| self.rows.get(i))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Cell at (row number, zero-based column). Missing cells read as "".
    pub fn cell(&self, row_number: usize, col: usize) -> &str {
        self.row(row_number).get(col).map(String::as_str).unwrap_or("")
    }

    /// Columns up to the rightmost cell holding a value in any row.
    pub fn used_width(&self) -> usize {
        self.rows
            .iter()
            .filter_map(|r| r.iter().rposition(|c| cell_has_value(c)))
            .map(|i| i + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn is_blank_row(&self, row_number: usize) -> bool {
        self.row(row_number).iter().all(|c| !cell_has_value(c))
    }

    /// Data rows (row 2 onward) paired with their row number.
    pub fn data_rows(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.rows
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, r)| (i + 1, r.as_slice()))
    }

    /// Write a cell, growing the sheet as needed.
    pub fn set_cell(&mut self, row_number: usize, col: usize, value: impl Into<String>) {
        debug_assert!(row_number >= 1, "row numbers start at 1");
        let idx = row_number.saturating_sub(1);
        if self.rows.len() <= idx {
            self.rows.resize_with(idx + 1, Vec::new);
        }
        let row = &mut self.rows[idx];
        if row.len() <= col {
            row.resize(col + 1, String::new());
        }
        row[col] = value.into();
    }

    /// Insert rows so that the first inserted row gets `row_number`.
    pub fn insert_rows(&mut self, row_number: usize, rows: Vec<Vec<String>>) {
        let idx = row_number.saturating_sub(1);
        if self.rows.len() < idx {
            self.rows.resize_with(idx, Vec::new);
        }
        self.rows.splice(idx..idx, rows);
    }

    /// Remove the inclusive range of row numbers and return the removed rows.
    pub fn remove_rows(&mut self, first: usize, last: usize) -> Vec<Vec<String>> {
        let start = first.saturating_sub(1).min(self.rows.len());
        let end = last.min(self.rows.len());
        if start >= end {
            return Vec::new();
        }
        self.rows.drain(start..end).collect()
    }

    /// Rows with whitespace-only cells blanked and trailing blanks dropped.
    /// Two sheets with equal normalized rows hold the same content.
    fn normalized(&self) -> Vec<Vec<&str>> {
        let mut rows: Vec<Vec<&str>> = self
            .rows
            .iter()
            .map(|r| {
                let mut cells: Vec<&str> = r
                    .iter()
                    .map(|c| if cell_has_value(c) { c.as_str() } else { "" })
                    .collect();
                while cells.last() == Some(&"") {
                    cells.pop();
                }
                cells
            })
            .collect();
        while rows.last().is_some_and(|r| r.is_empty()) {
            rows.pop();
        }
        rows
    }
}

impl PartialEq for Sheet {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for Sheet {}

/// One workbook snapshot.
///
/// Mutations never edit a `Document` in place; they return a new snapshot
/// with the dirty flag set. The flag is cleared by whoever persists it.
///
/// Sheets other than the three form sheets (`entities`, lookup tables,
/// notes) ride along in `other_sheets` so that saving never drops them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub survey: Sheet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Sheet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Sheet>,
    /// Sheet name -> content, for every sheet no operation reads.
    #[serde(flatten)]
    pub other_sheets: BTreeMap<String, Sheet>,
    #[serde(skip)]
    dirty: bool,
}

impl Document {
    pub fn new(survey: Sheet, choices: Option<Sheet>, settings: Option<Sheet>) -> Self {
        Document {
            survey,
            choices,
            settings,
            other_sheets: BTreeMap::new(),
            dirty: false,
        }
    }

    pub fn sheet(&self, kind: SheetKind) -> Option<&Sheet> {
        match kind {
            SheetKind::Survey => Some(&self.survey),
            SheetKind::Choices => self.choices.as_ref(),
            SheetKind::Settings => self.settings.as_ref(),
        }
    }

    /// True once a mutation produced this snapshot and it has not been persisted.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_persisted(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn touched(mut self) -> Self {
        self.dirty = true;
        self
    }
}

/// Content equality; the dirty flag is bookkeeping and does not participate.
impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.survey == other.survey
            && self.choices == other.choices
            && self.settings == other.settings
            && self.other_sheets == other.other_sheets
    }
}

impl Eq for Document {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sheets_survive_a_snapshot_round_trip() {
        let json = r#"{"survey": [["type", "name"]], "entities": [["list_name", "label"], ["hh", "${name}"]]}"#;
        let doc: Document = serde_json::from_str(json).unwrap();
        assert_eq!(doc.other_sheets["entities"].cell(2, 0), "hh");
        assert!(doc.choices.is_none());

        let again: Document = serde_json::from_str(&serde_json::to_string(&doc).unwrap()).unwrap();
        assert_eq!(again, doc);
    }

    #[test]
    fn cell_lookup_past_end_is_empty() {
        let sheet = Sheet::from_strs(&[&["type", "name"], &["text"]]);
        assert_eq!(sheet.cell(2, 0), "text");
        assert_eq!(sheet.cell(2, 1), "");
        assert_eq!(sheet.cell(9, 0), "");
        assert_eq!(sheet.cell(0, 0), "");
    }

    #[test]
    fn set_cell_grows_rows_and_columns() {
        let mut sheet = Sheet::from_strs(&[&["type"]]);
        sheet.set_cell(3, 2, "x");
        assert_eq!(sheet.row_count(), 3);
        assert_eq!(sheet.row(3), ["", "", "x"]);
        assert!(sheet.is_blank_row(2));
    }

    #[test]
    fn insert_and_remove_rows_by_row_number() {
        let mut sheet = Sheet::from_strs(&[&["h"], &["a"], &["c"]]);
        sheet.insert_rows(3, vec![vec!["b".to_string()]]);
        assert_eq!(sheet.cell(3, 0), "b");
        assert_eq!(sheet.cell(4, 0), "c");

        let removed = sheet.remove_rows(2, 3);
        assert_eq!(removed.len(), 2);
        assert_eq!(sheet.cell(2, 0), "c");
    }

    #[test]
    fn equality_ignores_trailing_blanks_and_whitespace_cells() {
        let a = Sheet::from_strs(&[&["type", "name", ""], &["text", "q", " "]]);
        let b = Sheet::from_strs(&[&["type", "name"], &["text", "q"], &[""]]);
        assert_eq!(a, b);
    }

    #[test]
    fn document_equality_ignores_dirty_flag() {
        let doc = Document::new(Sheet::from_strs(&[&["type"]]), None, None);
        let touched = doc.clone().touched();
        assert!(touched.is_dirty());
        assert!(!doc.is_dirty());
        assert_eq!(doc, touched);
    }

    #[test]
    fn document_json_round_trip_keeps_raw_strings() {
        let doc = Document::new(
            Sheet::from_strs(&[&["type", "name", "default"], &["integer", "n", "007"]]),
            None,
            None,
        );
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("\"007\""));
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back.survey.cell(2, 2), "007");
        assert!(back.choices.is_none());
    }
}
