//! Column Mapper: resolve a sheet's header row into logical-name lookups.
//!
//! Columns may appear in any order and any of them may be missing. Callers
//! always ask for a column by logical name and treat `None` as "optional
//! column not set".
//!
//! The tabular-form ecosystem stops reading a sheet after a run of blank
//! rows or blank header columns; [`scan_extent`] reproduces that cut-off and
//! reports anything meaningful found past it.

use crate::error::OpError;
use crate::sheet::{cell_has_value, Sheet, SheetKind};
use serde::Serialize;
use std::collections::BTreeMap;

/// Spelling variants the ecosystem accepts for well-known headers.
const HEADER_ALIASES: &[(&str, &str)] = &[
    ("list name", "list_name"),
    ("constraint message", "constraint_message"),
    ("required message", "required_message"),
    ("choice filter", "choice_filter"),
    ("repeat count", "repeat_count"),
];

/// Lower-cased, alias-resolved form used for tolerant lookups.
fn normalize_header(header: &str) -> String {
    let lower = header.trim().to_lowercase();
    HEADER_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(lower)
}

/// The logical column `key` stands for: the entry of `known` it resolves to
/// under the tolerant header rules, or `key` itself.
pub fn canonical_column(key: &str, known: &[&str]) -> String {
    let normalized = normalize_header(key);
    known
        .iter()
        .find(|k| **k == normalized)
        .map(|k| k.to_string())
        .unwrap_or_else(|| key.trim().to_string())
}

/// The part of a sheet the ecosystem actually reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extent {
    /// Last non-blank row number before the blank-row cut-off (1 when the
    /// sheet has no data rows).
    pub last_row: usize,
    /// Number of header columns read before the blank-column cut-off.
    pub width: usize,
    /// Non-blank rows found past the blank-row cut-off.
    pub stray_rows: Vec<usize>,
    /// 1-based columns past the blank-column cut-off that hold data.
    pub stray_columns: Vec<usize>,
}

impl Extent {
    pub fn has_stray_data(&self) -> bool {
        !self.stray_rows.is_empty() || !self.stray_columns.is_empty()
    }

    pub fn data_row_numbers(&self) -> std::ops::RangeInclusive<usize> {
        2..=self.last_row
    }
}

/// Measure how far the ecosystem would read `sheet`.
pub fn scan_extent(sheet: &Sheet, blank_threshold: usize) -> Extent {
    let threshold = blank_threshold.max(1);

    // Columns: stop after `threshold` consecutive blank header cells.
    let header = sheet.header();
    let mut width = 0usize;
    let mut blank_run = 0usize;
    let mut cut_col: Option<usize> = None;
    for (i, cell) in header.iter().enumerate() {
        if cell_has_value(cell) {
            width = i + 1;
            blank_run = 0;
        } else {
            blank_run += 1;
            if blank_run >= threshold {
                cut_col = Some(i + 1);
                break;
            }
        }
    }

    let mut stray_columns: Vec<usize> = Vec::new();
    if let Some(cut) = cut_col {
        let mut cols = std::collections::BTreeSet::new();
        for row in sheet.rows() {
            for (i, cell) in row.iter().enumerate().skip(cut) {
                if cell_has_value(cell) {
                    cols.insert(i + 1);
                }
            }
        }
        stray_columns = cols.into_iter().collect();
    }

    // Rows: stop after `threshold` consecutive blank rows.
    let mut last_row = 1usize;
    let mut blank_run = 0usize;
    let mut stray_rows = Vec::new();
    let mut cut = false;
    for (row_number, _) in sheet.data_rows() {
        let blank = sheet.is_blank_row(row_number);
        if cut {
            if !blank {
                stray_rows.push(row_number);
            }
            continue;
        }
        if blank {
            blank_run += 1;
            if blank_run >= threshold {
                cut = true;
            }
        } else {
            blank_run = 0;
            last_row = row_number;
        }
    }

    if !stray_rows.is_empty() || !stray_columns.is_empty() {
        log::warn!(
            "data past the blank boundary ignored: {} row(s), {} column(s)",
            stray_rows.len(),
            stray_columns.len()
        );
    }

    Extent {
        last_row,
        width,
        stray_rows,
        stray_columns,
    }
}

/// Header-derived lookup from logical column name to zero-based column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    sheet: SheetKind,
    /// Trimmed header text -> column.
    exact: BTreeMap<String, usize>,
    /// Normalized header text -> columns (several when headers differ only by case).
    normalized: BTreeMap<String, Vec<usize>>,
    width: usize,
}

impl ColumnMap {
    /// Read row 1 of `sheet`, up to the blank-column cut-off.
    ///
    /// Fails if two header cells hold the same exact (trimmed,
    /// case-sensitive) string.
    pub fn build(sheet: &Sheet, kind: SheetKind, blank_threshold: usize) -> Result<Self, OpError> {
        let extent = scan_extent(sheet, blank_threshold);
        Self::from_header(sheet.header(), kind, extent.width)
    }

    pub(crate) fn from_header(header: &[String], kind: SheetKind, width: usize) -> Result<Self, OpError> {
        let mut exact: BTreeMap<String, usize> = BTreeMap::new();
        let mut seen: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut normalized: BTreeMap<String, Vec<usize>> = BTreeMap::new();

        for (col, cell) in header.iter().enumerate().take(width) {
            let text = cell.trim();
            if text.is_empty() {
                continue;
            }
            seen.entry(text.to_string()).or_default().push(col);
            exact.entry(text.to_string()).or_insert(col);
            normalized.entry(normalize_header(text)).or_default().push(col);
        }

        if let Some((header, cols)) = seen.into_iter().find(|(_, cols)| cols.len() > 1) {
            return Err(OpError::DuplicateHeader {
                sheet: kind,
                header,
                columns: cols.iter().map(|c| c + 1).collect(),
            });
        }

        log::debug!("{} sheet: mapped {} column(s)", kind, exact.len());

        Ok(ColumnMap {
            sheet: kind,
            exact,
            normalized,
            width,
        })
    }

    pub fn sheet(&self) -> SheetKind {
        self.sheet
    }

    /// Column for a logical name. Exact header text wins; otherwise a
    /// case- and alias-insensitive match is used when it is unambiguous.
    pub fn get(&self, logical: &str) -> Option<usize> {
        if let Some(col) = self.exact.get(logical) {
            return Some(*col);
        }
        match self.normalized.get(&normalize_header(logical)) {
            Some(cols) if cols.len() == 1 => Some(cols[0]),
            _ => None,
        }
    }

    pub fn contains(&self, logical: &str) -> bool {
        self.get(logical).is_some()
    }

    /// Headers in column order.
    pub fn headers(&self) -> Vec<(&str, usize)> {
        let mut out: Vec<(&str, usize)> = self.exact.iter().map(|(h, c)| (h.as_str(), *c)).collect();
        out.sort_by_key(|(_, c)| *c);
        out
    }

    /// Translated variants of `base`, e.g. `label::French (fr)` for `label`.
    pub fn translations(&self, base: &str) -> Vec<(&str, usize)> {
        let prefix = format!("{}::", base);
        self.headers()
            .into_iter()
            .filter(|(h, _)| h.len() > prefix.len() && h.to_lowercase().starts_with(&prefix))
            .collect()
    }

    /// Number of header columns read.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Column a new header would be appended at.
    pub(crate) fn next_column(&self) -> usize {
        self.exact.values().max().map(|c| c + 1).unwrap_or(0)
    }

    /// Register a header that a mutation appended to row 1.
    pub(crate) fn push_header(&mut self, header: &str, col: usize) {
        self.exact.insert(header.to_string(), col);
        self.normalized
            .entry(normalize_header(header))
            .or_default()
            .push(col);
        self.width = self.width.max(col + 1);
    }
}
