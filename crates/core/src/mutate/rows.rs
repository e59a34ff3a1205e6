//! Record-to-cells writer over one sheet.

use crate::columns::{scan_extent, ColumnMap};
use crate::config::EngineConfig;
use crate::error::OpError;
use crate::records::{ChoiceRecord, SurveyRecord};
use crate::sheet::{Sheet, SheetKind};

pub(crate) struct SheetWriter {
    sheet: Sheet,
    columns: ColumnMap,
}

impl SheetWriter {
    pub(crate) fn new(sheet: Sheet, kind: SheetKind, config: &EngineConfig) -> Result<Self, OpError> {
        let extent = scan_extent(&sheet, config.blank_threshold);
        let columns = ColumnMap::from_header(sheet.header(), kind, extent.width)?;
        Ok(SheetWriter { sheet, columns })
    }

    /// Column index for `column`, appending a header when the sheet lacks it.
    ///
    /// A new header goes past every column that holds data, including
    /// columns whose header cell is blank.
    pub(crate) fn column_for(&mut self, column: &str) -> usize {
        if let Some(col) = self.columns.get(column) {
            return col;
        }
        let col = self.columns.next_column().max(self.sheet.used_width());
        self.sheet.set_cell(1, col, column);
        self.columns.push_header(column, col);
        log::debug!("{} sheet: added column '{}' at {}", self.columns.sheet(), column, col + 1);
        col
    }

    fn row_from(&mut self, cells: Vec<(&str, &str)>) -> Vec<String> {
        let mut row: Vec<String> = Vec::new();
        for (column, value) in cells {
            let col = self.column_for(column);
            if row.len() <= col {
                row.resize(col + 1, String::new());
            }
            row[col] = value.to_string();
        }
        row
    }

    pub(crate) fn survey_row(&mut self, record: &SurveyRecord) -> Vec<String> {
        self.row_from(record.cells())
    }

    pub(crate) fn choice_row(&mut self, record: &ChoiceRecord) -> Vec<String> {
        self.row_from(record.cells())
    }

    /// Write one cell if its value differs. Returns whether it changed.
    pub(crate) fn write_cell(&mut self, row: usize, column: &str, value: &str) -> bool {
        let current = self.columns.get(column).map(|col| self.sheet.cell(row, col));
        if current.is_none() && value.trim().is_empty() {
            return false;
        }
        if current == Some(value) {
            return false;
        }
        let col = self.column_for(column);
        self.sheet.set_cell(row, col, value);
        true
    }

    pub(crate) fn insert_rows(&mut self, at: usize, rows: Vec<Vec<String>>) {
        self.sheet.insert_rows(at, rows);
    }

    pub(crate) fn into_sheet(self) -> Sheet {
        self.sheet
    }
}
