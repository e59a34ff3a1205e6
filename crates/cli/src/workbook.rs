//! Workbook files: JSON snapshots and spreadsheets.
//!
//! A JSON snapshot is the serialized [`Document`]: each sheet is an array of
//! rows, each row an array of strings, header first. Spreadsheets are read
//! through calamine (`.xlsx`, `.xlsm`, `.xls`, `.ods`) and written as
//! `.xlsx`. Cell values are rendered as text; a numeric cell `3` reads back
//! as the string `"3"`.
//!
//! Sheets beyond survey/choices/settings are carried through and written
//! back after the form sheets. Cell formatting is not kept.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use rust_xlsxwriter::Workbook;
use xlsform_core::{Document, Sheet, SheetKind};

#[derive(Debug, thiserror::Error)]
pub(crate) enum WorkbookError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("invalid workbook JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not read spreadsheet: {0}")]
    Read(#[from] calamine::Error),

    #[error("could not write spreadsheet: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    #[error("workbook has no '{0}' sheet")]
    MissingSheet(SheetKind),

    #[error("unsupported workbook format '{0}'; use .json or .xlsx")]
    UnsupportedFormat(String),

    #[error("{sheet} sheet is too large for a spreadsheet (row {row}, column {column})")]
    TooLarge { sheet: String, row: usize, column: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Spreadsheet,
}

fn format_of(path: &Path) -> Result<Format, WorkbookError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "json" => Ok(Format::Json),
        "xlsx" | "xlsm" | "xls" | "ods" => Ok(Format::Spreadsheet),
        _ => Err(WorkbookError::UnsupportedFormat(path.display().to_string())),
    }
}

// ── Reading ───────────────────────────────────────────────────────────

pub(crate) fn read_workbook(path: &Path) -> Result<Document, WorkbookError> {
    match format_of(path)? {
        Format::Json => {
            let content = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&content)?)
        }
        Format::Spreadsheet => read_spreadsheet(path),
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn range_to_sheet(range: &Range<Data>) -> Sheet {
    let (row_offset, col_offset) = range.start().unwrap_or((0, 0));
    let mut sheet = Sheet::default();
    for (row, col, cell) in range.cells() {
        let value = cell_text(cell);
        if value.is_empty() {
            continue;
        }
        sheet.set_cell(row_offset as usize + row + 1, col_offset as usize + col, value);
    }
    sheet
}

fn read_spreadsheet(path: &Path) -> Result<Document, WorkbookError> {
    let mut workbook = open_workbook_auto(path)?;
    let names = workbook.sheet_names().to_owned();

    let mut sheet_named = |kind: SheetKind| -> Result<Option<Sheet>, WorkbookError> {
        let Some(name) = names.iter().find(|n| n.trim().eq_ignore_ascii_case(kind.as_str())) else {
            return Ok(None);
        };
        let range = workbook.worksheet_range(name)?;
        log::debug!("read sheet '{}' ({} x {})", name, range.height(), range.width());
        Ok(Some(range_to_sheet(&range)))
    };

    let survey = sheet_named(SheetKind::Survey)?.ok_or(WorkbookError::MissingSheet(SheetKind::Survey))?;
    let choices = sheet_named(SheetKind::Choices)?;
    let settings = sheet_named(SheetKind::Settings)?;
    let mut doc = Document::new(survey, choices, settings);

    for name in names.iter().filter(|n| !is_form_sheet(n)) {
        let range = workbook.worksheet_range(name)?;
        log::debug!("carrying sheet '{}' through unchanged", name);
        doc.other_sheets.insert(name.clone(), range_to_sheet(&range));
    }
    Ok(doc)
}

fn is_form_sheet(name: &str) -> bool {
    [SheetKind::Survey, SheetKind::Choices, SheetKind::Settings]
        .iter()
        .any(|kind| name.trim().eq_ignore_ascii_case(kind.as_str()))
}

// ── Writing ───────────────────────────────────────────────────────────

pub(crate) fn write_workbook(path: &Path, doc: &Document) -> Result<(), WorkbookError> {
    match format_of(path)? {
        Format::Json => {
            let json = serde_json::to_string_pretty(doc)?;
            std::fs::write(path, json + "\n")?;
            Ok(())
        }
        Format::Spreadsheet => {
            let is_xlsx = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
            if !is_xlsx {
                return Err(WorkbookError::UnsupportedFormat(path.display().to_string()));
            }
            write_xlsx(path, doc)
        }
    }
}

fn write_sheet(workbook: &mut Workbook, name: &str, sheet: &Sheet) -> Result<(), WorkbookError> {
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(name)?;
    for (r, row) in sheet.rows().iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let too_large = || WorkbookError::TooLarge {
                sheet: name.to_string(),
                row: r + 1,
                column: c + 1,
            };
            let row_index = u32::try_from(r).map_err(|_| too_large())?;
            let col_index = u16::try_from(c).map_err(|_| too_large())?;
            worksheet.write_string(row_index, col_index, value)?;
        }
    }
    Ok(())
}

fn write_xlsx(path: &Path, doc: &Document) -> Result<(), WorkbookError> {
    let mut workbook = Workbook::new();
    for kind in [SheetKind::Survey, SheetKind::Choices, SheetKind::Settings] {
        if let Some(sheet) = doc.sheet(kind) {
            write_sheet(&mut workbook, kind.as_str(), sheet)?;
        }
    }
    for (name, sheet) in &doc.other_sheets {
        write_sheet(&mut workbook, name, sheet)?;
    }
    workbook.save(path)?;
    Ok(())
}
