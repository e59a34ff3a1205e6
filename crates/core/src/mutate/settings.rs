//! Values in the `settings` sheet.

use super::rows::SheetWriter;
use crate::config::EngineConfig;
use crate::error::OpError;
use crate::sheet::{Document, SheetKind};
use std::collections::BTreeMap;

/// Set `settings` values in row 2 (column -> value, "" clears).
///
/// Creates the sheet when absent and appends missing header columns.
pub fn update_settings(
    doc: &Document,
    changes: &BTreeMap<String, String>,
    config: &EngineConfig,
) -> Result<Document, OpError> {
    if changes.keys().any(|k| k.trim().is_empty()) {
        return Err(OpError::InvalidRecord {
            reason: "settings column names cannot be empty".to_string(),
        });
    }

    let sheet = doc.settings.clone().unwrap_or_default();
    let mut writer = SheetWriter::new(sheet, SheetKind::Settings, config)?;
    let mut changed = 0usize;
    for (column, value) in changes {
        if writer.write_cell(2, column, value) {
            changed += 1;
        }
    }

    let mut next = doc.clone();
    next.settings = Some(writer.into_sheet());
    log::info!("updated {} setting(s)", changed);
    Ok(next.touched())
}
