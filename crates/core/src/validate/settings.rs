//! Settings sheet completeness.

use super::{Context, IssueCode, Location, Mapped, ValidationIssue};
use crate::sheet::{cell_has_value, SheetKind};

pub(crate) fn check_settings(ctx: &Context, issues: &mut Vec<ValidationIssue>) {
    let columns = match &ctx.settings {
        Mapped::Absent => {
            issues.push(ValidationIssue::new(
                IssueCode::MissingSettingsSheet,
                "workbook has no settings sheet; form_title and form_id will be derived from the file name",
                Location::sheet(SheetKind::Settings),
            ));
            return;
        }
        Mapped::Unreadable => return,
        Mapped::Read(columns) => columns,
    };
    let Some(sheet) = ctx.doc.settings.as_ref() else { return };

    for setting in &ctx.config.required_settings {
        let value = columns.get(setting).map(|col| sheet.cell(2, col)).unwrap_or("");
        if !cell_has_value(value) {
            issues.push(
                ValidationIssue::new(
                    IssueCode::MissingSetting,
                    format!("settings has no value for '{}'", setting),
                    Location::row(SheetKind::Settings, 2),
                )
                .with_column(setting),
            );
        }
    }
}
