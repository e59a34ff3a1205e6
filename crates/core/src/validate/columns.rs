//! Sheet-level checks: required columns, duplicate headers, blank boundary.

use super::{Context, Location, Mapped, ValidationIssue};
use crate::columns::ColumnMap;
use crate::error::OpError;
use crate::validate::IssueCode;

const SURVEY_REQUIRED: &[&str] = &["type", "name", "label"];
const CHOICES_REQUIRED: &[&str] = &["list_name", "name", "label"];

/// A `label` requirement is met by any translated label column.
pub(crate) fn has_column(columns: &ColumnMap, column: &str) -> bool {
    columns.contains(column) || (column == "label" && !columns.translations("label").is_empty())
}

fn missing(columns: &ColumnMap, required: &[&str], issues: &mut Vec<ValidationIssue>) {
    for column in required {
        if !has_column(columns, column) {
            issues.push(
                ValidationIssue::new(
                    IssueCode::MissingColumn,
                    format!("{} sheet has no '{}' column", columns.sheet(), column),
                    Location::row(columns.sheet(), 1),
                )
                .with_column(column),
            );
        }
    }
}

pub(crate) fn check_required_columns(ctx: &Context, issues: &mut Vec<ValidationIssue>) {
    if let Mapped::Read(survey) = &ctx.survey {
        missing(&survey.columns, SURVEY_REQUIRED, issues);
    }
    if let Mapped::Read(choices) = &ctx.choices {
        missing(&choices.columns, CHOICES_REQUIRED, issues);
    }
}

pub(crate) fn check_duplicate_headers(ctx: &Context, issues: &mut Vec<ValidationIssue>) {
    for (_, _, failure) in &ctx.sheets {
        if let Some(OpError::DuplicateHeader {
            sheet,
            header,
            columns,
        }) = failure
        {
            issues.push(
                ValidationIssue::new(
                    IssueCode::DuplicateHeader,
                    format!(
                        "header '{}' appears in columns {}; rows of this sheet were not checked",
                        header,
                        crate::error::join_rows(columns)
                    ),
                    Location::row(*sheet, 1),
                )
                .with_column(header),
            );
        }
    }
}

pub(crate) fn check_blank_boundary(ctx: &Context, issues: &mut Vec<ValidationIssue>) {
    let threshold = ctx.config.blank_threshold;
    for (kind, extent, _) in &ctx.sheets {
        if !extent.has_stray_data() {
            continue;
        }
        let mut parts = Vec::new();
        if !extent.stray_rows.is_empty() {
            parts.push(format!("{} row(s) after {} blank rows", extent.stray_rows.len(), threshold));
        }
        if !extent.stray_columns.is_empty() {
            parts.push(format!(
                "column(s) {} after {} blank header cells",
                crate::error::join_rows(&extent.stray_columns),
                threshold
            ));
        }
        issues.push(ValidationIssue::new(
            IssueCode::DataBeyondBlankBoundary,
            format!(
                "{} will be ignored: {}; remove the blank gap or move the data",
                kind,
                parts.join(" and ")
            ),
            Location::rows(*kind, extent.stray_rows.clone()),
        ));
    }
}
