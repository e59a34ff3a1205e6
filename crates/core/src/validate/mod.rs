//! Validation Rule Engine.
//!
//! Every check runs independently and appends to one issue list; a failing
//! check never stops the others. Checks that need a column the sheet lacks
//! are skipped, and the missing column is reported once by the
//! required-columns check. The result is sorted by severity, then check,
//! then first row, so repeated calls give identical output.

mod choices;
mod columns;
mod formulas;
pub mod issue;
mod settings;
mod survey;

pub use issue::{Check, IssueCode, Location, Severity, Summary, ValidationIssue, ValidationReport};

use crate::columns::{scan_extent, ColumnMap, Extent};
use crate::config::EngineConfig;
use crate::error::OpError;
use crate::records::ChoiceTable;
use crate::sheet::{Document, Sheet, SheetKind};
use crate::structure::{parse_survey, FormStructure};

/// Outcome of mapping one sheet's header.
pub(crate) enum Mapped<T> {
    /// The workbook has no such sheet.
    Absent,
    /// The header could not be mapped; row checks are skipped.
    Unreadable,
    Read(T),
}

impl<T> Mapped<T> {
    pub(crate) fn read(&self) -> Option<&T> {
        match self {
            Mapped::Read(t) => Some(t),
            _ => None,
        }
    }
}

/// Everything the checks consume, parsed once per `validate` call.
pub(crate) struct Context<'a> {
    pub doc: &'a Document,
    pub config: &'a EngineConfig,
    pub survey: Mapped<FormStructure>,
    pub choices: Mapped<ChoiceTable>,
    pub settings: Mapped<ColumnMap>,
    /// Extent and header failure per present sheet, in sheet order.
    pub sheets: Vec<(SheetKind, Extent, Option<OpError>)>,
}

fn map_sheet(
    sheet: &Sheet,
    kind: SheetKind,
    config: &EngineConfig,
    sheets: &mut Vec<(SheetKind, Extent, Option<OpError>)>,
) -> Option<(ColumnMap, Extent)> {
    let extent = scan_extent(sheet, config.blank_threshold);
    match ColumnMap::from_header(sheet.header(), kind, extent.width) {
        Ok(columns) => {
            sheets.push((kind, extent.clone(), None));
            Some((columns, extent))
        }
        Err(e) => {
            log::debug!("{} sheet skipped for row checks: {}", kind, e);
            sheets.push((kind, extent, Some(e)));
            None
        }
    }
}

impl<'a> Context<'a> {
    fn load(doc: &'a Document, config: &'a EngineConfig) -> Self {
        let mut sheets = Vec::new();

        let survey = match map_sheet(&doc.survey, SheetKind::Survey, config, &mut sheets) {
            Some((columns, extent)) => Mapped::Read(parse_survey(&doc.survey, columns, extent)),
            None => Mapped::Unreadable,
        };

        let choices = match &doc.choices {
            None => Mapped::Absent,
            Some(sheet) => match map_sheet(sheet, SheetKind::Choices, config, &mut sheets) {
                Some((columns, extent)) => Mapped::Read(ChoiceTable::read(sheet, columns, extent)),
                None => Mapped::Unreadable,
            },
        };

        let settings = match &doc.settings {
            None => Mapped::Absent,
            Some(sheet) => match map_sheet(sheet, SheetKind::Settings, config, &mut sheets) {
                Some((columns, _)) => Mapped::Read(columns),
                None => Mapped::Unreadable,
            },
        };

        Context {
            doc,
            config,
            survey,
            choices,
            settings,
            sheets,
        }
    }
}

/// Validate with the default [`EngineConfig`].
pub fn validate(doc: &Document) -> Vec<ValidationIssue> {
    validate_with(doc, &EngineConfig::default())
}

pub fn validate_with(doc: &Document, config: &EngineConfig) -> Vec<ValidationIssue> {
    let ctx = Context::load(doc, config);
    let mut issues = Vec::new();

    columns::check_required_columns(&ctx, &mut issues);
    columns::check_duplicate_headers(&ctx, &mut issues);
    survey::check_structure(&ctx, &mut issues);
    survey::check_types(&ctx, &mut issues);
    survey::check_name_syntax(&ctx, &mut issues);
    survey::check_name_uniqueness(&ctx, &mut issues);
    choices::check_choice_uniqueness(&ctx, &mut issues);
    choices::check_list_references(&ctx, &mut issues);
    choices::check_multiple_choice_names(&ctx, &mut issues);
    formulas::check_references(&ctx, &mut issues);
    formulas::check_heuristics(&ctx, &mut issues);
    survey::check_messages(&ctx, &mut issues);
    survey::check_group_labels(&ctx, &mut issues);
    survey::check_block_names(&ctx, &mut issues);
    survey::check_naming_quality(&ctx, &mut issues);
    settings::check_settings(&ctx, &mut issues);
    choices::check_choices_sheet(&ctx, &mut issues);
    columns::check_blank_boundary(&ctx, &mut issues);

    // Stable: issues of one check on one row keep their column order.
    issues.sort_by_key(|i| (i.severity, i.check, i.location.first_row()));
    log::debug!("validation produced {} issue(s)", issues.len());
    issues
}

/// Validate and wrap the issues with per-severity counts.
pub fn report(doc: &Document, config: &EngineConfig) -> ValidationReport {
    ValidationReport::from_issues(validate_with(doc, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(survey: &[&[&str]], choices: Option<&[&[&str]]>) -> Document {
        Document::new(
            Sheet::from_strs(survey),
            choices.map(Sheet::from_strs),
            Some(Sheet::from_strs(&[&["form_title", "form_id"], &["T", "t"]])),
        )
    }

    #[test]
    fn clean_form_has_no_findings() {
        let d = doc(
            &[
                &["type", "name", "label"],
                &["select_one yn", "consent", "Consent?"],
                &["begin group", "details", "Details"],
                &["integer", "age", "Age"],
                &["end group", "details", ""],
            ],
            Some(&[&["list_name", "name", "label"], &["yn", "yes", "Yes"], &["yn", "no", "No"]]),
        );
        assert_eq!(validate(&d), Vec::new());
    }

    #[test]
    fn output_is_sorted_by_severity_then_check_then_row() {
        let d = doc(
            &[
                &["type", "name", "label"],
                &["begin group", "g", ""],
                &["txt", "a", "A"],
                &["text", "a", "A2"],
                &["text", "q1_x", "Q"],
                &["end group", "other", ""],
            ],
            Some(&[&["list_name", "name", "label"]]),
        );
        let codes: Vec<IssueCode> = validate(&d).iter().map(|i| i.code).collect();
        assert_eq!(
            codes,
            vec![
                IssueCode::UnknownType,
                IssueCode::DuplicateName,
                IssueCode::MissingGroupLabel,
                IssueCode::MismatchedBlockName,
                IssueCode::NameQuestionCode,
            ]
        );
    }

    #[test]
    fn issues_on_one_row_keep_column_order() {
        let d = doc(
            &[
                &["type", "name", "label", "relevant", "calculation"],
                &["calculate", "total", "", "${zzz}", "${yyy} + 1"],
            ],
            None,
        );
        let columns: Vec<Option<String>> = validate(&d)
            .into_iter()
            .filter(|i| i.code == IssueCode::UnknownReference)
            .map(|i| i.location.column)
            .collect();
        assert_eq!(columns, [Some("relevant".to_string()), Some("calculation".to_string())]);
    }

    #[test]
    fn duplicate_header_skips_row_checks_for_that_sheet_only() {
        let d = doc(
            &[&["type", "name", "name"], &["bogus", "1x", "y"]],
            Some(&[&["list_name", "name", "label"], &["l", "a", "A"], &["l", "a", "B"]]),
        );
        let codes: Vec<IssueCode> = validate(&d).iter().map(|i| i.code).collect();
        assert_eq!(codes, vec![IssueCode::DuplicateHeader, IssueCode::DuplicateChoiceName]);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let d = doc(
            &[&["type", "name", "label"], &["text", "a", ""], &["begin repeat", "r", ""]],
            None,
        );
        assert_eq!(validate(&d), validate(&d));
    }
}
