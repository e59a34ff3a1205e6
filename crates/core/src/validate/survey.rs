//! Row checks over the `survey` sheet.

use super::columns::has_column;
use super::{Context, IssueCode, Location, ValidationIssue};
use crate::records::{RecordType, KNOWN_FIELD_TYPES, METADATA_TYPES, STRUCTURAL_TYPES};
use crate::sheet::{cell_has_value, SheetKind};
use crate::similarity::closest_match;
use crate::structure::FormStructure;
use regex::Regex;
use std::sync::OnceLock;

static NAME_SYNTAX: OnceLock<Regex> = OnceLock::new();
static NUMERIC_SUFFIX: OnceLock<Regex> = OnceLock::new();
static QUESTION_CODE: OnceLock<Regex> = OnceLock::new();

pub(crate) fn name_syntax_re() -> &'static Regex {
    NAME_SYNTAX.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("valid regex"))
}

fn numeric_suffix_re() -> &'static Regex {
    NUMERIC_SUFFIX.get_or_init(|| Regex::new(r"[A-Za-z_.\-]\d+$").expect("valid regex"))
}

fn question_code_re() -> &'static Regex {
    QUESTION_CODE.get_or_init(|| Regex::new(r"^[A-Za-z]{1,2}\d{1,3}[A-Za-z]?[_.\-]").expect("valid regex"))
}

fn survey<'c>(ctx: &'c Context) -> Option<&'c FormStructure> {
    ctx.survey.read()
}

fn at(row: usize) -> Location {
    Location::row(SheetKind::Survey, row)
}

pub(crate) fn check_structure(ctx: &Context, issues: &mut Vec<ValidationIssue>) {
    let Some(s) = survey(ctx) else { return };
    for fault in &s.faults {
        issues.push(ValidationIssue::new(
            IssueCode::UnbalancedStructure,
            fault.to_string(),
            Location::rows(SheetKind::Survey, fault.rows()).with_column("type"),
        ));
    }
}

pub(crate) fn check_types(ctx: &Context, issues: &mut Vec<ValidationIssue>) {
    let Some(s) = survey(ctx) else { return };
    if !s.columns.contains("type") {
        return;
    }
    let distance = ctx.config.suggestion_distance;

    for located in &s.records {
        let row = located.row;
        let raw = located.record.type_name.trim();
        let Some(parsed) = RecordType::parse(raw) else {
            issues.push(
                ValidationIssue::new(IssueCode::MissingType, format!("row {} has no type", row), at(row))
                    .with_column("type"),
            );
            continue;
        };
        let RecordType::Field { keyword, argument, .. } = &parsed else {
            continue;
        };

        if KNOWN_FIELD_TYPES.contains(&keyword.as_str()) || METADATA_TYPES.contains(&keyword.as_str()) {
            if matches!(keyword.as_str(), "select_one" | "select_multiple") && argument.is_none() {
                issues.push(
                    ValidationIssue::new(
                        IssueCode::InvalidSelectSyntax,
                        format!("'{}' needs a choice list name, e.g. '{} yes_no'", keyword, keyword),
                        at(row),
                    )
                    .with_column("type"),
                );
            }
            continue;
        }

        let lower = keyword.to_lowercase();
        let suggestion = if lower == "begin" || lower == "end" {
            closest_match(raw, STRUCTURAL_TYPES.iter().copied(), distance).map(str::to_string)
        } else {
            closest_match(
                keyword,
                KNOWN_FIELD_TYPES.iter().chain(METADATA_TYPES).copied(),
                distance,
            )
            .map(|k| match argument {
                Some(arg) => format!("{} {}", k, arg),
                None => k.to_string(),
            })
        };
        let message = match &suggestion {
            Some(s) => format!("unknown type '{}' (did you mean '{}'?)", raw, s),
            None => format!("unknown type '{}'", raw),
        };
        issues.push(
            ValidationIssue::new(IssueCode::UnknownType, message, at(row))
                .with_column("type")
                .suggest(suggestion.as_deref()),
        );
    }
}

pub(crate) fn check_name_syntax(ctx: &Context, issues: &mut Vec<ValidationIssue>) {
    let Some(s) = survey(ctx) else { return };
    if !s.columns.contains("name") {
        return;
    }
    for located in &s.records {
        let record = &located.record;
        let kind = record.record_type();
        if kind.as_ref().is_some_and(RecordType::is_end) {
            continue;
        }
        let name = record.name.trim();
        if name.is_empty() {
            if kind.is_some() {
                issues.push(
                    ValidationIssue::new(
                        IssueCode::MissingName,
                        format!("row {} ('{}') has no name", located.row, record.type_name.trim()),
                        at(located.row),
                    )
                    .with_column("name"),
                );
            }
            continue;
        }
        if !name_syntax_re().is_match(name) {
            issues.push(
                ValidationIssue::new(
                    IssueCode::InvalidName,
                    format!(
                        "name '{}' must start with a letter or underscore and contain only letters, digits, '_', '.' or '-'",
                        name
                    ),
                    at(located.row),
                )
                .with_column("name"),
            );
        }
    }
}

pub(crate) fn check_name_uniqueness(ctx: &Context, issues: &mut Vec<ValidationIssue>) {
    let Some(s) = survey(ctx) else { return };
    for (name, rows) in s.names() {
        if rows.len() > 1 {
            issues.push(
                ValidationIssue::new(
                    IssueCode::DuplicateName,
                    format!("name '{}' is used by rows {}", name, crate::error::join_rows(&rows)),
                    Location::rows(SheetKind::Survey, rows),
                )
                .with_column("name"),
            );
        }
    }
}

pub(crate) fn check_messages(ctx: &Context, issues: &mut Vec<ValidationIssue>) {
    let Some(s) = survey(ctx) else { return };
    for located in &s.records {
        let record = &located.record;
        if record.get("constraint").is_some() && !record.has_any("constraint_message") {
            issues.push(
                ValidationIssue::new(
                    IssueCode::MissingConstraintMessage,
                    format!("'{}' has a constraint but no constraint_message", record.name.trim()),
                    at(located.row),
                )
                .with_column("constraint_message"),
            );
        }
        if record.is_required() && !record.has_any("required_message") {
            issues.push(
                ValidationIssue::new(
                    IssueCode::MissingRequiredMessage,
                    format!("'{}' is required but has no required_message", record.name.trim()),
                    at(located.row),
                )
                .with_column("required_message"),
            );
        }
    }
}

pub(crate) fn check_group_labels(ctx: &Context, issues: &mut Vec<ValidationIssue>) {
    let Some(s) = survey(ctx) else { return };
    if !has_column(&s.columns, "label") {
        return;
    }
    for span in &s.blocks {
        let labelled = s.record(span.begin_row).is_some_and(|r| r.has_any("label"));
        if !labelled {
            issues.push(
                ValidationIssue::new(
                    IssueCode::MissingGroupLabel,
                    format!("begin {} '{}' has no label", span.kind.as_str(), span.name),
                    at(span.begin_row),
                )
                .with_column("label"),
            );
        }
    }
}

pub(crate) fn check_block_names(ctx: &Context, issues: &mut Vec<ValidationIssue>) {
    let Some(s) = survey(ctx) else { return };
    for span in &s.blocks {
        let (Some(end_row), Some(end_name)) = (span.end_row, span.end_name.as_deref()) else {
            continue;
        };
        if end_name != span.name {
            issues.push(
                ValidationIssue::new(
                    IssueCode::MismatchedBlockName,
                    format!(
                        "end {} at row {} is named '{}' but closes '{}' opened at row {}",
                        span.kind.as_str(),
                        end_row,
                        end_name,
                        span.name,
                        span.begin_row
                    ),
                    Location::rows(SheetKind::Survey, vec![span.begin_row, end_row]),
                )
                .with_column("name")
                .suggest(Some(&span.name)),
            );
        }
    }
}

pub(crate) fn check_naming_quality(ctx: &Context, issues: &mut Vec<ValidationIssue>) {
    let Some(s) = survey(ctx) else { return };
    for located in &s.records {
        if located.record.record_type().is_some_and(|t| t.is_end()) {
            continue;
        }
        let name = located.record.name.trim();
        if !cell_has_value(name) {
            continue;
        }
        let finding = if name.starts_with(|c: char| c.is_ascii_digit()) {
            Some((IssueCode::NameLeadingDigit, "starts with a digit"))
        } else if question_code_re().is_match(name) {
            Some((IssueCode::NameQuestionCode, "starts with a question code; prefer a descriptive name"))
        } else if numeric_suffix_re().is_match(name) {
            Some((
                IssueCode::NameNumericSuffix,
                "ends in a number, which can collide with export-generated repeat and select_multiple columns",
            ))
        } else {
            None
        };
        if let Some((code, why)) = finding {
            issues.push(
                ValidationIssue::new(code, format!("name '{}' {}", name, why), at(located.row)).with_column("name"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::sheet::{Document, Sheet};
    use crate::validate::{validate, IssueCode, ValidationIssue};

    fn run(rows: &[&[&str]]) -> Vec<ValidationIssue> {
        let doc = Document::new(
            Sheet::from_strs(rows),
            Some(Sheet::from_strs(&[&["list_name", "name", "label"], &["yn", "yes", "Yes"]])),
            Some(Sheet::from_strs(&[&["form_title", "form_id"], &["T", "t"]])),
        );
        validate(&doc)
    }

    fn codes(issues: &[ValidationIssue]) -> Vec<IssueCode> {
        issues.iter().map(|i| i.code).collect()
    }

    #[test]
    fn unknown_type_suggests_closest_known_type() {
        let issues = run(&[&["type", "name", "label"], &["interger", "n", "N"], &["begin grup", "g", "G"], &["end group", "", ""]]);
        let suggestions: Vec<Option<&str>> = issues.iter().map(|i| i.suggestion.as_deref()).collect();
        // "begin grup" opens nothing, so the end row is unmatched.
        assert_eq!(
            codes(&issues),
            vec![IssueCode::UnbalancedStructure, IssueCode::UnknownType, IssueCode::UnknownType]
        );
        assert_eq!(suggestions, vec![None, Some("integer"), Some("begin group")]);
    }

    #[test]
    fn field_keywords_are_case_sensitive() {
        let issues = run(&[&["type", "name", "label"], &["Text", "n", "N"], &["Begin Group", "g", "G"], &["END_GROUP", "", ""]]);
        assert_eq!(codes(&issues), vec![IssueCode::UnknownType]);
        assert_eq!(issues[0].suggestion.as_deref(), Some("text"));
    }

    #[test]
    fn select_without_list_is_invalid_syntax() {
        let issues = run(&[&["type", "name", "label"], &["select_one", "q", "Q"]]);
        assert_eq!(codes(&issues), vec![IssueCode::InvalidSelectSyntax]);
    }

    #[test]
    fn missing_type_and_name() {
        let issues = run(&[&["type", "name", "label"], &["", "orphan", "Orphan"], &["text", "", "No name"]]);
        assert_eq!(codes(&issues), vec![IssueCode::MissingType, IssueCode::MissingName]);
        assert_eq!(issues[0].location.rows, vec![2]);
        assert_eq!(issues[1].location.rows, vec![3]);
    }

    #[test]
    fn bad_name_syntax_and_leading_digit() {
        let issues = run(&[&["type", "name", "label"], &["text", "1st", "First"], &["text", "has space", "S"]]);
        assert_eq!(
            codes(&issues),
            vec![IssueCode::InvalidName, IssueCode::InvalidName, IssueCode::NameLeadingDigit]
        );
    }

    #[test]
    fn block_end_name_is_not_a_duplicate() {
        let issues = run(&[
            &["type", "name", "label"],
            &["begin repeat", "kids", "Kids"],
            &["text", "kid", "Kid"],
            &["end repeat", "kids", ""],
        ]);
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[test]
    fn messaging_completeness_accepts_translations() {
        let issues = run(&[
            &["type", "name", "label", "constraint", "constraint_message::fr", "required"],
            &["integer", "a", "A", ". > 0", "positif", "yes"],
            &["integer", "b", "B", ". > 0", "", ""],
        ]);
        assert_eq!(
            codes(&issues),
            vec![IssueCode::MissingRequiredMessage, IssueCode::MissingConstraintMessage]
        );
        assert_eq!(issues[0].location.rows, vec![2]);
        assert_eq!(issues[1].location.rows, vec![3]);
    }

    #[test]
    fn naming_quality_codes() {
        let issues = run(&[
            &["type", "name", "label"],
            &["text", "q12_age", "Age"],
            &["text", "income2", "Income"],
            &["text", "household_size", "Size"],
        ]);
        assert_eq!(codes(&issues), vec![IssueCode::NameQuestionCode, IssueCode::NameNumericSuffix]);
    }
}
