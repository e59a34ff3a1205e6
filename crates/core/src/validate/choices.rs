//! Checks linking the `survey` and `choices` sheets.

use super::{Context, IssueCode, Location, Mapped, ValidationIssue};
use crate::sheet::SheetKind;
use crate::similarity::closest_match;
use std::collections::{BTreeMap, BTreeSet};

pub(crate) fn check_choice_uniqueness(ctx: &Context, issues: &mut Vec<ValidationIssue>) {
    let Some(table) = ctx.choices.read() else { return };
    if !table.columns.contains("list_name") || !table.columns.contains("name") {
        return;
    }
    for (list, choices) in table.lists() {
        let mut by_name: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for choice in choices {
            let name = choice.record.name.trim();
            if !name.is_empty() {
                by_name.entry(name).or_default().push(choice.row);
            }
        }
        for (name, rows) in by_name {
            if rows.len() > 1 {
                issues.push(
                    ValidationIssue::new(
                        IssueCode::DuplicateChoiceName,
                        format!(
                            "choice '{}' appears more than once in list '{}' (rows {})",
                            name,
                            list,
                            crate::error::join_rows(&rows)
                        ),
                        Location::rows(SheetKind::Choices, rows),
                    )
                    .with_list(list)
                    .with_column("name"),
                );
            }
        }
    }
}

/// List names the choices sheet defines, or `None` when they cannot be known.
fn defined_lists<'c>(ctx: &'c Context) -> Option<BTreeSet<&'c str>> {
    match &ctx.choices {
        Mapped::Absent => Some(BTreeSet::new()),
        Mapped::Unreadable => None,
        Mapped::Read(table) if !table.columns.contains("list_name") => None,
        Mapped::Read(table) => Some(table.lists().into_keys().collect()),
    }
}

pub(crate) fn check_list_references(ctx: &Context, issues: &mut Vec<ValidationIssue>) {
    let Some(survey) = ctx.survey.read() else { return };
    let Some(lists) = defined_lists(ctx) else { return };

    for located in &survey.records {
        let Some(kind) = located.record.record_type() else { continue };
        let Some((list, _)) = kind.choice_list() else { continue };
        if lists.contains(list) {
            continue;
        }
        let suggestion = closest_match(list, lists.iter().copied(), ctx.config.suggestion_distance);
        let message = match suggestion {
            Some(s) => format!(
                "choice list '{}' is not defined in the choices sheet (did you mean '{}'?)",
                list, s
            ),
            None => format!("choice list '{}' is not defined in the choices sheet", list),
        };
        issues.push(
            ValidationIssue::new(
                IssueCode::MissingChoiceList,
                message,
                Location::row(SheetKind::Survey, located.row),
            )
            .with_list(list)
            .with_column("type")
            .suggest(suggestion),
        );
    }
}

pub(crate) fn check_multiple_choice_names(ctx: &Context, issues: &mut Vec<ValidationIssue>) {
    let (Some(survey), Some(table)) = (ctx.survey.read(), ctx.choices.read()) else {
        return;
    };
    let multiple: BTreeSet<String> = survey
        .records
        .iter()
        .filter_map(|r| r.record.record_type())
        .filter_map(|t| match t.choice_list() {
            Some((list, true)) => Some(list.to_string()),
            _ => None,
        })
        .collect();

    for choice in &table.records {
        let list = choice.record.list_name.trim();
        if !multiple.contains(list) {
            continue;
        }
        let name = choice.record.name.trim();
        if name.chars().any(char::is_whitespace) {
            issues.push(
                ValidationIssue::new(
                    IssueCode::SpaceInMultipleChoiceName,
                    format!(
                        "choice '{}' in list '{}' contains whitespace; select_multiple answers are space-separated",
                        name, list
                    ),
                    Location::row(SheetKind::Choices, choice.row),
                )
                .with_list(list)
                .with_column("name")
                .suggest(Some(&name.split_whitespace().collect::<Vec<_>>().join("_"))),
            );
        }
    }
}

pub(crate) fn check_choices_sheet(ctx: &Context, issues: &mut Vec<ValidationIssue>) {
    if ctx.doc.choices.is_none() {
        issues.push(ValidationIssue::new(
            IssueCode::MissingChoicesSheet,
            "workbook has no choices sheet",
            Location::sheet(SheetKind::Choices),
        ));
    }
}

#[cfg(test)]
mod tests {
    use crate::sheet::{Document, Sheet};
    use crate::validate::{validate, IssueCode, ValidationIssue};

    fn run(survey: &[&[&str]], choices: Option<&[&[&str]]>) -> Vec<ValidationIssue> {
        let doc = Document::new(
            Sheet::from_strs(survey),
            choices.map(Sheet::from_strs),
            Some(Sheet::from_strs(&[&["form_title", "form_id"], &["T", "t"]])),
        );
        validate(&doc)
    }

    #[test]
    fn same_choice_name_in_different_lists_is_fine() {
        let issues = run(
            &[&["type", "name", "label"], &["select_one a", "x", "X"], &["select_one b", "y", "Y"]],
            Some(&[
                &["list_name", "name", "label"],
                &["a", "1", "One"],
                &["b", "1", "One"],
                &["a", "1", "Uno"],
            ]),
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::DuplicateChoiceName);
        assert_eq!(issues[0].location.rows, vec![2, 4]);
        assert_eq!(issues[0].location.list_name.as_deref(), Some("a"));
    }

    #[test]
    fn missing_list_offers_a_near_match() {
        let issues = run(
            &[&["type", "name", "label"], &["select_one fruts", "fav", "Fav"]],
            Some(&[&["list_name", "name", "label"], &["fruits", "apple", "Apple"]]),
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::MissingChoiceList);
        assert_eq!(issues[0].suggestion.as_deref(), Some("fruits"));
    }

    #[test]
    fn list_match_is_case_sensitive() {
        let issues = run(
            &[&["type", "name", "label"], &["select_one Fruits", "fav", "Fav"]],
            Some(&[&["list_name", "name", "label"], &["fruits", "apple", "Apple"]]),
        );
        assert_eq!(issues[0].code, IssueCode::MissingChoiceList);
        assert_eq!(issues[0].suggestion.as_deref(), Some("fruits"));
    }

    #[test]
    fn whitespace_only_matters_for_select_multiple_lists() {
        let issues = run(
            &[
                &["type", "name", "label"],
                &["select_multiple colors", "c", "C"],
                &["select_one sizes", "s", "S"],
            ],
            Some(&[
                &["list_name", "name", "label"],
                &["colors", "light blue", "Light blue"],
                &["sizes", "extra large", "XL"],
            ]),
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::SpaceInMultipleChoiceName);
        assert_eq!(issues[0].location.rows, vec![2]);
        assert_eq!(issues[0].suggestion.as_deref(), Some("light_blue"));
    }

    #[test]
    fn absent_choices_sheet_warns_and_every_list_is_missing() {
        let issues = run(&[&["type", "name", "label"], &["select_one yn", "q", "Q"]], None);
        let codes: Vec<IssueCode> = issues.iter().map(|i| i.code).collect();
        assert_eq!(codes, vec![IssueCode::MissingChoiceList, IssueCode::MissingChoicesSheet]);
    }
}
