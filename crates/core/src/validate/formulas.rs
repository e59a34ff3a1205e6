//! Reference checks over formula-bearing columns.
//!
//! These are textual heuristics, not an expression parser. The bare-field
//! check only fires when a token exactly matches a name declared on another
//! row, so false negatives are expected and false positives are rare.

use super::{Context, IssueCode, Location, ValidationIssue};
use crate::deps::{references, scanned_values, FormulaKind};
use crate::sheet::SheetKind;
use crate::similarity::closest_match;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

static WRAPPED: OnceLock<Regex> = OnceLock::new();
static QUOTED: OnceLock<Regex> = OnceLock::new();
static TOKEN: OnceLock<Regex> = OnceLock::new();

fn wrapped_re() -> &'static Regex {
    WRAPPED.get_or_init(|| Regex::new(r"\$\{[^}]*\}").expect("valid regex"))
}

fn quoted_re() -> &'static Regex {
    QUOTED.get_or_init(|| Regex::new(r#"'[^']*'|"[^"]*""#).expect("valid regex"))
}

fn token_re() -> &'static Regex {
    TOKEN.get_or_init(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("valid regex"))
}

/// Operators spelled as words in the form-logic language.
const WORD_OPERATORS: &[&str] = &["and", "or", "div", "mod", "not"];

/// Columns the bare-field heuristic looks at.
const HEURISTIC_KINDS: &[FormulaKind] = &[
    FormulaKind::Relevant,
    FormulaKind::Constraint,
    FormulaKind::Calculation,
];

/// Identifiers outside `${...}`, string literals and function-call position.
fn bare_identifiers(formula: &str) -> Vec<String> {
    let stripped = wrapped_re().replace_all(formula, " ");
    let stripped = quoted_re().replace_all(&stripped, " ");

    let mut out = Vec::new();
    for m in token_re().find_iter(&stripped) {
        let before = stripped[..m.start()].chars().next_back();
        if before.is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '$' | '{' | '.' | '/' | '@' | ':' | '-')) {
            continue;
        }
        let after = stripped[m.end()..].trim_start().chars().next();
        if matches!(after, Some('(') | Some(':') | Some('.')) {
            continue;
        }
        if !WORD_OPERATORS.contains(&m.as_str()) {
            out.push(m.as_str().to_string());
        }
    }
    out
}

/// `$` not followed by `{`.
fn has_malformed_reference(value: &str) -> bool {
    value
        .match_indices('$')
        .any(|(i, _)| !value[i + 1..].starts_with('{'))
}

pub(crate) fn check_references(ctx: &Context, issues: &mut Vec<ValidationIssue>) {
    let Some(survey) = ctx.survey.read() else { return };
    if !survey.columns.contains("name") {
        return;
    }
    let names = survey.names();

    for located in &survey.records {
        for (column, _, value) in scanned_values(&located.record) {
            for reference in references(value) {
                if names.contains_key(reference.as_str()) {
                    continue;
                }
                let suggestion = closest_match(&reference, names.keys().copied(), ctx.config.suggestion_distance);
                let message = match suggestion {
                    Some(s) => format!(
                        "'${{{}}}' in {} does not match any question (did you mean '${{{}}}'?)",
                        reference, column, s
                    ),
                    None => format!("'${{{}}}' in {} does not match any question", reference, column),
                };
                issues.push(
                    ValidationIssue::new(
                        IssueCode::UnknownReference,
                        message,
                        Location::row(SheetKind::Survey, located.row),
                    )
                    .with_column(column)
                    .suggest(suggestion),
                );
            }
        }
    }
}

pub(crate) fn check_heuristics(ctx: &Context, issues: &mut Vec<ValidationIssue>) {
    let Some(survey) = ctx.survey.read() else { return };
    let names = survey.names();

    for located in &survey.records {
        let own = located.record.name.trim();
        for (column, kind, value) in scanned_values(&located.record) {
            if kind == FormulaKind::Label {
                continue;
            }
            if has_malformed_reference(value) {
                issues.push(
                    ValidationIssue::new(
                        IssueCode::MalformedReference,
                        format!("{} contains '$' without '{{'; references are written ${{name}}", column),
                        Location::row(SheetKind::Survey, located.row),
                    )
                    .with_column(column),
                );
            }
            if !HEURISTIC_KINDS.contains(&kind) {
                continue;
            }
            let mut seen = BTreeSet::new();
            for token in bare_identifiers(value) {
                if token == own || !names.contains_key(token.as_str()) || !seen.insert(token.clone()) {
                    continue;
                }
                issues.push(
                    ValidationIssue::new(
                        IssueCode::BareFieldReference,
                        format!(
                            "{} mentions '{}' without ${{}}; did you mean '${{{}}}'?",
                            column, token, token
                        ),
                        Location::row(SheetKind::Survey, located.row),
                    )
                    .with_column(column)
                    .suggest(Some(&format!("${{{}}}", token))),
                );
            }
        }
    }
}
