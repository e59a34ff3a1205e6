//! Mutating subcommands: add, add-choices, add-metadata, update, move,
//! remove, settings.
//!
//! Payload rows are JSON objects keyed by column header, exactly as they
//! would appear in the sheet:
//!
//! ```json
//! [{"type": "integer", "name": "age", "label": "Age", "label::fr": "Âge"}]
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::process;

use serde::Deserialize;
use xlsform_core::{
    insert_choices, insert_metadata, insert_questions, move_question, remove, update_question, update_settings, ChoiceRecord,
    Document, OpError, Placement, RemoveOptions, RemoveOutcome, RemoveScope, SurveyRecord,
};

use super::Session;
use crate::{report_error, OutputFormat};

type Row = BTreeMap<String, serde_json::Value>;

#[derive(Deserialize)]
#[serde(untagged)]
enum Payload {
    Rows(Vec<Row>),
    Questions { questions: Vec<Row> },
    Choices { choices: Vec<Row> },
}

impl Payload {
    fn into_rows(self) -> Vec<Row> {
        match self {
            Payload::Rows(rows) | Payload::Questions { questions: rows } | Payload::Choices { choices: rows } => rows,
        }
    }
}

fn cell_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn survey_record(row: &Row) -> SurveyRecord {
    let mut record = SurveyRecord::default();
    for (column, value) in row {
        record.set(column, &cell_value(value));
    }
    record
}

pub(crate) fn choice_record(row: &Row) -> ChoiceRecord {
    let mut record = ChoiceRecord::default();
    for (column, value) in row {
        record.set(column, &cell_value(value));
    }
    record
}

fn read_payload(session: &Session, path: &Path) -> Vec<Row> {
    let parsed = std::fs::read_to_string(path)
        .map_err(|e| format!("error reading payload '{}': {}", path.display(), e))
        .and_then(|content| {
            serde_json::from_str::<Payload>(&content)
                .map_err(|e| format!("error parsing payload '{}': {}", path.display(), e))
        });
    match parsed {
        Ok(payload) => payload.into_rows(),
        Err(msg) => {
            report_error(&msg, session.output, session.quiet);
            process::exit(1);
        }
    }
}

/// Parse `COLUMN=VALUE` assignments.
pub(crate) fn parse_assignments(pairs: &[String]) -> Result<BTreeMap<String, String>, String> {
    let mut changes = BTreeMap::new();
    for pair in pairs {
        let Some((column, value)) = pair.split_once('=') else {
            return Err(format!("invalid assignment '{}'; expected COLUMN=VALUE", pair));
        };
        let column = column.trim();
        if column.is_empty() {
            return Err(format!("invalid assignment '{}'; the column name is empty", pair));
        }
        changes.insert(column.to_string(), value.to_string());
    }
    Ok(changes)
}

fn assignments(session: &Session, pairs: &[String]) -> BTreeMap<String, String> {
    match parse_assignments(pairs) {
        Ok(changes) => changes,
        Err(msg) => {
            report_error(&msg, session.output, session.quiet);
            process::exit(1);
        }
    }
}

/// Placement from the mutually exclusive position flags; `End` when none is set.
pub(crate) fn placement(after: Option<String>, inside: Option<String>, start: bool, end: bool) -> Placement {
    match (after, inside) {
        (Some(name), _) => Placement::After(name),
        (None, Some(name)) => Placement::Inside(name),
        (None, None) if start && !end => Placement::Start,
        (None, None) => Placement::End,
    }
}

/// Persist a successful edit and report where it went.
fn commit(session: &Session, result: Result<Document, OpError>, action: &str, out: Option<&Path>) {
    let doc = match result {
        Ok(doc) => doc,
        Err(e) => session.fail(&e),
    };
    let path = session.save(&doc, out);
    if session.quiet {
        return;
    }
    match session.output {
        OutputFormat::Json => session.print_json(&serde_json::json!({
            "ok": true,
            "action": action,
            "written": path.display().to_string(),
        })),
        OutputFormat::Text => println!("{}; wrote {}", action, path.display()),
    }
}

pub(crate) fn cmd_add(session: &Session, payload: &Path, placement: &Placement, out: Option<&Path>) {
    let records: Vec<SurveyRecord> = read_payload(session, payload).iter().map(survey_record).collect();
    let doc = session.load();
    let result = insert_questions(&doc, &records, placement, &session.engine);
    commit(session, result, &format!("inserted {} row(s)", records.len()), out);
}

pub(crate) fn cmd_add_choices(session: &Session, payload: &Path, out: Option<&Path>) {
    let choices: Vec<ChoiceRecord> = read_payload(session, payload).iter().map(choice_record).collect();
    let doc = session.load();
    let result = insert_choices(&doc, &choices, &session.engine);
    commit(session, result, &format!("inserted {} choice(s)", choices.len()), out);
}

pub(crate) fn cmd_add_metadata(session: &Session, types: &[String], out: Option<&Path>) {
    let types: Vec<&str> = types.iter().map(String::as_str).collect();
    let doc = session.load();
    let (next, added) = match insert_metadata(&doc, &types, &session.engine) {
        Ok(result) => result,
        Err(e) => session.fail(&e),
    };
    if added.is_empty() {
        if session.quiet {
            return;
        }
        match session.output {
            OutputFormat::Json => session.print_json(&serde_json::json!({ "ok": true, "added": added })),
            OutputFormat::Text => println!("metadata fields already present; nothing written"),
        }
        return;
    }
    commit(session, Ok(next), &format!("added metadata {}", added.join(", ")), out);
}

pub(crate) fn cmd_update(session: &Session, target: &str, pairs: &[String], out: Option<&Path>) {
    let changes = assignments(session, pairs);
    let doc = session.load();
    let result = update_question(&doc, target, &changes, &session.engine);
    commit(session, result, &format!("updated '{}'", target), out);
}

pub(crate) fn cmd_move(session: &Session, target: &str, placement: &Placement, out: Option<&Path>) {
    let doc = session.load();
    let result = move_question(&doc, target, placement, &session.engine);
    commit(session, result, &format!("moved '{}'", target), out);
}

pub(crate) fn cmd_settings(session: &Session, pairs: &[String], out: Option<&Path>) {
    let changes = assignments(session, pairs);
    let doc = session.load();
    let result = update_settings(&doc, &changes, &session.engine);
    commit(session, result, &format!("updated {} setting(s)", changes.len()), out);
}

/// Exit status 2 when the removal needs `--yes`.
pub(crate) fn cmd_remove(
    session: &Session,
    target: &str,
    scope: RemoveScope,
    options: &RemoveOptions,
    out: Option<&Path>,
) {
    let doc = session.load();
    let outcome = match remove(&doc, target, scope, options, &session.engine) {
        Ok(outcome) => outcome,
        Err(e) => session.fail(&e),
    };
    match outcome {
        RemoveOutcome::Removed(next) => commit(session, Ok(next), &format!("removed '{}'", target), out),
        RemoveOutcome::NeedsConfirmation(warning) => {
            match session.output {
                OutputFormat::Json => session.print_json(&serde_json::json!({
                    "ok": false,
                    "needs_confirmation": true,
                    "warning": warning,
                })),
                OutputFormat::Text => {
                    if !session.quiet {
                        println!("{}", warning);
                        println!("nothing removed; rerun with --yes to remove anyway");
                    }
                }
            }
            process::exit(2);
        }
    }
}
