//! Mutator scenarios: dependency warnings, block integrity, round trips.

use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use xlsform_core::validate::IssueCode;
use xlsform_core::{
    insert_questions, move_question, parse_structure, remove, update_question, validate, DependencyIndex, Document,
    EngineConfig, OpError, Placement, RemoveOptions, RemoveOutcome, RemoveScope, Severity, Sheet, SurveyRecord,
};

fn household() -> Document {
    Document::new(
        Sheet::from_strs(&[
            &["type", "name", "label", "relevant"],
            &["integer", "age", "Age", ""],
            &["text", "town", "Town", ""],
            &["text", "phone", "Phone", ""],
            &["begin group", "work", "Work", ""],
            &["text", "job", "Job", ""],
            &["decimal", "income", "Income", ""],
            &["end group", "work", "", ""],
            &["text", "remarks", "Remarks", ""],
            &["note", "adult", "Adult respondent", "${age} >= 18"],
        ]),
        Some(Sheet::from_strs(&[&["list_name", "name", "label"], &["yn", "yes", "Yes"]])),
        Some(Sheet::from_strs(&[&["form_title", "form_id"], &["Household", "household"]])),
    )
}

fn names(doc: &Document) -> Vec<String> {
    parse_structure(doc, &EngineConfig::default())
        .unwrap()
        .records
        .iter()
        .map(|r| r.record.name.clone())
        .collect()
}

#[test]
fn dependency_index_sees_relevant_reference() {
    let index = DependencyIndex::build(&household());
    let edges = index.dependents_of("age");
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].row, 10);
    assert_eq!(edges[0].column, "relevant");
    assert_eq!(edges[0].from, "adult");
}

#[test]
fn every_scanned_column_yields_an_edge() {
    let columns = [
        "relevant",
        "constraint",
        "calculation",
        "choice_filter",
        "repeat_count",
        "required",
        "default",
        "label",
        "hint",
        "constraint_message",
        "required_message",
        "label::fr",
    ];
    let mut header = vec!["type".to_string(), "name".to_string()];
    header.extend(columns.iter().map(|c| c.to_string()));
    let mut rows = vec![header, vec!["integer".to_string(), "x".to_string()]];
    for (i, _) in columns.iter().enumerate() {
        let mut row = vec!["text".to_string(), format!("q{}", i)];
        row.resize(2 + columns.len(), String::new());
        row[2 + i] = "${x} != ''".to_string();
        rows.push(row);
    }
    let doc = Document::new(Sheet::new(rows), None, None);

    let index = DependencyIndex::build(&doc);
    let edges = index.dependents_of("x");
    let seen: Vec<(&str, usize)> = edges.iter().map(|e| (e.column.as_str(), e.row)).collect();
    let expected: Vec<(&str, usize)> = columns.iter().enumerate().map(|(i, c)| (*c, i + 3)).collect();
    assert_eq!(seen, expected);
    assert!(edges.iter().enumerate().all(|(i, e)| e.from == format!("q{}", i)));
}

#[test]
fn references_inside_a_removed_block_need_no_confirmation() {
    let doc = Document::new(
        Sheet::from_strs(&[
            &["type", "name", "label", "relevant"],
            &["text", "before", "Before", ""],
            &["begin group", "g", "G", ""],
            &["integer", "count", "Count", ""],
            &["note", "echo", "You said ${count}", "${count} > 0"],
            &["end group", "g", "", ""],
        ]),
        None,
        None,
    );
    let config = EngineConfig::default();
    let cascade = RemoveOptions {
        confirm: false,
        cascade: true,
    };

    let outcome = remove(&doc, "g", RemoveScope::Question, &cascade, &config).unwrap();
    let next = outcome.into_document().expect("removed without a warning");
    assert_eq!(names(&next), ["before"]);

    // A reference from outside the block still has to be confirmed.
    let mut outside = doc.clone();
    outside.survey.set_cell(2, 3, "${count} > 1");
    let outcome = remove(&outside, "g", RemoveScope::Question, &cascade, &config).unwrap();
    let RemoveOutcome::NeedsConfirmation(warning) = outcome else {
        panic!("expected a dependency warning");
    };
    assert_eq!(warning.rows(), vec![2]);
}

#[test]
fn removing_referenced_question_warns_then_confirms() {
    let doc = household();
    let config = EngineConfig::default();

    let outcome = remove(&doc, "age", RemoveScope::Question, &RemoveOptions::default(), &config).unwrap();
    let RemoveOutcome::NeedsConfirmation(warning) = outcome else {
        panic!("expected a dependency warning");
    };
    assert_eq!(warning.target, "age");
    assert_eq!(warning.rows(), vec![10]);

    let confirm = RemoveOptions {
        confirm: true,
        ..Default::default()
    };
    let next = remove(&doc, "age", RemoveScope::Question, &confirm, &config)
        .unwrap()
        .into_document()
        .unwrap();
    assert_eq!(&next.survey.rows()[1..], &doc.survey.rows()[2..]);
    assert_eq!(next.survey.header(), doc.survey.header());
    assert!(next.is_dirty());
}

#[test]
fn non_empty_block_removal_lists_inner_rows() {
    let err = remove(
        &household(),
        "work",
        RemoveScope::Question,
        &RemoveOptions::default(),
        &EngineConfig::default(),
    )
    .unwrap_err();
    let OpError::StructuralRemoval {
        begin_row,
        end_row,
        inner_rows,
        ..
    } = err
    else {
        panic!("expected a structural removal error, got {:?}", err);
    };
    assert_eq!((begin_row, end_row, inner_rows), (Some(5), Some(8), vec![6, 7]));
}

#[test]
fn remove_then_reinsert_restores_the_document() {
    let doc = household();
    let config = EngineConfig::default();
    let original = parse_structure(&doc, &config).unwrap().record(4).cloned().unwrap();

    let removed = remove(&doc, "phone", RemoveScope::Question, &RemoveOptions::default(), &config)
        .unwrap()
        .into_document()
        .unwrap();
    assert_ne!(removed, doc);

    let restored = insert_questions(&removed, &[original], &Placement::After("town".into()), &config).unwrap();
    assert_eq!(restored, doc);
}

#[test]
fn moving_a_block_keeps_it_whole_and_valid() {
    let doc = household();
    let config = EngineConfig::default();
    let next = move_question(&doc, "work", &Placement::After("adult".into()), &config).unwrap();
    assert_eq!(
        names(&next),
        ["age", "town", "phone", "remarks", "adult", "work", "job", "income", "work"]
    );
    assert!(parse_structure(&next, &config).unwrap().is_balanced());
    assert!(validate(&next).iter().all(|i| i.severity != Severity::Error));

    let err = move_question(&doc, "work", &Placement::Inside("work".into()), &config).unwrap_err();
    assert!(matches!(err, OpError::StructuralMove { .. }));
}

#[test]
fn names_stay_unique_after_insert_and_update() {
    let doc = household();
    let config = EngineConfig::default();

    let next = insert_questions(
        &doc,
        &[SurveyRecord::new("integer", "hours", "Hours worked")],
        &Placement::Inside("work".into()),
        &config,
    )
    .unwrap();
    assert_eq!(&names(&next)[4..8], ["job", "income", "hours", "work"]);

    let mut rename = BTreeMap::new();
    rename.insert("name".to_string(), "job".to_string());
    let err = update_question(&next, "hours", &rename, &config).unwrap_err();
    assert!(matches!(err, OpError::DuplicateName { ref rows, .. } if rows == &vec![6]));

    let duplicates: Vec<_> = validate(&next)
        .into_iter()
        .filter(|i| i.severity == Severity::Error && i.code == IssueCode::DuplicateName)
        .collect();
    assert!(duplicates.is_empty());
}
