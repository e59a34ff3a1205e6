//! Column updates on one named survey row.

use super::rows::SheetWriter;
use super::{reject_new_faults, single_row};
use super::RowShift;
use crate::columns::{canonical_column, scan_extent, ColumnMap};
use crate::config::EngineConfig;
use crate::error::OpError;
use crate::records::{ChoiceTable, RecordType, SURVEY_FIELDS};
use crate::sheet::{Document, SheetKind};
use crate::similarity::closest_match;
use crate::structure::{parse_structure, FormStructure};
use std::collections::BTreeMap;

/// List names defined in the choices sheet.
fn defined_lists(doc: &Document, config: &EngineConfig) -> Result<Vec<String>, OpError> {
    let Some(sheet) = doc.choices.as_ref() else {
        return Ok(Vec::new());
    };
    let extent = scan_extent(sheet, config.blank_threshold);
    let columns = ColumnMap::from_header(sheet.header(), SheetKind::Choices, extent.width)?;
    let table = ChoiceTable::read(sheet, columns, extent);
    Ok(table.lists().into_keys().map(str::to_string).collect())
}

fn check_new_name(structure: &FormStructure, row: usize, new_name: &str, is_end: bool) -> Result<(), OpError> {
    if new_name.is_empty() {
        if is_end {
            return Ok(());
        }
        return Err(OpError::InvalidRecord {
            reason: format!("row {} cannot have an empty name", row),
        });
    }
    if is_end {
        return Ok(());
    }
    let clashes: Vec<usize> = structure
        .rows_named(new_name)
        .into_iter()
        .filter(|r| *r != row)
        .collect();
    if clashes.is_empty() {
        Ok(())
    } else {
        Err(OpError::DuplicateName {
            name: new_name.to_string(),
            list_name: None,
            rows: clashes,
        })
    }
}

/// Key every change by its logical column, so `Name` and `name` are one key.
fn logical_changes(changes: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>, OpError> {
    let mut mapped = BTreeMap::new();
    for (column, value) in changes {
        let logical = canonical_column(column, SURVEY_FIELDS);
        if logical.is_empty() {
            return Err(OpError::InvalidRecord {
                reason: "column names cannot be empty".to_string(),
            });
        }
        if mapped.insert(logical.clone(), value.clone()).is_some() {
            return Err(OpError::InvalidRecord {
                reason: format!("column '{}' is assigned more than once", logical),
            });
        }
    }
    Ok(mapped)
}

/// Apply `changes` (column -> value, "" clears) to the row declaring `target`.
///
/// A new name must be unique and a new select type must reference an
/// existing list. Renaming a group or repeat also renames its end row when
/// the end row carried the old name.
pub fn update_question(
    doc: &Document,
    target: &str,
    changes: &BTreeMap<String, String>,
    config: &EngineConfig,
) -> Result<Document, OpError> {
    let mapped = logical_changes(changes)?;
    let changes = &mapped;
    let structure = parse_structure(doc, config)?;
    let row = single_row(&structure, target)?.ok_or_else(|| OpError::NotFound {
        sheet: SheetKind::Survey,
        name: target.to_string(),
    })?;
    let Some(current) = structure.record(row) else {
        return Err(OpError::NotFound {
            sheet: SheetKind::Survey,
            name: target.to_string(),
        });
    };

    let mut updated = current.clone();
    for (column, value) in changes {
        updated.set(column, value);
    }
    let new_type = updated.record_type();

    if changes.contains_key("type") {
        let Some(kind) = &new_type else {
            return Err(OpError::InvalidRecord {
                reason: format!("row {} cannot have an empty type", row),
            });
        };
        if let Some((list, _)) = kind.choice_list() {
            let lists = defined_lists(doc, config)?;
            if !lists.iter().any(|l| l == list) {
                let suggestion = closest_match(list, lists.iter().map(String::as_str), config.suggestion_distance);
                return Err(OpError::MissingChoiceList {
                    list_name: list.to_string(),
                    row,
                    suggestion: suggestion.map(str::to_string),
                });
            }
        }
    }

    let old_name = current.name.trim();
    let new_name = updated.name.trim();
    let renamed = changes.contains_key("name") && new_name != old_name;
    if renamed {
        check_new_name(&structure, row, new_name, new_type.as_ref().is_some_and(RecordType::is_end))?;
    }

    let mut writer = SheetWriter::new(doc.survey.clone(), SheetKind::Survey, config)?;
    let mut changed = 0usize;
    for (column, value) in changes {
        if writer.write_cell(row, column, value) {
            changed += 1;
        }
    }

    if renamed {
        if let Some(end_row) = structure
            .block_at(row)
            .filter(|b| b.end_name.as_deref() == Some(old_name))
            .and_then(|b| b.end_row)
        {
            writer.write_cell(end_row, "name", new_name);
        }
    }

    let mut next = doc.clone();
    next.survey = writer.into_sheet();
    reject_new_faults(&structure, &next, RowShift::Unchanged, config)?;

    log::info!("updated '{}' at row {} ({} cell(s) changed)", target, row, changed);
    Ok(next.touched())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::Sheet;

    fn doc() -> Document {
        Document::new(
            Sheet::from_strs(&[
                &["type", "name", "label", "hint"],
                &["text", "a", "A", "keep me"],
                &["begin group", "g", "G", ""],
                &["integer", "b", "B", ""],
                &["end group", "g", "", ""],
            ]),
            Some(Sheet::from_strs(&[&["list_name", "name", "label"], &["fruits", "apple", "Apple"]])),
            None,
        )
    }

    fn changes(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn only_named_columns_change() {
        let d = doc();
        let next = update_question(
            &d,
            "a",
            &changes(&[("label", "Alpha"), ("relevant", "${b} > 1")]),
            &EngineConfig::default(),
        )
        .unwrap();
        assert_eq!(next.survey.row(2), ["text", "a", "Alpha", "keep me", "${b} > 1"]);
        assert_eq!(next.survey.header()[4], "relevant");
        assert_eq!(next.survey.row(4), d.survey.row(4));
    }

    #[test]
    fn unknown_target_is_not_found() {
        let err = update_question(&doc(), "zz", &changes(&[("label", "x")]), &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, OpError::NotFound { sheet: SheetKind::Survey, .. }));
    }

    #[test]
    fn rename_checks_uniqueness() {
        let err = update_question(&doc(), "a", &changes(&[("name", "b")]), &EngineConfig::default()).unwrap_err();
        assert_eq!(
            err,
            OpError::DuplicateName {
                name: "b".into(),
                list_name: None,
                rows: vec![4]
            }
        );
    }

    #[test]
    fn select_type_needs_an_existing_list() {
        let err = update_question(
            &doc(),
            "a",
            &changes(&[("type", "select_one fruit")]),
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            OpError::MissingChoiceList {
                list_name: "fruit".into(),
                row: 2,
                suggestion: Some("fruits".into())
            }
        );
        assert!(update_question(
            &doc(),
            "a",
            &changes(&[("type", "select_one fruits")]),
            &EngineConfig::default()
        )
        .is_ok());
    }

    #[test]
    fn renaming_a_block_renames_its_end_row() {
        let next = update_question(&doc(), "g", &changes(&[("name", "grp")]), &EngineConfig::default()).unwrap();
        assert_eq!(next.survey.cell(3, 1), "grp");
        assert_eq!(next.survey.cell(5, 1), "grp");
    }

    #[test]
    fn differently_cased_keys_get_the_same_checks() {
        let err = update_question(&doc(), "a", &changes(&[("Name", "b")]), &EngineConfig::default()).unwrap_err();
        assert_eq!(
            err,
            OpError::DuplicateName {
                name: "b".into(),
                list_name: None,
                rows: vec![4]
            }
        );
        let err = update_question(
            &doc(),
            "a",
            &changes(&[("TYPE", "select_one nowhere")]),
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, OpError::MissingChoiceList { row: 2, .. }));

        let next = update_question(&doc(), "a", &changes(&[("Name", "alpha")]), &EngineConfig::default()).unwrap();
        assert_eq!(next.survey.header(), ["type", "name", "label", "hint"]);
        assert_eq!(next.survey.cell(2, 1), "alpha");
    }

    #[test]
    fn one_column_assigned_twice_is_rejected() {
        let err = update_question(
            &doc(),
            "a",
            &changes(&[("name", "x"), ("Name", "y")]),
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, OpError::InvalidRecord { .. }));
    }

    #[test]
    fn trading_one_fault_for_another_is_rejected() {
        let broken = Document::new(
            Sheet::from_strs(&[
                &["type", "name", "label"],
                &["begin group", "g", "G"],
                &["text", "a", "A"],
            ]),
            None,
            None,
        );
        let config = EngineConfig::default();
        let err = update_question(&broken, "g", &changes(&[("type", "end repeat")]), &config).unwrap_err();
        assert!(matches!(
            err,
            OpError::UnbalancedStructure { ref faults } if faults.len() == 1
        ));
        // Edits that leave the existing fault alone still go through.
        let next = update_question(&broken, "a", &changes(&[("label", "Alpha")]), &config).unwrap();
        assert_eq!(next.survey.cell(3, 2), "Alpha");
    }

    #[test]
    fn structural_type_change_that_unbalances_is_rejected() {
        let err = update_question(&doc(), "b", &changes(&[("type", "begin repeat")]), &EngineConfig::default())
            .unwrap_err();
        assert!(matches!(err, OpError::UnbalancedStructure { .. }));
    }
}
