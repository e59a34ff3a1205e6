//! Insert survey questions and choice records.

use super::placement::Placement;
use super::rows::SheetWriter;
use crate::columns::{scan_extent, ColumnMap};
use crate::config::EngineConfig;
use crate::error::OpError;
use crate::records::{ChoiceRecord, ChoiceTable, Located, RecordType, SurveyRecord};
use crate::sheet::{Document, Sheet, SheetKind};
use crate::structure::{pair_blocks, parse_structure};
use std::collections::BTreeMap;

fn check_batch_records(records: &[SurveyRecord]) -> Result<(), OpError> {
    for (i, record) in records.iter().enumerate() {
        let Some(kind) = record.record_type() else {
            return Err(OpError::InvalidRecord {
                reason: format!("record {} has no type", i + 1),
            });
        };
        if !kind.is_end() && record.name.trim().is_empty() {
            return Err(OpError::InvalidRecord {
                reason: format!("record {} ('{}') has no name", i + 1, record.type_name.trim()),
            });
        }
    }
    Ok(())
}

/// Insert `records` as consecutive survey rows at `placement`.
///
/// New names must not collide with each other or with any declared name.
/// The batch must be balanced on its own: a `begin` row needs its `end` row
/// in the same batch.
pub fn insert_questions(
    doc: &Document,
    records: &[SurveyRecord],
    placement: &Placement,
    config: &EngineConfig,
) -> Result<Document, OpError> {
    if records.is_empty() {
        return Err(OpError::InvalidRecord {
            reason: "no records to insert".to_string(),
        });
    }
    check_batch_records(records)?;

    let structure = parse_structure(doc, config)?;
    let at = placement.resolve(&structure)?;

    let batch: Vec<Located<SurveyRecord>> = records
        .iter()
        .enumerate()
        .map(|(i, record)| Located {
            row: at + i,
            record: record.clone(),
        })
        .collect();

    let (_, faults) = pair_blocks(&batch);
    if !faults.is_empty() {
        return Err(OpError::UnbalancedStructure { faults });
    }

    let existing = structure.names();
    let mut batch_names: BTreeMap<&str, usize> = BTreeMap::new();
    for located in &batch {
        if located.record.record_type().is_some_and(|t| t.is_end()) {
            continue;
        }
        let name = located.record.name.trim();
        if let Some(rows) = existing.get(name) {
            return Err(OpError::DuplicateName {
                name: name.to_string(),
                list_name: None,
                rows: rows.clone(),
            });
        }
        if let Some(first) = batch_names.insert(name, located.row) {
            return Err(OpError::DuplicateName {
                name: name.to_string(),
                list_name: None,
                rows: vec![first, located.row],
            });
        }
    }

    let mut writer = SheetWriter::new(doc.survey.clone(), SheetKind::Survey, config)?;
    let rows: Vec<Vec<String>> = records.iter().map(|r| writer.survey_row(r)).collect();
    writer.insert_rows(at, rows);

    log::info!(
        "inserted {} survey row(s) at row {} ({:?})",
        records.len(),
        at,
        placement
    );

    let mut next = doc.clone();
    next.survey = writer.into_sheet();
    Ok(next.touched())
}

/// Metadata fields most forms collect, with the labels they get by default.
pub const STANDARD_METADATA: &[(&str, &str)] = &[
    ("start", "Start"),
    ("end", "End"),
    ("today", "Today"),
    ("deviceid", "Device ID"),
    ("subscriberid", "Subscriber ID"),
    ("simserial", "SIM Serial"),
    ("phonenumber", "Phone Number"),
    ("username", "Username"),
];

/// Insert metadata rows (type and name both set to the metadata type)
/// directly under the header. An empty `types` means [`STANDARD_METADATA`].
///
/// Types whose name is already declared are skipped, compared
/// case-insensitively. Returns the new document and the types actually
/// added; when nothing is added the document comes back unchanged.
pub fn insert_metadata(
    doc: &Document,
    types: &[&str],
    config: &EngineConfig,
) -> Result<(Document, Vec<String>), OpError> {
    let wanted: Vec<&str> = if types.is_empty() {
        STANDARD_METADATA.iter().map(|(t, _)| *t).collect()
    } else {
        types.iter().map(|t| t.trim()).collect()
    };
    for ty in &wanted {
        if !RecordType::parse(ty).is_some_and(|t| t.is_metadata()) {
            return Err(OpError::InvalidRecord {
                reason: format!("'{}' is not a metadata type", ty),
            });
        }
    }

    let structure = parse_structure(doc, config)?;
    let declared: Vec<String> = structure.names().into_keys().map(str::to_lowercase).collect();
    let mut records: Vec<SurveyRecord> = Vec::new();
    let mut added: Vec<String> = Vec::new();
    for ty in wanted {
        let name = ty.to_lowercase();
        if declared.contains(&name) || added.contains(&name) {
            log::debug!("metadata '{}' already present", name);
            continue;
        }
        let label = STANDARD_METADATA
            .iter()
            .find(|(t, _)| *t == name)
            .map(|(_, l)| *l)
            .unwrap_or("");
        records.push(SurveyRecord::new(name.as_str(), name.as_str(), label));
        added.push(name);
    }

    if records.is_empty() {
        log::info!("all requested metadata fields already present");
        return Ok((doc.clone(), added));
    }
    let next = insert_questions(doc, &records, &Placement::Start, config)?;
    Ok((next, added))
}

const CHOICES_HEADER: &[&str] = &["list_name", "name", "label"];

/// Insert choice records, each after the last row of its list, or at the end
/// of the sheet for a new list. Creates the choices sheet when absent.
pub fn insert_choices(doc: &Document, choices: &[ChoiceRecord], config: &EngineConfig) -> Result<Document, OpError> {
    if choices.is_empty() {
        return Err(OpError::InvalidRecord {
            reason: "no choices to insert".to_string(),
        });
    }
    for (i, choice) in choices.iter().enumerate() {
        if choice.list_name.trim().is_empty() || choice.name.trim().is_empty() {
            return Err(OpError::InvalidRecord {
                reason: format!("choice {} needs both list_name and name", i + 1),
            });
        }
    }

    let sheet = doc
        .choices
        .clone()
        .unwrap_or_else(|| Sheet::from_strs(&[CHOICES_HEADER]));
    let extent = scan_extent(&sheet, config.blank_threshold);
    let columns = ColumnMap::from_header(sheet.header(), SheetKind::Choices, extent.width)?;
    let table = ChoiceTable::read(&sheet, columns, extent);

    // (list, name) -> rows, for existing rows and then the batch.
    let mut taken: BTreeMap<(String, String), Vec<usize>> = BTreeMap::new();
    for c in &table.records {
        taken
            .entry((c.record.list_name.trim().to_string(), c.record.name.trim().to_string()))
            .or_default()
            .push(c.row);
    }
    let mut batch_seen: BTreeMap<(String, String), usize> = BTreeMap::new();
    for (i, choice) in choices.iter().enumerate() {
        let key = (choice.list_name.trim().to_string(), choice.name.trim().to_string());
        if let Some(rows) = taken.get(&key) {
            return Err(OpError::DuplicateName {
                name: key.1,
                list_name: Some(key.0),
                rows: rows.clone(),
            });
        }
        if batch_seen.insert(key.clone(), i).is_some() {
            return Err(OpError::DuplicateName {
                name: key.1,
                list_name: Some(key.0),
                rows: Vec::new(),
            });
        }
    }

    // Row of each existing choice's list, kept current as rows shift.
    let mut placed: Vec<(String, usize)> = table
        .records
        .iter()
        .map(|c| (c.record.list_name.trim().to_string(), c.row))
        .collect();
    let mut end = table.records.last().map(|c| c.row).unwrap_or(1);

    let mut writer = SheetWriter::new(sheet, SheetKind::Choices, config)?;
    for choice in choices {
        let list = choice.list_name.trim();
        let at = placed
            .iter()
            .filter(|(l, _)| l == list)
            .map(|(_, row)| row + 1)
            .max()
            .unwrap_or(end + 1);
        let row = writer.choice_row(choice);
        writer.insert_rows(at, vec![row]);
        for (_, r) in placed.iter_mut() {
            if *r >= at {
                *r += 1;
            }
        }
        placed.push((list.to_string(), at));
        end += 1;
    }

    log::info!("inserted {} choice row(s)", choices.len());

    let mut next = doc.clone();
    next.choices = Some(writer.into_sheet());
    Ok(next.touched())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::new(
            Sheet::from_strs(&[
                &["type", "name", "label"],
                &["text", "a", "A"],
                &["begin group", "g", "G"],
                &["text", "b", "B"],
                &["end group", "", ""],
            ]),
            Some(Sheet::from_strs(&[
                &["list_name", "name", "label"],
                &["yn", "yes", "Yes"],
                &["yn", "no", "No"],
                &["color", "red", "Red"],
            ])),
            None,
        )
    }

    fn names(d: &Document) -> Vec<String> {
        parse_structure(d, &EngineConfig::default())
            .unwrap()
            .records
            .iter()
            .map(|r| r.record.name.clone())
            .collect()
    }

    #[test]
    fn insert_inside_block_lands_before_end_row() {
        let d = doc();
        let next = insert_questions(
            &d,
            &[SurveyRecord::new("integer", "c", "C")],
            &Placement::Inside("g".into()),
            &EngineConfig::default(),
        )
        .unwrap();
        assert_eq!(names(&next), ["a", "g", "b", "c", ""]);
        assert!(next.is_dirty());
        assert!(!d.is_dirty());
    }

    #[test]
    fn duplicate_name_is_rejected_and_document_untouched() {
        let d = doc();
        let before = d.clone();
        let err = insert_questions(
            &d,
            &[SurveyRecord::new("text", "b", "Again")],
            &Placement::End,
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            OpError::DuplicateName {
                name: "b".into(),
                list_name: None,
                rows: vec![4]
            }
        );
        assert_eq!(d, before);
    }

    #[test]
    fn batch_duplicates_and_unbalanced_batches_fail() {
        let d = doc();
        let config = EngineConfig::default();
        let err = insert_questions(
            &d,
            &[SurveyRecord::new("text", "x", "X"), SurveyRecord::new("text", "x", "X2")],
            &Placement::End,
            &config,
        )
        .unwrap_err();
        assert_eq!(
            err,
            OpError::DuplicateName {
                name: "x".into(),
                list_name: None,
                rows: vec![6, 7]
            }
        );

        let err = insert_questions(
            &d,
            &[SurveyRecord::new("begin repeat", "r", "R")],
            &Placement::End,
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, OpError::UnbalancedStructure { .. }));
    }

    #[test]
    fn block_batch_keeps_extra_columns() {
        let d = doc();
        let mut inner = SurveyRecord::new("text", "note_x", "Note");
        inner.set("media::image", "pic.png");
        let next = insert_questions(
            &d,
            &[
                SurveyRecord::new("begin repeat", "r", "R"),
                inner,
                SurveyRecord::new("end repeat", "", ""),
            ],
            &Placement::After("a".into()),
            &EngineConfig::default(),
        )
        .unwrap();
        assert_eq!(next.survey.header(), ["type", "name", "label", "media::image"]);
        assert_eq!(next.survey.cell(4, 3), "pic.png");
        assert_eq!(names(&next), ["a", "r", "note_x", "", "g", "b", ""]);
    }

    #[test]
    fn metadata_goes_under_the_header_and_skips_present_names() {
        let d = Document::new(
            Sheet::from_strs(&[
                &["type", "name", "label"],
                &["today", "Today", ""],
                &["text", "a", "A"],
            ]),
            None,
            None,
        );
        let (next, added) = insert_metadata(&d, &["start", "end", "today"], &EngineConfig::default()).unwrap();
        assert_eq!(added, ["start", "end"]);
        assert_eq!(next.survey.row(2), ["start", "start", "Start"]);
        assert_eq!(next.survey.row(3), ["end", "end", "End"]);
        assert_eq!(names(&next), ["start", "end", "Today", "a"]);
    }

    #[test]
    fn standard_metadata_is_the_default_set() {
        let d = Document::new(Sheet::from_strs(&[&["type", "name", "label"]]), None, None);
        let config = EngineConfig::default();
        let (next, added) = insert_metadata(&d, &[], &config).unwrap();
        assert_eq!(added.len(), STANDARD_METADATA.len());
        assert_eq!(next.survey.cell(9, 0), "username");

        let (again, added) = insert_metadata(&next, &[], &config).unwrap();
        assert!(added.is_empty());
        assert_eq!(again, next);
    }

    #[test]
    fn non_metadata_types_are_rejected() {
        let err = insert_metadata(&doc(), &["integer"], &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, OpError::InvalidRecord { .. }));
    }

    #[test]
    fn choices_go_after_their_list() {
        let d = doc();
        let next = insert_choices(
            &d,
            &[
                ChoiceRecord::new("yn", "maybe", "Maybe"),
                ChoiceRecord::new("size", "s", "Small"),
                ChoiceRecord::new("color", "blue", "Blue"),
            ],
            &EngineConfig::default(),
        )
        .unwrap();
        let choices = next.choices.as_ref().unwrap();
        let order: Vec<&str> = (2..=choices.row_count()).map(|r| choices.cell(r, 1)).collect();
        assert_eq!(order, ["yes", "no", "maybe", "red", "blue", "s"]);
    }

    #[test]
    fn choice_name_unique_per_list_only() {
        let d = doc();
        let config = EngineConfig::default();
        assert!(insert_choices(&d, &[ChoiceRecord::new("color", "yes", "Yes")], &config).is_ok());
        let err = insert_choices(&d, &[ChoiceRecord::new("yn", "yes", "Yes")], &config).unwrap_err();
        assert_eq!(
            err,
            OpError::DuplicateName {
                name: "yes".into(),
                list_name: Some("yn".into()),
                rows: vec![2]
            }
        );
    }

    #[test]
    fn missing_choices_sheet_is_created() {
        let d = Document::new(Sheet::from_strs(&[&["type", "name", "label"]]), None, None);
        let next = insert_choices(&d, &[ChoiceRecord::new("yn", "yes", "Yes")], &EngineConfig::default()).unwrap();
        let choices = next.choices.unwrap();
        assert_eq!(choices.header(), ["list_name", "name", "label"]);
        assert_eq!(choices.row(2), ["yn", "yes", "Yes"]);
    }
}
