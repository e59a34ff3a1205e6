//! Remove questions, blocks and choice lists.
//!
//! Removal asks before it breaks anything: when other rows still reference
//! what is being removed, the first call returns a [`DependencyWarning`] and
//! the caller retries with [`RemoveOptions::confirm`] set.

use super::{reject_new_faults, single_row, RowShift};
use crate::columns::{scan_extent, ColumnMap};
use crate::config::EngineConfig;
use crate::deps::DependencyIndex;
use crate::error::OpError;
use crate::records::ChoiceTable;
use crate::sheet::{Document, SheetKind};
use crate::structure::{parse_structure, FormStructure};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveScope {
    /// The survey row (or block) declaring the target name.
    #[default]
    Question,
    /// Every choice row whose `list_name` is the target.
    ChoiceList,
    /// A select question together with the list it draws from.
    Both,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RemoveOptions {
    /// Proceed even though other rows reference the target.
    pub confirm: bool,
    /// Remove a non-empty block together with its contents.
    pub cascade: bool,
}

/// One row that would be left pointing at something removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub sheet: SheetKind,
    pub row: usize,
    /// Name of the referencing row (may be empty).
    pub name: String,
    /// Column holding the reference.
    pub via: String,
    /// What it references: a field name or a list name.
    pub target: String,
}

/// Non-fatal result: the removal was not performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyWarning {
    pub target: String,
    pub references: Vec<Reference>,
}

impl DependencyWarning {
    pub fn rows(&self) -> Vec<usize> {
        let mut rows: Vec<usize> = self.references.iter().map(|r| r.row).collect();
        rows.dedup();
        rows
    }
}

impl fmt::Display for DependencyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' is still referenced by {} row(s); confirm to remove anyway:",
            self.target,
            self.rows().len()
        )?;
        for r in &self.references {
            write!(f, "\n  {} row {}", r.sheet, r.row)?;
            if !r.name.is_empty() {
                write!(f, " ('{}')", r.name)?;
            }
            write!(f, ": {} uses '{}'", r.via, r.target)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed(Document),
    NeedsConfirmation(DependencyWarning),
}

impl RemoveOutcome {
    pub fn into_document(self) -> Option<Document> {
        match self {
            RemoveOutcome::Removed(doc) => Some(doc),
            RemoveOutcome::NeedsConfirmation(_) => None,
        }
    }
}

// ── Planning ────────────────────────────────────────────────────────

/// Survey rows `first..=last` to drop.
struct QuestionPlan {
    first: usize,
    last: usize,
    references: Vec<Reference>,
}

/// Choice rows to drop, ascending.
struct ListPlan {
    rows: Vec<usize>,
    references: Vec<Reference>,
}

fn structural_removal(
    name: &str,
    reason: String,
    begin_row: Option<usize>,
    end_row: Option<usize>,
    inner_rows: Vec<usize>,
) -> OpError {
    OpError::StructuralRemoval {
        name: name.to_string(),
        reason,
        begin_row,
        end_row,
        inner_rows,
    }
}

fn plan_question(
    structure: &FormStructure,
    target: &str,
    options: &RemoveOptions,
) -> Result<QuestionPlan, OpError> {
    let Some(row) = single_row(structure, target)? else {
        if let Some(&end_row) = structure.end_rows_named(target).first() {
            let begin_row = structure.block_ending_at(end_row).map(|b| b.begin_row);
            return Err(structural_removal(
                target,
                format!("'{}' only names the end row {}; remove the block by its begin row", target, end_row),
                begin_row,
                Some(end_row),
                Vec::new(),
            ));
        }
        return Err(OpError::NotFound {
            sheet: SheetKind::Survey,
            name: target.to_string(),
        });
    };

    let (first, last) = match structure.block_at(row) {
        None => (row, row),
        Some(span) => {
            let inner = structure.inner_rows(span);
            let Some(end) = span.end_row else {
                return Err(structural_removal(
                    target,
                    format!(
                        "begin {} at row {} has no matching end row; removing it alone would leave the sheet unbalanced",
                        span.kind.as_str(),
                        row
                    ),
                    Some(row),
                    None,
                    inner,
                ));
            };
            if !inner.is_empty() && !options.cascade {
                return Err(structural_removal(
                    target,
                    format!(
                        "{} {} still contains {} row(s); remove them first or cascade",
                        span.kind.as_str(),
                        target,
                        inner.len()
                    ),
                    Some(row),
                    Some(end),
                    inner,
                ));
            }
            (row, end)
        }
    };

    let index = DependencyIndex::from_structure(structure);
    let inside = |r: usize| r >= first && r <= last;
    let mut references = Vec::new();
    for located in structure.records.iter().filter(|r| inside(r.row)) {
        if located.record.record_type().is_some_and(|t| t.is_end()) {
            continue;
        }
        let name = located.record.name.trim();
        if name.is_empty() {
            continue;
        }
        for edge in index.external_dependents(name, inside) {
            references.push(Reference {
                sheet: SheetKind::Survey,
                row: edge.row,
                name: edge.from.clone(),
                via: edge.column.clone(),
                target: name.to_string(),
            });
        }
    }
    references.sort_by(|a, b| (a.row, &a.via).cmp(&(b.row, &b.via)));

    Ok(QuestionPlan {
        first,
        last,
        references,
    })
}

fn read_choices(doc: &Document, config: &EngineConfig) -> Result<Option<ChoiceTable>, OpError> {
    let Some(sheet) = doc.choices.as_ref() else {
        return Ok(None);
    };
    let extent = scan_extent(sheet, config.blank_threshold);
    let columns = ColumnMap::from_header(sheet.header(), SheetKind::Choices, extent.width)?;
    Ok(Some(ChoiceTable::read(sheet, columns, extent)))
}

/// `None` when the list has no rows.
fn plan_list(
    table: Option<&ChoiceTable>,
    structure: &FormStructure,
    list: &str,
) -> Option<ListPlan> {
    let rows: Vec<usize> = table?
        .records
        .iter()
        .filter(|c| c.record.list_name.trim() == list)
        .map(|c| c.row)
        .collect();
    if rows.is_empty() {
        return None;
    }

    let references = structure
        .records
        .iter()
        .filter(|r| {
            r.record
                .record_type()
                .is_some_and(|t| t.choice_list().is_some_and(|(l, _)| l == list))
        })
        .map(|r| Reference {
            sheet: SheetKind::Survey,
            row: r.row,
            name: r.record.name.trim().to_string(),
            via: "type".to_string(),
            target: list.to_string(),
        })
        .collect();
    Some(ListPlan { rows, references })
}

// ── Removal ─────────────────────────────────────────────────────────

/// Remove `target` under `scope`.
///
/// For [`RemoveScope::ChoiceList`] the target is a list name; otherwise it
/// is a survey name. Returns [`RemoveOutcome::NeedsConfirmation`] without
/// changing anything when references exist and `options.confirm` is unset.
pub fn remove(
    doc: &Document,
    target: &str,
    scope: RemoveScope,
    options: &RemoveOptions,
    config: &EngineConfig,
) -> Result<RemoveOutcome, OpError> {
    let structure = parse_structure(doc, config)?;
    let table = read_choices(doc, config)?;

    let (question, list) = match scope {
        RemoveScope::Question => (Some(plan_question(&structure, target, options)?), None),
        RemoveScope::ChoiceList => {
            let plan = plan_list(table.as_ref(), &structure, target).ok_or_else(|| OpError::NotFound {
                sheet: SheetKind::Choices,
                name: target.to_string(),
            })?;
            (None, Some(plan))
        }
        RemoveScope::Both => {
            let plan = plan_question(&structure, target, options)?;
            let list_name = structure
                .record_type(plan.first)
                .and_then(|t| t.choice_list().map(|(l, _)| l.to_string()))
                .ok_or_else(|| OpError::InvalidRecord {
                    reason: format!("'{}' is not a select question, so it has no choice list", target),
                })?;
            let list = plan_list(table.as_ref(), &structure, &list_name);
            if list.is_none() {
                log::debug!("list '{}' has no choice rows; removing the question only", list_name);
            }
            (Some(plan), list)
        }
    };

    let mut references: Vec<Reference> = Vec::new();
    if let Some(q) = &question {
        references.extend(q.references.iter().cloned());
    }
    if let Some(l) = &list {
        let removed = question.as_ref().map(|q| q.first..=q.last);
        references.extend(
            l.references
                .iter()
                .filter(|r| !removed.as_ref().is_some_and(|span| span.contains(&r.row)))
                .cloned(),
        );
    }
    references.sort_by(|a, b| (a.sheet, a.row, &a.via).cmp(&(b.sheet, b.row, &b.via)));

    if !references.is_empty() && !options.confirm {
        log::debug!("removal of '{}' needs confirmation ({} reference(s))", target, references.len());
        return Ok(RemoveOutcome::NeedsConfirmation(DependencyWarning {
            target: target.to_string(),
            references,
        }));
    }

    let mut next = doc.clone();
    if let Some(q) = &question {
        next.survey.remove_rows(q.first, q.last);
        reject_new_faults(
            &structure,
            &next,
            RowShift::Removed {
                first: q.first,
                last: q.last,
            },
            config,
        )?;
        log::info!("removed survey rows {}-{} ('{}')", q.first, q.last, target);
    }
    if let (Some(l), Some(sheet)) = (&list, next.choices.as_mut()) {
        for row in l.rows.iter().rev() {
            sheet.remove_rows(*row, *row);
        }
        log::info!("removed {} choice row(s)", l.rows.len());
    }
    if !references.is_empty() {
        log::warn!("'{}' removed with {} dangling reference(s)", target, references.len());
    }

    Ok(RemoveOutcome::Removed(next.touched()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::Sheet;

    fn doc() -> Document {
        Document::new(
            Sheet::from_strs(&[
                &["type", "name", "label", "relevant"],
                &["integer", "age", "Age", ""],
                &["select_one yn", "consent", "Consent", ""],
                &["begin group", "g", "G", "${consent} = 'yes'"],
                &["text", "inner", "Inner", ""],
                &["end group", "g", "", ""],
                &["note", "adult", "Adult", "${age} >= 18"],
                &["begin repeat", "empty", "Empty", ""],
                &["end repeat", "", "", ""],
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

    fn removed(outcome: RemoveOutcome) -> Document {
        match outcome {
            RemoveOutcome::Removed(doc) => doc,
            RemoveOutcome::NeedsConfirmation(w) => panic!("unexpected warning: {}", w),
        }
    }

    #[test]
    fn referenced_question_needs_confirmation() {
        let d = doc();
        let config = EngineConfig::default();
        let outcome = remove(&d, "age", RemoveScope::Question, &RemoveOptions::default(), &config).unwrap();
        let RemoveOutcome::NeedsConfirmation(warning) = outcome else {
            panic!("expected a warning");
        };
        assert_eq!(warning.rows(), vec![7]);
        assert_eq!(warning.references[0].via, "relevant");

        let confirm = RemoveOptions {
            confirm: true,
            ..Default::default()
        };
        let next = removed(remove(&d, "age", RemoveScope::Question, &confirm, &config).unwrap());
        assert_eq!(next.survey.row_count(), d.survey.row_count() - 1);
        assert_eq!(next.survey.cell(2, 1), "consent");
    }

    #[test]
    fn empty_block_is_removed_as_a_pair() {
        let next = removed(
            remove(&doc(), "empty", RemoveScope::Question, &RemoveOptions::default(), &EngineConfig::default()).unwrap(),
        );
        assert_eq!(next.survey.row_count(), 7);
    }

    #[test]
    fn non_empty_block_needs_cascade() {
        let d = doc();
        let config = EngineConfig::default();
        let err = remove(&d, "g", RemoveScope::Question, &RemoveOptions::default(), &config).unwrap_err();
        assert_eq!(
            err,
            OpError::StructuralRemoval {
                name: "g".into(),
                reason: "group g still contains 1 row(s); remove them first or cascade".into(),
                begin_row: Some(4),
                end_row: Some(6),
                inner_rows: vec![5],
            }
        );

        let cascade = RemoveOptions {
            cascade: true,
            ..Default::default()
        };
        let next = removed(remove(&d, "g", RemoveScope::Question, &cascade, &config).unwrap());
        assert_eq!(next.survey.cell(4, 1), "adult");
    }

    #[test]
    fn end_row_name_alone_cannot_be_removed() {
        let d = Document::new(
            Sheet::from_strs(&[&["type", "name"], &["begin group", "outer"], &["end group", "tail"]]),
            None,
            None,
        );
        let err = remove(&d, "tail", RemoveScope::Question, &RemoveOptions::default(), &EngineConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            OpError::StructuralRemoval {
                begin_row: Some(2),
                end_row: Some(3),
                ..
            }
        ));
    }

    #[test]
    fn choice_list_in_use_is_a_dependency() {
        let d = doc();
        let config = EngineConfig::default();
        let outcome = remove(&d, "yn", RemoveScope::ChoiceList, &RemoveOptions::default(), &config).unwrap();
        let RemoveOutcome::NeedsConfirmation(warning) = outcome else {
            panic!("expected a warning");
        };
        assert_eq!(
            warning.references,
            vec![Reference {
                sheet: SheetKind::Survey,
                row: 3,
                name: "consent".into(),
                via: "type".into(),
                target: "yn".into(),
            }]
        );

        let next = removed(remove(&d, "color", RemoveScope::ChoiceList, &RemoveOptions::default(), &config).unwrap());
        assert_eq!(next.choices.unwrap().row_count(), 3);
        assert!(matches!(
            remove(&d, "sizes", RemoveScope::ChoiceList, &RemoveOptions::default(), &config),
            Err(OpError::NotFound {
                sheet: SheetKind::Choices,
                ..
            })
        ));
    }

    #[test]
    fn both_removes_question_and_list() {
        let d = doc();
        let config = EngineConfig::default();
        let outcome = remove(&d, "consent", RemoveScope::Both, &RemoveOptions::default(), &config).unwrap();
        let RemoveOutcome::NeedsConfirmation(warning) = outcome else {
            panic!("expected a warning");
        };
        // Only the group's relevant; the question's own type does not count.
        assert_eq!(warning.rows(), vec![4]);

        let confirm = RemoveOptions {
            confirm: true,
            ..Default::default()
        };
        let next = removed(remove(&d, "consent", RemoveScope::Both, &confirm, &config).unwrap());
        let choices = next.choices.unwrap();
        assert_eq!(choices.row_count(), 2);
        assert_eq!(choices.cell(2, 0), "color");

        assert!(matches!(
            remove(&d, "age", RemoveScope::Both, &confirm, &config),
            Err(OpError::InvalidRecord { .. })
        ));
    }
}
