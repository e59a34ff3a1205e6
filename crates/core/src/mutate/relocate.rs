//! Move a question, or a whole block, to a new placement.

use super::placement::Placement;
use super::{reject_new_faults, single_row, RowShift};
use crate::config::EngineConfig;
use crate::error::OpError;
use crate::sheet::{Document, SheetKind};
use crate::structure::parse_structure;

/// Move the row declaring `target` to `placement`, keeping every cell.
///
/// A `begin` row moves together with its `end` row and everything between
/// them. Moving one end of a pair, an unclosed block, or a block into itself
/// fails with [`OpError::StructuralMove`].
pub fn move_question(
    doc: &Document,
    target: &str,
    placement: &Placement,
    config: &EngineConfig,
) -> Result<Document, OpError> {
    let structure = parse_structure(doc, config)?;
    let Some(row) = single_row(&structure, target)? else {
        if let Some(end_row) = structure.end_rows_named(target).first() {
            return Err(OpError::StructuralMove {
                name: target.to_string(),
                reason: format!(
                    "'{}' only names the end row {}; move the block by the name on its begin row",
                    target, end_row
                ),
            });
        }
        return Err(OpError::NotFound {
            sheet: SheetKind::Survey,
            name: target.to_string(),
        });
    };

    let (first, last) = match structure.block_at(row) {
        Some(span) => match span.end_row {
            Some(end) => (row, end),
            None => {
                return Err(OpError::StructuralMove {
                    name: target.to_string(),
                    reason: format!(
                        "begin {} at row {} is never closed, so the block cannot be moved as a unit",
                        span.kind.as_str(),
                        row
                    ),
                })
            }
        },
        None => (row, row),
    };

    let dest = placement.resolve(&structure)?;
    if dest > first && dest <= last {
        return Err(OpError::StructuralMove {
            name: target.to_string(),
            reason: "the destination is inside the rows being moved".to_string(),
        });
    }

    let mut survey = doc.survey.clone();
    let moved = survey.remove_rows(first, last);
    let count = moved.len();
    let at = if dest > last { dest - count } else { dest };
    survey.insert_rows(at, moved);

    let mut next = doc.clone();
    next.survey = survey;
    reject_new_faults(&structure, &next, RowShift::Moved { first, last, at }, config)?;

    log::info!(
        "moved '{}' (rows {}-{}) to row {}",
        target,
        first,
        last,
        at
    );
    Ok(next.touched())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::Sheet;

    fn doc() -> Document {
        Document::new(
            Sheet::from_strs(&[
                &["type", "name", "label", "relevant"],
                &["text", "a", "A", ""],
                &["begin group", "g", "G", ""],
                &["text", "b", "B", "${a} != ''"],
                &["end group", "g", "", ""],
                &["text", "c", "C", ""],
            ]),
            None,
            None,
        )
    }

    fn column(d: &Document, col: usize) -> Vec<String> {
        (2..=d.survey.row_count()).map(|r| d.survey.cell(r, col).to_string()).collect()
    }

    #[test]
    fn leaf_moves_into_block_with_all_cells() {
        let next = move_question(&doc(), "c", &Placement::Inside("g".into()), &EngineConfig::default()).unwrap();
        assert_eq!(column(&next, 1), ["a", "g", "b", "c", "g"]);
        assert!(next.is_dirty());
    }

    #[test]
    fn block_moves_atomically() {
        let next = move_question(&doc(), "g", &Placement::After("c".into()), &EngineConfig::default()).unwrap();
        assert_eq!(column(&next, 1), ["a", "c", "g", "b", "g"]);
        assert_eq!(next.survey.cell(5, 3), "${a} != ''");
    }

    #[test]
    fn leaf_moves_out_of_block_to_end() {
        let next = move_question(&doc(), "b", &Placement::End, &EngineConfig::default()).unwrap();
        assert_eq!(column(&next, 1), ["a", "g", "g", "c", "b"]);
    }

    #[test]
    fn block_into_itself_is_rejected() {
        let err = move_question(&doc(), "g", &Placement::Inside("g".into()), &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, OpError::StructuralMove { .. }));
    }

    #[test]
    fn unclosed_block_cannot_move() {
        let d = Document::new(
            Sheet::from_strs(&[&["type", "name"], &["text", "a"], &["begin repeat", "r"], &["text", "x"]]),
            None,
            None,
        );
        let err = move_question(&d, "r", &Placement::End, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, OpError::StructuralMove { .. }));
    }

    #[test]
    fn existing_fault_follows_the_rows_it_is_on() {
        let d = Document::new(
            Sheet::from_strs(&[&["type", "name"], &["text", "a"], &["end group", ""], &["text", "c"]]),
            None,
            None,
        );
        let next = move_question(&d, "a", &Placement::End, &EngineConfig::default()).unwrap();
        assert_eq!(column(&next, 1), ["", "c", "a"]);
    }

    #[test]
    fn end_row_name_alone_is_not_movable() {
        let d = Document::new(
            Sheet::from_strs(&[&["type", "name"], &["begin group", "outer"], &["end group", "inner"]]),
            None,
            None,
        );
        let err = move_question(&d, "inner", &Placement::End, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, OpError::StructuralMove { .. }));
    }
}
