//! Structure-Preserving Mutator.
//!
//! Every operation borrows the current [`Document`] and returns a new one,
//! so a failure leaves the caller's snapshot exactly as it was. Operations
//! re-parse the document they are given; a dirty snapshot is safe to pass
//! back in.
//!
//! The writer touches only the cells an operation changes. Columns a record
//! needs but the sheet lacks are appended after the last header.

mod insert;
mod placement;
mod relocate;
mod remove;
mod rows;
mod settings;
mod update;

pub use insert::{insert_choices, insert_metadata, insert_questions, STANDARD_METADATA};
pub use placement::Placement;
pub use relocate::move_question;
pub use remove::{remove, DependencyWarning, Reference, RemoveOptions, RemoveOutcome, RemoveScope};
pub use settings::update_settings;
pub use update::update_question;

use crate::config::EngineConfig;
use crate::error::OpError;
use crate::records::BlockKind;
use crate::sheet::Document;
use crate::structure::{parse_structure, FormStructure, StructureFault};
use std::collections::BTreeSet;

/// Where an edit left the survey rows that existed before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowShift {
    Unchanged,
    /// Rows `first..=last` were taken out and reinserted so that `first`
    /// now sits at `at` (numbered after the removal).
    Moved { first: usize, last: usize, at: usize },
    /// Rows `first..=last` were deleted.
    Removed { first: usize, last: usize },
}

impl RowShift {
    /// New number of an old row; `None` when the row is gone.
    fn map(self, row: usize) -> Option<usize> {
        match self {
            RowShift::Unchanged => Some(row),
            RowShift::Moved { first, last, at } => {
                let count = last - first + 1;
                if (first..=last).contains(&row) {
                    return Some(at + (row - first));
                }
                let squeezed = if row > last { row - count } else { row };
                Some(if squeezed >= at { squeezed + count } else { squeezed })
            }
            RowShift::Removed { first, last } => {
                if (first..=last).contains(&row) {
                    None
                } else if row > last {
                    Some(row - (last - first + 1))
                } else {
                    Some(row)
                }
            }
        }
    }
}

/// Fault identity for before/after comparison. Block names are left out,
/// so renaming an unclosed block is not a new fault.
type FaultKey = (u8, BlockKind, Option<BlockKind>, Vec<usize>);

fn fault_key(fault: &StructureFault, shift: RowShift) -> Option<FaultKey> {
    Some(match fault {
        StructureFault::UnmatchedEnd { kind, row } => (0, *kind, None, vec![shift.map(*row)?]),
        StructureFault::MismatchedEnd {
            expected,
            open_row,
            found,
            row,
        } => (1, *expected, Some(*found), vec![shift.map(*open_row)?, shift.map(*row)?]),
        StructureFault::Unclosed { kind, row, .. } => (2, *kind, None, vec![shift.map(*row)?]),
    })
}

/// Re-parse `after` and fail on any structural fault `before` did not have.
///
/// Faults of `before` are carried to their new rows through `shift`. A
/// document that was already unbalanced may still be edited, but an edit
/// never adds a fault, even while removing another.
pub(crate) fn reject_new_faults(
    before: &FormStructure,
    after: &Document,
    shift: RowShift,
    config: &EngineConfig,
) -> Result<(), OpError> {
    let known: BTreeSet<FaultKey> = before.faults.iter().filter_map(|f| fault_key(f, shift)).collect();
    let reparsed = parse_structure(after, config)?;
    let fresh: Vec<StructureFault> = reparsed
        .faults
        .into_iter()
        .filter(|f| fault_key(f, RowShift::Unchanged).is_some_and(|k| !known.contains(&k)))
        .collect();
    if !fresh.is_empty() {
        return Err(OpError::UnbalancedStructure { faults: fresh });
    }
    Ok(())
}

/// Exactly one declaring row for `name`.
pub(crate) fn single_row(structure: &FormStructure, name: &str) -> Result<Option<usize>, OpError> {
    let rows = structure.rows_named(name);
    match rows.as_slice() {
        [] => Ok(None),
        [row] => Ok(Some(*row)),
        _ => Err(OpError::AmbiguousTarget {
            name: name.to_string(),
            rows,
        }),
    }
}
