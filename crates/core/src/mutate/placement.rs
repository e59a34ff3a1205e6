//! Where inserted or moved rows go.

use crate::error::{AnchorProblem, OpError};
use crate::structure::FormStructure;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// After the last non-blank survey row.
    #[default]
    End,
    /// Directly under the header row.
    Start,
    /// After the named row; after the whole block when it names a begin row.
    After(String),
    /// As the last rows inside the named group or repeat.
    Inside(String),
}

impl Placement {
    pub fn anchor(&self) -> Option<&str> {
        match self {
            Placement::End | Placement::Start => None,
            Placement::After(name) | Placement::Inside(name) => Some(name),
        }
    }

    /// Row number the first placed row will occupy.
    pub(crate) fn resolve(&self, structure: &FormStructure) -> Result<usize, OpError> {
        let anchor = match self {
            Placement::End => return Ok(structure.last_data_row() + 1),
            Placement::Start => return Ok(2),
            Placement::After(name) | Placement::Inside(name) => name.as_str(),
        };

        let rows = structure.rows_named(anchor);
        let row = match rows.as_slice() {
            [] => {
                return Err(OpError::AmbiguousInsertion {
                    anchor: anchor.to_string(),
                    problem: AnchorProblem::NotFound,
                })
            }
            [row] => *row,
            _ => {
                return Err(OpError::AmbiguousInsertion {
                    anchor: anchor.to_string(),
                    problem: AnchorProblem::MultipleRows { rows },
                })
            }
        };

        let block = structure.block_at(row);
        if block.is_some_and(|b| !b.is_closed()) {
            return Err(OpError::UnbalancedStructure {
                faults: structure.faults.clone(),
            });
        }

        match (self, block.and_then(|b| b.end_row)) {
            (Placement::After(_), Some(end)) => Ok(end + 1),
            (Placement::After(_), None) => Ok(row + 1),
            (Placement::Inside(_), Some(end)) => Ok(end),
            (Placement::Inside(_), None) => Err(OpError::AmbiguousInsertion {
                anchor: anchor.to_string(),
                problem: AnchorProblem::NotABlock { row },
            }),
            (Placement::End, _) => Ok(structure.last_data_row() + 1),
            (Placement::Start, _) => Ok(2),
        }
    }
}
