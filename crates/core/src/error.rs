//! Operational failures raised by the column mapper, structure parser and
//! mutator.
//!
//! Every variant carries enough context (rows, names, offending values) to
//! be rendered without looking at the document again. A failed operation
//! never changes the document it was given.

use crate::sheet::SheetKind;
use crate::structure::StructureFault;
use serde::Serialize;
use std::fmt;

/// Why an insertion or move destination could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum AnchorProblem {
    /// No row carries the anchor name.
    NotFound,
    /// Several rows carry the anchor name; the document already has a
    /// uniqueness error that must be fixed first.
    MultipleRows { rows: Vec<usize> },
    /// `inside` was requested but the anchor row does not open a block.
    NotABlock { row: usize },
}

impl fmt::Display for AnchorProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorProblem::NotFound => write!(f, "no row has this name"),
            AnchorProblem::MultipleRows { rows } => {
                write!(f, "name is used by rows {}", join_rows(rows))
            }
            AnchorProblem::NotABlock { row } => {
                write!(f, "row {} is not a begin group/begin repeat row", row)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum OpError {
    /// Two header cells hold the same exact string. Columns are 1-based.
    #[error("duplicate header '{header}' in {sheet} sheet at columns {}", join_rows(.columns))]
    DuplicateHeader {
        sheet: SheetKind,
        header: String,
        columns: Vec<usize>,
    },

    #[error("unbalanced structure: {}", describe_faults(.faults))]
    UnbalancedStructure { faults: Vec<StructureFault> },

    #[error("cannot place rows relative to '{anchor}': {problem}")]
    AmbiguousInsertion {
        anchor: String,
        problem: AnchorProblem,
    },

    #[error("{}", describe_duplicate(.name, .list_name.as_deref(), .rows))]
    DuplicateName {
        name: String,
        list_name: Option<String>,
        rows: Vec<usize>,
    },

    #[error("'{name}' not found in {sheet} sheet")]
    NotFound { sheet: SheetKind, name: String },

    /// The target name matches several rows, so the operation cannot tell
    /// which one is meant.
    #[error("'{name}' matches rows {}; resolve the duplicate name first", join_rows(.rows))]
    AmbiguousTarget { name: String, rows: Vec<usize> },

    #[error("cannot move '{name}': {reason}")]
    StructuralMove { name: String, reason: String },

    #[error("cannot remove '{name}': {reason}")]
    StructuralRemoval {
        name: String,
        reason: String,
        begin_row: Option<usize>,
        end_row: Option<usize>,
        inner_rows: Vec<usize>,
    },

    #[error("{}", describe_missing_list(.list_name, .row, .suggestion.as_deref()))]
    MissingChoiceList {
        list_name: String,
        row: usize,
        suggestion: Option<String>,
    },

    #[error("{sheet} sheet has no '{column}' column")]
    MissingColumn { sheet: SheetKind, column: String },

    #[error("invalid record: {reason}")]
    InvalidRecord { reason: String },
}

pub(crate) fn join_rows(rows: &[usize]) -> String {
    match rows {
        [] => String::new(),
        [only] => only.to_string(),
        [init @ .., last] => {
            let head: Vec<String> = init.iter().map(usize::to_string).collect();
            format!("{} and {}", head.join(", "), last)
        }
    }
}

fn describe_faults(faults: &[StructureFault]) -> String {
    let parts: Vec<String> = faults.iter().map(|f| f.to_string()).collect();
    parts.join("; ")
}

fn describe_duplicate(name: &str, list_name: Option<&str>, rows: &[usize]) -> String {
    match list_name {
        Some(list) => format!(
            "choice name '{}' already exists in list '{}' (rows {})",
            name,
            list,
            join_rows(rows)
        ),
        None => format!("name '{}' already used at rows {}", name, join_rows(rows)),
    }
}

fn describe_missing_list(list_name: &str, row: &usize, suggestion: Option<&str>) -> String {
    match suggestion {
        Some(s) => format!(
            "row {} references choice list '{}' which does not exist (did you mean '{}'?)",
            row, list_name, s
        ),
        None => format!(
            "row {} references choice list '{}' which does not exist",
            row, list_name
        ),
    }
}
