#![allow(clippy::result_large_err)]
//! xlsform-core: validation and structure-preserving edits for XLSForm
//! workbooks.
//!
//! A workbook is loaded into a [`Document`] by an outside reader, then
//! either validated or edited. Validation returns data; edits return a new
//! `Document` or an [`OpError`] and never touch the one they were given.
//!
//! # Public API
//!
//! - [`ColumnMap`] -- logical column lookup over a sheet header
//! - [`parse_structure()`] -- records and the begin/end block tree
//! - [`DependencyIndex`] -- reverse `${name}` reference index
//! - [`validate()`] / [`validate_with()`] -- the ordered check catalogue
//! - [`insert_questions()`], [`insert_choices()`], [`update_question()`],
//!   [`move_question()`], [`remove()`], [`update_settings()`] -- mutations

pub mod columns;
pub mod config;
pub mod deps;
pub mod error;
pub mod mutate;
pub mod records;
pub mod sheet;
pub mod similarity;
pub mod structure;
pub mod validate;

// ── Convenience re-exports: model ────────────────────────────────────

pub use columns::{ColumnMap, Extent};
pub use config::EngineConfig;
pub use error::OpError;
pub use records::{BlockKind, ChoiceRecord, Located, RecordType, SurveyRecord};
pub use sheet::{Document, Sheet, SheetKind};
pub use structure::{BlockSpan, FormStructure, StructureFault, StructureSummary};

// ── Convenience re-exports: entry points ─────────────────────────────

pub use deps::DependencyIndex;
pub use mutate::{
    insert_choices, insert_metadata, insert_questions, move_question, remove, update_question, update_settings,
    DependencyWarning, Placement, Reference, RemoveOptions, RemoveOutcome, RemoveScope,
};
pub use structure::parse_structure;
pub use validate::{report, validate, validate_with, Severity, ValidationIssue, ValidationReport};
