//! Dependency Analyzer: reverse index of `${name}` references.
//!
//! Extraction is syntactic. Formulas are never evaluated and cycles are not
//! detected; the index only answers "which rows mention this name".

use crate::config::EngineConfig;
use crate::records::SurveyRecord;
use crate::sheet::Document;
use crate::structure::{parse_structure, FormStructure};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

static REFERENCE: OnceLock<Regex> = OnceLock::new();
static FILTER_COLUMN: OnceLock<Regex> = OnceLock::new();

fn reference_re() -> &'static Regex {
    REFERENCE.get_or_init(|| {
        Regex::new(r"\$\{\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\}").expect("valid regex")
    })
}

fn filter_column_re() -> &'static Regex {
    FILTER_COLUMN.get_or_init(|| {
        Regex::new(r"([A-Za-z_][A-Za-z0-9_.\-]*)\s*(?:!=|=)\s*\$\{\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\}")
            .expect("valid regex")
    })
}

/// Names referenced as `${name}` in `formula`, in order of first appearance.
pub fn references(formula: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for cap in reference_re().captures_iter(formula) {
        let name = &cap[1];
        if !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
    }
    out
}

/// `(choices column, field)` pairs for `column = ${field}` terms of a
/// choice filter.
pub fn filter_columns(formula: &str) -> Vec<(String, String)> {
    filter_column_re()
        .captures_iter(formula)
        .map(|cap| (cap[1].to_string(), cap[2].to_string()))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulaKind {
    Relevant,
    Constraint,
    Calculation,
    ChoiceFilter,
    RepeatCount,
    Required,
    Default,
    /// Labels, hints and messages, including translations.
    Label,
}

impl FormulaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FormulaKind::Relevant => "relevant",
            FormulaKind::Constraint => "constraint",
            FormulaKind::Calculation => "calculation",
            FormulaKind::ChoiceFilter => "choice_filter",
            FormulaKind::RepeatCount => "repeat_count",
            FormulaKind::Required => "required",
            FormulaKind::Default => "default",
            FormulaKind::Label => "label",
        }
    }
}

const FORMULA_COLUMNS: &[(&str, FormulaKind)] = &[
    ("relevant", FormulaKind::Relevant),
    ("constraint", FormulaKind::Constraint),
    ("calculation", FormulaKind::Calculation),
    ("choice_filter", FormulaKind::ChoiceFilter),
    ("repeat_count", FormulaKind::RepeatCount),
    ("required", FormulaKind::Required),
    ("default", FormulaKind::Default),
    ("label", FormulaKind::Label),
    ("hint", FormulaKind::Label),
    ("constraint_message", FormulaKind::Label),
    ("required_message", FormulaKind::Label),
];

/// Every `(column, kind, value)` of a record that may hold references.
pub fn scanned_values(record: &SurveyRecord) -> Vec<(&str, FormulaKind, &str)> {
    let mut out: Vec<(&str, FormulaKind, &str)> = FORMULA_COLUMNS
        .iter()
        .filter_map(|(column, kind)| record.get(column).map(|v| (*column, *kind, v)))
        .collect();
    out.extend(
        record
            .translations
            .iter()
            .map(|(column, value)| (column.as_str(), FormulaKind::Label, value.as_str())),
    );
    out
}

/// One reference from a row to a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyEdge {
    /// Name of the referencing row (may be empty).
    pub from: String,
    pub to: String,
    pub kind: FormulaKind,
    pub row: usize,
    pub column: String,
}

/// A choices-sheet column used on the left of `column = ${field}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterColumnUse {
    pub field: String,
    pub row: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyIndex {
    /// Referenced name -> edges, ordered by row.
    pub dependents: BTreeMap<String, Vec<DependencyEdge>>,
    /// Choices column -> uses in choice filters.
    pub filter_columns: BTreeMap<String, Vec<FilterColumnUse>>,
}

impl DependencyIndex {
    /// Index the survey sheet of `doc`. A sheet that cannot be mapped yields
    /// an empty index; the rule engine reports why.
    pub fn build(doc: &Document) -> Self {
        Self::build_with(doc, &EngineConfig::default())
    }

    pub fn build_with(doc: &Document, config: &EngineConfig) -> Self {
        match parse_structure(doc, config) {
            Ok(structure) => Self::from_structure(&structure),
            Err(e) => {
                log::debug!("dependency index skipped: {}", e);
                DependencyIndex::default()
            }
        }
    }

    pub fn from_structure(structure: &FormStructure) -> Self {
        let mut index = DependencyIndex::default();
        for located in &structure.records {
            let record = &located.record;
            let from = record.name.trim();
            for (column, kind, value) in scanned_values(record) {
                for to in references(value) {
                    index.dependents.entry(to.clone()).or_default().push(DependencyEdge {
                        from: from.to_string(),
                        to,
                        kind,
                        row: located.row,
                        column: column.to_string(),
                    });
                }
                if kind == FormulaKind::ChoiceFilter {
                    for (filter_column, field) in filter_columns(value) {
                        index
                            .filter_columns
                            .entry(filter_column)
                            .or_default()
                            .push(FilterColumnUse {
                                field,
                                row: located.row,
                            });
                    }
                }
            }
        }
        log::debug!("dependency index: {} referenced name(s)", index.dependents.len());
        index
    }

    /// Edges pointing at `name`, ordered by row.
    pub fn dependents_of(&self, name: &str) -> &[DependencyEdge] {
        self.dependents.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.dependents.values().flatten()
    }

    /// Edges to `name` whose source row is not `excluded`.
    pub fn external_dependents<F>(&self, name: &str, excluded: F) -> Vec<&DependencyEdge>
    where
        F: Fn(usize) -> bool,
    {
        self.dependents_of(name)
            .iter()
            .filter(|e| !excluded(e.row))
            .collect()
    }
}
