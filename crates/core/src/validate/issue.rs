//! Validation report types.

use crate::sheet::SheetKind;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Suggestion,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Suggestion => "suggestion",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The check that produced an issue. Variant order is report order within
/// a severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    RequiredColumns,
    DuplicateHeaders,
    StructuralBalance,
    TypeValidity,
    NameSyntax,
    NameUniqueness,
    ChoiceListIntegrity,
    MultipleChoiceNames,
    References,
    FormulaHeuristics,
    Messaging,
    GroupLabels,
    BlockNames,
    NamingQuality,
    Settings,
    ChoicesSheet,
    BlankBoundary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueCode {
    MissingColumn,
    DuplicateHeader,
    UnbalancedStructure,
    UnknownType,
    InvalidSelectSyntax,
    MissingType,
    InvalidName,
    MissingName,
    DuplicateName,
    DuplicateChoiceName,
    MissingChoiceList,
    SpaceInMultipleChoiceName,
    UnknownReference,
    BareFieldReference,
    MalformedReference,
    MissingConstraintMessage,
    MissingRequiredMessage,
    MissingGroupLabel,
    MismatchedBlockName,
    NameLeadingDigit,
    NameNumericSuffix,
    NameQuestionCode,
    MissingSetting,
    MissingSettingsSheet,
    MissingChoicesSheet,
    DataBeyondBlankBoundary,
}

impl IssueCode {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueCode::MissingColumn => "missing-column",
            IssueCode::DuplicateHeader => "duplicate-header",
            IssueCode::UnbalancedStructure => "unbalanced-structure",
            IssueCode::UnknownType => "unknown-type",
            IssueCode::InvalidSelectSyntax => "invalid-select-syntax",
            IssueCode::MissingType => "missing-type",
            IssueCode::InvalidName => "invalid-name",
            IssueCode::MissingName => "missing-name",
            IssueCode::DuplicateName => "duplicate-name",
            IssueCode::DuplicateChoiceName => "duplicate-choice-name",
            IssueCode::MissingChoiceList => "missing-choice-list",
            IssueCode::SpaceInMultipleChoiceName => "space-in-multiple-choice-name",
            IssueCode::UnknownReference => "unknown-reference",
            IssueCode::BareFieldReference => "bare-field-reference",
            IssueCode::MalformedReference => "malformed-reference",
            IssueCode::MissingConstraintMessage => "missing-constraint-message",
            IssueCode::MissingRequiredMessage => "missing-required-message",
            IssueCode::MissingGroupLabel => "missing-group-label",
            IssueCode::MismatchedBlockName => "mismatched-block-name",
            IssueCode::NameLeadingDigit => "name-leading-digit",
            IssueCode::NameNumericSuffix => "name-numeric-suffix",
            IssueCode::NameQuestionCode => "name-question-code",
            IssueCode::MissingSetting => "missing-setting",
            IssueCode::MissingSettingsSheet => "missing-settings-sheet",
            IssueCode::MissingChoicesSheet => "missing-choices-sheet",
            IssueCode::DataBeyondBlankBoundary => "data-beyond-blank-boundary",
        }
    }

    pub fn check(self) -> Check {
        use IssueCode::*;
        match self {
            MissingColumn => Check::RequiredColumns,
            DuplicateHeader => Check::DuplicateHeaders,
            UnbalancedStructure => Check::StructuralBalance,
            UnknownType | InvalidSelectSyntax | MissingType => Check::TypeValidity,
            InvalidName | MissingName => Check::NameSyntax,
            DuplicateName | DuplicateChoiceName => Check::NameUniqueness,
            MissingChoiceList => Check::ChoiceListIntegrity,
            SpaceInMultipleChoiceName => Check::MultipleChoiceNames,
            UnknownReference => Check::References,
            BareFieldReference | MalformedReference => Check::FormulaHeuristics,
            MissingConstraintMessage | MissingRequiredMessage => Check::Messaging,
            MissingGroupLabel => Check::GroupLabels,
            MismatchedBlockName => Check::BlockNames,
            NameLeadingDigit | NameNumericSuffix | NameQuestionCode => Check::NamingQuality,
            MissingSetting | MissingSettingsSheet => Check::Settings,
            MissingChoicesSheet => Check::ChoicesSheet,
            DataBeyondBlankBoundary => Check::BlankBoundary,
        }
    }

    pub fn severity(self) -> Severity {
        use IssueCode::*;
        match self {
            BareFieldReference
            | MalformedReference
            | MissingConstraintMessage
            | MissingRequiredMessage
            | MissingGroupLabel
            | MissingSetting
            | MissingChoicesSheet => Severity::Warning,
            MismatchedBlockName
            | NameLeadingDigit
            | NameNumericSuffix
            | NameQuestionCode
            | MissingSettingsSheet
            | DataBeyondBlankBoundary => Severity::Suggestion,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an issue was found. `rows` are spreadsheet row numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub sheet: SheetKind,
    pub rows: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

impl Location {
    pub fn rows(sheet: SheetKind, rows: Vec<usize>) -> Self {
        Location {
            sheet,
            rows,
            list_name: None,
            column: None,
        }
    }

    pub fn row(sheet: SheetKind, row: usize) -> Self {
        Self::rows(sheet, vec![row])
    }

    /// The whole sheet, e.g. when it is absent.
    pub fn sheet(sheet: SheetKind) -> Self {
        Self::rows(sheet, Vec::new())
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_list(mut self, list_name: impl Into<String>) -> Self {
        self.list_name = Some(list_name.into());
        self
    }

    pub fn first_row(&self) -> usize {
        self.rows.iter().copied().min().unwrap_or(0)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sheet)?;
        match self.rows.as_slice() {
            [] => {}
            [row] => write!(f, " row {}", row)?,
            rows => write!(f, " rows {}", crate::error::join_rows(rows))?,
        }
        if let Some(column) = &self.column {
            write!(f, " [{}]", column)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: IssueCode,
    #[serde(skip)]
    pub check: Check,
    pub message: String,
    pub location: Location,
    /// Proposed correction; never applied automatically.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    pub fn new(code: IssueCode, message: impl Into<String>, location: Location) -> Self {
        ValidationIssue {
            severity: code.severity(),
            code,
            check: code.check(),
            message: message.into(),
            location,
            suggestion: None,
        }
    }

    pub fn with_column(mut self, column: &str) -> Self {
        self.location.column = Some(column.to_string());
        self
    }

    pub fn with_list(mut self, list_name: &str) -> Self {
        self.location.list_name = Some(list_name.to_string());
        self
    }

    pub fn suggest(mut self, suggestion: Option<&str>) -> Self {
        self.suggestion = suggestion.map(str::to_string);
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}: {}", self.severity, self.code, self.location, self.message)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub errors: usize,
    pub warnings: usize,
    pub suggestions: usize,
}

/// Issues plus per-severity counts, as emitted by `xlsform validate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub summary: Summary,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        let mut summary = Summary::default();
        for issue in &issues {
            match issue.severity {
                Severity::Error => summary.errors += 1,
                Severity::Warning => summary.warnings += 1,
                Severity::Suggestion => summary.suggestions += 1,
            }
        }
        ValidationReport {
            valid: summary.errors == 0,
            summary,
            issues,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.summary.errors > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_kebab_case() {
        let json = serde_json::to_value(IssueCode::SpaceInMultipleChoiceName).unwrap();
        assert_eq!(json, "space-in-multiple-choice-name");
        assert_eq!(
            IssueCode::SpaceInMultipleChoiceName.as_str(),
            "space-in-multiple-choice-name"
        );
    }

    #[test]
    fn severity_and_check_follow_code() {
        let issue = ValidationIssue::new(
            IssueCode::MissingSettingsSheet,
            "no settings sheet",
            Location::sheet(SheetKind::Settings),
        );
        assert_eq!(issue.severity, Severity::Suggestion);
        assert_eq!(issue.check, Check::Settings);
        assert_eq!(IssueCode::MissingSetting.severity(), Severity::Warning);
    }

    #[test]
    fn location_renders_rows() {
        let loc = Location::rows(SheetKind::Survey, vec![2, 3]).with_column("name");
        assert_eq!(loc.to_string(), "survey rows 2 and 3 [name]");
    }

    #[test]
    fn report_counts_by_severity() {
        let report = ValidationReport::from_issues(vec![
            ValidationIssue::new(IssueCode::DuplicateName, "dup", Location::row(SheetKind::Survey, 2)),
            ValidationIssue::new(IssueCode::MissingGroupLabel, "label", Location::row(SheetKind::Survey, 4)),
        ]);
        assert!(report.has_errors());
        assert!(!report.valid);
        assert_eq!(report.summary.warnings, 1);
    }
}
