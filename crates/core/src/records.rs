//! Typed views over `survey` and `choices` rows.
//!
//! A record is a fixed set of known optional fields plus two maps: one for
//! translated variants (`label::French (fr)`) and one for any other column
//! present in the sheet. The maps let the mutator write a row back without
//! losing columns it does not understand.

use crate::columns::{ColumnMap, Extent};
use crate::sheet::{cell_has_value, Sheet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ──────────────────────────────────────────────
// Type column
// ──────────────────────────────────────────────

/// Field types accepted in the `type` column (first token).
pub const KNOWN_FIELD_TYPES: &[&str] = &[
    "text",
    "integer",
    "decimal",
    "range",
    "date",
    "time",
    "dateTime",
    "geopoint",
    "geotrace",
    "geoshape",
    "image",
    "audio",
    "background-audio",
    "video",
    "file",
    "barcode",
    "note",
    "acknowledge",
    "calculate",
    "hidden",
    "rank",
    "select_one",
    "select_multiple",
    "select_one_from_file",
    "select_multiple_from_file",
    "xml-external",
    "csv-external",
    "trigger",
];

/// Metadata types collected automatically by the data-collection client.
pub const METADATA_TYPES: &[&str] = &[
    "start",
    "end",
    "today",
    "deviceid",
    "subscriberid",
    "simserial",
    "phonenumber",
    "username",
    "email",
    "audit",
    "start-geopoint",
];

/// Spellings shown to users for begin/end rows when suggesting corrections.
pub const STRUCTURAL_TYPES: &[&str] = &["begin group", "end group", "begin repeat", "end repeat"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Group,
    Repeat,
}

impl BlockKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockKind::Group => "group",
            BlockKind::Repeat => "repeat",
        }
    }
}

/// The parsed `type` column of a survey row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordType {
    Begin(BlockKind),
    End(BlockKind),
    /// Any other row: `keyword` is the first token, `argument` the second
    /// (the list name for selects), `rest` whatever follows (`or_other`).
    Field {
        keyword: String,
        argument: Option<String>,
        rest: Vec<String>,
    },
}

impl RecordType {
    /// Parse a raw `type` cell. `None` for a blank cell.
    pub fn parse(raw: &str) -> Option<RecordType> {
        let tokens: Vec<&str> = raw.split_whitespace().collect();
        let first = *tokens.first()?;

        let structural = match (tokens.len(), first.to_lowercase().as_str()) {
            (1, "begin_group") => Some(RecordType::Begin(BlockKind::Group)),
            (1, "end_group") => Some(RecordType::End(BlockKind::Group)),
            (1, "begin_repeat") => Some(RecordType::Begin(BlockKind::Repeat)),
            (1, "end_repeat") => Some(RecordType::End(BlockKind::Repeat)),
            (2, "begin") | (2, "end") => {
                let kind = match tokens[1].to_lowercase().as_str() {
                    "group" => Some(BlockKind::Group),
                    "repeat" => Some(BlockKind::Repeat),
                    _ => None,
                };
                kind.map(|k| {
                    if first.eq_ignore_ascii_case("begin") {
                        RecordType::Begin(k)
                    } else {
                        RecordType::End(k)
                    }
                })
            }
            _ => None,
        };
        if let Some(t) = structural {
            return Some(t);
        }

        Some(RecordType::Field {
            keyword: first.to_string(),
            argument: tokens.get(1).map(|s| s.to_string()),
            rest: tokens.iter().skip(2).map(|s| s.to_string()).collect(),
        })
    }

    pub fn is_end(&self) -> bool {
        matches!(self, RecordType::End(_))
    }

    pub fn is_begin(&self) -> bool {
        matches!(self, RecordType::Begin(_))
    }

    pub fn is_structural(&self) -> bool {
        matches!(self, RecordType::Begin(_) | RecordType::End(_))
    }

    pub fn keyword(&self) -> Option<&str> {
        match self {
            RecordType::Field { keyword, .. } => Some(keyword),
            _ => None,
        }
    }

    /// `(list_name, multiple)` for `select_one <list>` / `select_multiple <list>`.
    /// File-backed selects reference a file, not a choice list.
    pub fn choice_list(&self) -> Option<(&str, bool)> {
        match self {
            RecordType::Field {
                keyword,
                argument: Some(list),
                ..
            } => match keyword.as_str() {
                "select_one" => Some((list, false)),
                "select_multiple" => Some((list, true)),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_metadata(&self) -> bool {
        self.keyword().is_some_and(|k| METADATA_TYPES.contains(&k))
    }
}

// ──────────────────────────────────────────────
// Records
// ──────────────────────────────────────────────

/// A record together with the spreadsheet row it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Located<T> {
    pub row: usize,
    pub record: T,
}

/// Base columns whose `base::Language` variants are translations.
const TRANSLATABLE: &[&str] = &[
    "label",
    "hint",
    "guidance_hint",
    "constraint_message",
    "required_message",
];

fn translation_base(column: &str) -> Option<&'static str> {
    let (base, lang) = column.split_once("::")?;
    if lang.trim().is_empty() {
        return None;
    }
    let base = base.trim().to_lowercase();
    TRANSLATABLE.iter().copied().find(|b| *b == base)
}

/// Columns a survey record models as named fields, in write order.
pub const SURVEY_FIELDS: &[&str] = &[
    "type",
    "name",
    "label",
    "hint",
    "relevant",
    "constraint",
    "constraint_message",
    "required",
    "required_message",
    "calculation",
    "choice_filter",
    "repeat_count",
    "appearance",
    "default",
];

/// One question or structural row of the `survey` sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyRecord {
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choice_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_count: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appearance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Translated variants keyed by full header, e.g. `label::French (fr)`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub translations: BTreeMap<String, String>,
    /// Columns the model does not name, round-tripped unchanged.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl SurveyRecord {
    pub fn new(type_name: impl Into<String>, name: impl Into<String>, label: impl Into<String>) -> Self {
        let label = label.into();
        SurveyRecord {
            type_name: type_name.into(),
            name: name.into(),
            label: if label.is_empty() { None } else { Some(label) },
            ..SurveyRecord::default()
        }
    }

    pub fn record_type(&self) -> Option<RecordType> {
        RecordType::parse(&self.type_name)
    }

    fn slot(&mut self, column: &str) -> Option<&mut Option<String>> {
        Some(match column {
            "label" => &mut self.label,
            "hint" => &mut self.hint,
            "relevant" => &mut self.relevant,
            "constraint" => &mut self.constraint,
            "constraint_message" => &mut self.constraint_message,
            "required" => &mut self.required,
            "required_message" => &mut self.required_message,
            "calculation" => &mut self.calculation,
            "choice_filter" => &mut self.choice_filter,
            "repeat_count" => &mut self.repeat_count,
            "appearance" => &mut self.appearance,
            "default" => &mut self.default,
            _ => return None,
        })
    }

    /// Value of any column, known or not. Blank values read as `None`.
    pub fn get(&self, column: &str) -> Option<&str> {
        let value = match column {
            "type" => Some(self.type_name.as_str()),
            "name" => Some(self.name.as_str()),
            "label" => self.label.as_deref(),
            "hint" => self.hint.as_deref(),
            "relevant" => self.relevant.as_deref(),
            "constraint" => self.constraint.as_deref(),
            "constraint_message" => self.constraint_message.as_deref(),
            "required" => self.required.as_deref(),
            "required_message" => self.required_message.as_deref(),
            "calculation" => self.calculation.as_deref(),
            "choice_filter" => self.choice_filter.as_deref(),
            "repeat_count" => self.repeat_count.as_deref(),
            "appearance" => self.appearance.as_deref(),
            "default" => self.default.as_deref(),
            other => self
                .translations
                .get(other)
                .or_else(|| self.extra.get(other))
                .map(String::as_str),
        };
        value.filter(|v| cell_has_value(v))
    }

    /// Set any column; an empty value clears it.
    pub fn set(&mut self, column: &str, value: &str) {
        let stored = cell_has_value(value).then(|| value.to_string());
        match column {
            "type" => self.type_name = stored.unwrap_or_default(),
            "name" => self.name = stored.unwrap_or_default(),
            _ => {
                if let Some(slot) = self.slot(column) {
                    *slot = stored;
                    return;
                }
                let map = if translation_base(column).is_some() {
                    &mut self.translations
                } else {
                    &mut self.extra
                };
                match stored {
                    Some(v) => {
                        map.insert(column.to_string(), v);
                    }
                    None => {
                        map.remove(column);
                    }
                }
            }
        }
    }

    /// Every non-blank `(column, value)` pair, known fields first.
    pub fn cells(&self) -> Vec<(&str, &str)> {
        let mut out: Vec<(&str, &str)> = SURVEY_FIELDS
            .iter()
            .filter_map(|c| self.get(c).map(|v| (*c, v)))
            .collect();
        out.extend(self.translations.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        out.extend(self.extra.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        out.retain(|(_, v)| cell_has_value(v));
        out
    }

    /// Base value or any translated variant of `base` is present.
    pub fn has_any(&self, base: &str) -> bool {
        if self.get(base).is_some() {
            return true;
        }
        self.translations
            .iter()
            .any(|(k, v)| translation_base(k) == Some(base) && cell_has_value(v))
    }

    /// `required` is set to a truthy value.
    pub fn is_required(&self) -> bool {
        self.required.as_deref().is_some_and(|r| {
            matches!(
                r.trim().to_lowercase().as_str(),
                "yes" | "true" | "true()"
            )
        })
    }
}

/// One row of the `choices` sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChoiceRecord {
    pub list_name: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub translations: BTreeMap<String, String>,
    /// Media (`media::image`, `image`) and filter columns, round-tripped unchanged.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl ChoiceRecord {
    pub fn new(list_name: impl Into<String>, name: impl Into<String>, label: impl Into<String>) -> Self {
        let label = label.into();
        ChoiceRecord {
            list_name: list_name.into(),
            name: name.into(),
            label: if label.is_empty() { None } else { Some(label) },
            ..ChoiceRecord::default()
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        let value = match column {
            "list_name" => Some(self.list_name.as_str()),
            "name" => Some(self.name.as_str()),
            "label" => self.label.as_deref(),
            other => self
                .translations
                .get(other)
                .or_else(|| self.extra.get(other))
                .map(String::as_str),
        };
        value.filter(|v| cell_has_value(v))
    }

    pub fn set(&mut self, column: &str, value: &str) {
        let stored = cell_has_value(value).then(|| value.to_string());
        match column {
            "list_name" => self.list_name = stored.unwrap_or_default(),
            "name" => self.name = stored.unwrap_or_default(),
            "label" => self.label = stored,
            other => {
                let map = if translation_base(other).is_some() {
                    &mut self.translations
                } else {
                    &mut self.extra
                };
                match stored {
                    Some(v) => {
                        map.insert(other.to_string(), v);
                    }
                    None => {
                        map.remove(other);
                    }
                }
            }
        }
    }

    pub fn cells(&self) -> Vec<(&str, &str)> {
        let mut out: Vec<(&str, &str)> = ["list_name", "name", "label"]
            .iter()
            .filter_map(|c| self.get(c).map(|v| (*c, v)))
            .collect();
        out.extend(self.translations.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        out.extend(self.extra.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        out.retain(|(_, v)| cell_has_value(v));
        out
    }
}

// ──────────────────────────────────────────────
// Reading rows
// ──────────────────────────────────────────────

/// Logical column name for a header, as a record stores it.
fn logical_column(header: &str, col: usize, known: &[&str], columns: &ColumnMap) -> String {
    known
        .iter()
        .find(|k| columns.get(k) == Some(col))
        .map(|k| k.to_string())
        .unwrap_or_else(|| header.to_string())
}

/// Build the survey record for one row, or `None` for a blank row.
pub fn read_survey_row(sheet: &Sheet, columns: &ColumnMap, row: usize) -> Option<SurveyRecord> {
    if sheet.is_blank_row(row) {
        return None;
    }
    let mut record = SurveyRecord::default();
    for (header, col) in columns.headers() {
        let value = sheet.cell(row, col);
        if !cell_has_value(value) {
            continue;
        }
        let column = logical_column(header, col, SURVEY_FIELDS, columns);
        record.set(&column, value);
    }
    Some(record)
}

/// All non-blank survey rows within the readable extent.
pub fn read_survey(sheet: &Sheet, columns: &ColumnMap, extent: &Extent) -> Vec<Located<SurveyRecord>> {
    extent
        .data_row_numbers()
        .filter_map(|row| read_survey_row(sheet, columns, row).map(|record| Located { row, record }))
        .collect()
}

pub fn read_choice_row(sheet: &Sheet, columns: &ColumnMap, row: usize) -> Option<ChoiceRecord> {
    if sheet.is_blank_row(row) {
        return None;
    }
    let mut record = ChoiceRecord::default();
    for (header, col) in columns.headers() {
        let value = sheet.cell(row, col);
        if !cell_has_value(value) {
            continue;
        }
        let column = logical_column(header, col, &["list_name", "name", "label"], columns);
        record.set(&column, value);
    }
    Some(record)
}

/// The parsed `choices` sheet.
#[derive(Debug, Clone)]
pub struct ChoiceTable {
    pub columns: ColumnMap,
    pub extent: Extent,
    pub records: Vec<Located<ChoiceRecord>>,
}

impl ChoiceTable {
    pub fn read(sheet: &Sheet, columns: ColumnMap, extent: Extent) -> Self {
        let records = extent
            .data_row_numbers()
            .filter_map(|row| read_choice_row(sheet, &columns, row).map(|record| Located { row, record }))
            .collect();
        ChoiceTable {
            columns,
            extent,
            records,
        }
    }

    /// Choice rows grouped by trimmed list name. Rows without a list name are skipped.
    pub fn lists(&self) -> BTreeMap<&str, Vec<&Located<ChoiceRecord>>> {
        let mut lists: BTreeMap<&str, Vec<&Located<ChoiceRecord>>> = BTreeMap::new();
        for choice in &self.records {
            let list = choice.record.list_name.trim();
            if !list.is_empty() {
                lists.entry(list).or_default().push(choice);
            }
        }
        lists
    }

    pub fn has_list(&self, list_name: &str) -> bool {
        self.records
            .iter()
            .any(|c| c.record.list_name.trim() == list_name)
    }
}
