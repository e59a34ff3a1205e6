//! Engine tuning knobs.
//!
//! Loaded from the `[engine]` table of a project's `xlsform.toml` by the
//! CLI; every field falls back to its default when omitted.

use serde::{Deserialize, Serialize};

/// Consecutive blank rows/columns after which the tabular-form ecosystem
/// stops reading a sheet.
pub const DEFAULT_BLANK_THRESHOLD: usize = 20;

/// Largest edit distance at which a near-miss name is offered as a correction.
pub const DEFAULT_SUGGESTION_DISTANCE: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub blank_threshold: usize,
    pub suggestion_distance: usize,
    /// Settings that must carry a value in row 2 of the `settings` sheet.
    pub required_settings: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            blank_threshold: DEFAULT_BLANK_THRESHOLD,
            suggestion_distance: DEFAULT_SUGGESTION_DISTANCE,
            required_settings: vec!["form_title".to_string(), "form_id".to_string()],
        }
    }
}
