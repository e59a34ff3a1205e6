//! Project configuration: `xlsform.toml`.
//!
//! # Example
//!
//! ```toml
//! [project]
//! form = "forms/household.xlsx"
//!
//! [engine]
//! blank_threshold = 20
//! suggestion_distance = 2
//! required_settings = ["form_title", "form_id", "version"]
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use xlsform_core::EngineConfig;

pub(crate) const PROJECT_FILE: &str = "xlsform.toml";

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ProjectConfig {
    pub project: ProjectSettings,
    pub engine: EngineConfig,
}

/// `[project]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ProjectSettings {
    /// Workbook used when `--form` is not given. Relative to the config file.
    pub form: Option<PathBuf>,
}

// ── Functions ─────────────────────────────────────────────────────────────────

/// Read and parse a project file from `path`.
pub(crate) fn read_project_config(path: &Path) -> Result<ProjectConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    let mut config: ProjectConfig =
        toml::from_str(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))?;

    if let (Some(form), Some(dir)) = (config.project.form.as_ref(), path.parent()) {
        if form.is_relative() {
            config.project.form = Some(dir.join(form));
        }
    }
    Ok(config)
}

/// The explicit `--config` file, or `xlsform.toml` in the working directory
/// when present, or defaults.
pub(crate) fn load_project_config(explicit: Option<&Path>) -> Result<ProjectConfig, String> {
    match explicit {
        Some(path) => read_project_config(path),
        None => {
            let path = Path::new(PROJECT_FILE);
            if path.is_file() {
                read_project_config(path)
            } else {
                Ok(ProjectConfig::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_table_overrides_defaults() {
        let config: ProjectConfig = toml::from_str(
            r#"
            [engine]
            suggestion_distance = 1
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.suggestion_distance, 1);
        assert_eq!(config.engine.blank_threshold, 20);
        assert!(config.project.form.is_none());
    }

    #[test]
    fn form_path_is_relative_to_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PROJECT_FILE);
        std::fs::write(&path, "[project]\nform = \"forms/a.json\"\n").unwrap();
        let config = read_project_config(&path).unwrap();
        assert_eq!(config.project.form, Some(dir.path().join("forms/a.json")));
    }

    #[test]
    fn unreadable_file_is_an_error_message() {
        let err = read_project_config(Path::new("/nonexistent/xlsform.toml")).unwrap_err();
        assert!(err.contains("could not read"));
    }
}
