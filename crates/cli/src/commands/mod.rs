pub(crate) mod deps;
pub(crate) mod edit;
pub(crate) mod structure;
pub(crate) mod validate;

use std::path::{Path, PathBuf};
use std::process;

use xlsform_core::{Document, EngineConfig, OpError};

use crate::workbook::{read_workbook, write_workbook};
use crate::{report_error, OutputFormat};

/// Resolved global options shared by every subcommand.
pub(crate) struct Session {
    pub form: PathBuf,
    pub engine: EngineConfig,
    pub output: OutputFormat,
    pub quiet: bool,
}

impl Session {
    pub(crate) fn load(&self) -> Document {
        match read_workbook(&self.form) {
            Ok(doc) => doc,
            Err(e) => {
                let msg = format!("error reading workbook '{}': {}", self.form.display(), e);
                report_error(&msg, self.output, self.quiet);
                process::exit(1);
            }
        }
    }

    /// Write `doc` to `out`, or back to the workbook it came from.
    pub(crate) fn save(&self, doc: &Document, out: Option<&Path>) -> PathBuf {
        let path = out.unwrap_or(self.form.as_path()).to_path_buf();
        if let Err(e) = write_workbook(&path, doc) {
            let msg = format!("error writing workbook '{}': {}", path.display(), e);
            report_error(&msg, self.output, self.quiet);
            process::exit(1);
        }
        log::info!("wrote {}", path.display());
        path
    }

    /// Report an operational failure and exit 1. Silent under `--quiet`.
    pub(crate) fn fail(&self, err: &OpError) -> ! {
        if self.quiet {
            process::exit(1);
        }
        match self.output {
            OutputFormat::Json => {
                let json = serde_json::json!({ "error": err.to_string(), "detail": err });
                eprintln!(
                    "{}",
                    serde_json::to_string_pretty(&json).unwrap_or_else(|_| format!("{{\"error\": \"{}\"}}", err))
                );
            }
            OutputFormat::Text => eprintln!("error: {}", err),
        }
        process::exit(1);
    }

    pub(crate) fn print_json<T: serde::Serialize>(&self, value: &T) {
        let json = serde_json::to_string_pretty(value)
            .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
        println!("{}", json);
    }
}
