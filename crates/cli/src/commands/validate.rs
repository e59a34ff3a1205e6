use std::process;

use xlsform_core::report;

use super::Session;
use crate::OutputFormat;

/// Exit status 1 when the report has errors.
pub(crate) fn cmd_validate(session: &Session) {
    let doc = session.load();
    let report = report(&doc, &session.engine);

    match session.output {
        OutputFormat::Json => session.print_json(&report),
        OutputFormat::Text => {
            if !session.quiet {
                for issue in &report.issues {
                    println!("{}", issue);
                    if let Some(s) = &issue.suggestion {
                        println!("    suggestion: {}", s);
                    }
                }
                if report.issues.is_empty() {
                    println!("valid: no issues");
                } else {
                    println!(
                        "{} error(s), {} warning(s), {} suggestion(s)",
                        report.summary.errors, report.summary.warnings, report.summary.suggestions
                    );
                }
            }
        }
    }

    if report.has_errors() {
        process::exit(1);
    }
}
