mod commands;
mod logger;
mod project;
mod workbook;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use xlsform_core::RemoveScope;

use commands::Session;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Scope of `xlsform remove`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ScopeArg {
    Question,
    ChoiceList,
    Both,
}

impl From<ScopeArg> for RemoveScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::Question => RemoveScope::Question,
            ScopeArg::ChoiceList => RemoveScope::ChoiceList,
            ScopeArg::Both => RemoveScope::Both,
        }
    }
}

/// XLSForm validator and structure-preserving editor.
#[derive(Parser)]
#[command(name = "xlsform", version, about = "XLSForm validator and structure-preserving editor")]
struct Cli {
    /// Workbook to operate on (.xlsx or .json); defaults to [project] form in xlsform.toml
    #[arg(long, global = true)]
    form: Option<PathBuf>,

    /// Project file (default: ./xlsform.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Print nothing; failures show only in the exit status
    #[arg(long, global = true)]
    quiet: bool,

    /// Log committed edits and parse decisions to stderr
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every check and report errors, warnings and suggestions
    Validate,

    /// Show the group/repeat tree and form summary
    Structure,

    /// Show which rows reference which names
    Deps {
        /// Only show references to this name
        #[arg(long)]
        name: Option<String>,
    },

    /// Insert survey questions from a JSON payload
    Add {
        /// JSON file: an array of rows (column -> value) or {"questions": [...]}
        #[arg(long)]
        questions: PathBuf,
        /// Insert after this question or block
        #[arg(long, conflicts_with_all = ["inside", "start"])]
        after: Option<String>,
        /// Insert as the last rows inside this group or repeat
        #[arg(long, conflicts_with = "start")]
        inside: Option<String>,
        /// Insert directly under the header row
        #[arg(long)]
        start: bool,
        /// Write the result here instead of overwriting the workbook
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Insert metadata fields (start, end, today, deviceid, ...) under the header
    AddMetadata {
        /// Metadata types to add; the standard set when none are given
        types: Vec<String>,
        /// Write the result here instead of overwriting the workbook
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Insert choices from a JSON payload, each after the rows of its list
    AddChoices {
        /// JSON file: an array of rows (column -> value) or {"choices": [...]}
        #[arg(long)]
        choices: PathBuf,
        /// Write the result here instead of overwriting the workbook
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Change columns of one survey row
    Update {
        /// Name of the row to change
        target: String,
        /// Column assignment, e.g. --set label="Your age"; an empty value clears
        #[arg(long = "set", value_name = "COLUMN=VALUE", required = true)]
        set: Vec<String>,
        /// Write the result here instead of overwriting the workbook
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Move a question, or a whole group/repeat, to a new position
    Move {
        /// Name of the question or block to move
        target: String,
        /// Place after this question or block
        #[arg(long, conflicts_with_all = ["inside", "start", "end"])]
        after: Option<String>,
        /// Place as the last rows inside this group or repeat
        #[arg(long, conflicts_with_all = ["start", "end"])]
        inside: Option<String>,
        /// Place directly under the header row
        #[arg(long, conflicts_with = "end")]
        start: bool,
        /// Place after the last survey row (the default)
        #[arg(long)]
        end: bool,
        /// Write the result here instead of overwriting the workbook
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Remove a question, block or choice list
    Remove {
        /// Question name, or list name with --scope choice-list
        target: String,
        /// What to remove
        #[arg(long, value_enum, default_value = "question")]
        scope: ScopeArg,
        /// Remove even though other rows still reference the target
        #[arg(long)]
        yes: bool,
        /// Remove a group or repeat together with everything inside it
        #[arg(long)]
        cascade: bool,
        /// Write the result here instead of overwriting the workbook
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Set values in the settings sheet
    Settings {
        /// Setting assignment, e.g. --set form_id=household
        #[arg(long = "set", value_name = "COLUMN=VALUE", required = true)]
        set: Vec<String>,
        /// Write the result here instead of overwriting the workbook
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    let project = match project::load_project_config(cli.config.as_deref()) {
        Ok(p) => p,
        Err(e) => {
            report_error(&e, cli.output, cli.quiet);
            process::exit(1);
        }
    };

    let Some(form) = cli.form.clone().or(project.project.form) else {
        report_error(
            "no workbook given; pass --form or set [project] form in xlsform.toml",
            cli.output,
            cli.quiet,
        );
        process::exit(1);
    };

    let session = Session {
        form,
        engine: project.engine,
        output: cli.output,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Validate => commands::validate::cmd_validate(&session),
        Commands::Structure => commands::structure::cmd_structure(&session),
        Commands::Deps { name } => commands::deps::cmd_deps(&session, name.as_deref()),
        Commands::Add {
            questions,
            after,
            inside,
            start,
            out,
        } => {
            let placement = commands::edit::placement(after, inside, start, false);
            commands::edit::cmd_add(&session, &questions, &placement, out.as_deref());
        }
        Commands::AddMetadata { types, out } => {
            commands::edit::cmd_add_metadata(&session, &types, out.as_deref());
        }
        Commands::AddChoices { choices, out } => {
            commands::edit::cmd_add_choices(&session, &choices, out.as_deref());
        }
        Commands::Update { target, set, out } => {
            commands::edit::cmd_update(&session, &target, &set, out.as_deref());
        }
        Commands::Move {
            target,
            after,
            inside,
            start,
            end,
            out,
        } => {
            let placement = commands::edit::placement(after, inside, start, end);
            commands::edit::cmd_move(&session, &target, &placement, out.as_deref());
        }
        Commands::Remove {
            target,
            scope,
            yes,
            cascade,
            out,
        } => {
            let options = xlsform_core::RemoveOptions { confirm: yes, cascade };
            commands::edit::cmd_remove(&session, &target, scope.into(), &options, out.as_deref());
        }
        Commands::Settings { set, out } => {
            commands::edit::cmd_settings(&session, &set, out.as_deref());
        }
    }
}

/// Print an error message to stderr in the requested format.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            let value = serde_json::json!({ "error": msg });
            eprintln!("{}", value);
        }
    }
}
