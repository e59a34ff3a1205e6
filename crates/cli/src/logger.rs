//! Stderr logger for the `log` facade.

use log::{LevelFilter, Metadata, Record};

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Level from `XLSFORM_LOG`; unset or unrecognised means `warn`.
pub(crate) fn level_from_env() -> LevelFilter {
    parse_level(std::env::var("XLSFORM_LOG").ok().as_deref())
}

fn parse_level(value: Option<&str>) -> LevelFilter {
    match value.map(str::to_ascii_lowercase).as_deref() {
        Some("error") => LevelFilter::Error,
        Some("warn") => LevelFilter::Warn,
        Some("info") => LevelFilter::Info,
        Some("debug") => LevelFilter::Debug,
        Some("trace") => LevelFilter::Trace,
        Some("off") => LevelFilter::Off,
        _ => LevelFilter::Warn,
    }
}

/// Install the logger. `verbose` raises the level to at least `info`.
pub(crate) fn init(verbose: bool) {
    let mut level = level_from_env();
    if verbose && level < LevelFilter::Info {
        level = LevelFilter::Info;
    }
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
