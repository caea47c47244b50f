//! Logging for the tensegrity executables
//!
//! Every line is stamped with the session's elapsed time. The console and the session's log file
//! are filtered separately, so the strut link's per-poll traces can go to the file without
//! drowning the trial console.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::{ColoredString, Colorize};
use log::{self, info, Record};
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// How much to log to each output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogLevels {
    /// Most verbose level shown on the console.
    pub console: LevelFilter,

    /// Most verbose level written to the session log file.
    pub file: LevelFilter,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("The {0} log level must include INFO, found `{1}`")]
    InvalidMinLogLevel(&'static str, log::LevelFilter),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LogLevels {
    /// Everything to the file, `INFO` and up on the console unless `verbose`.
    pub fn new(verbose: bool) -> Self {
        Self {
            console: if verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            },
            file: LevelFilter::Trace,
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// # Notes
///
/// - Both levels must include `log::Level::Info`, operator prompts are logged at that level.
///
/// # Safety
///
/// - This function must only be called once to prevent corrupting logs.
pub fn logger_init(levels: LogLevels, session: &session::Session) -> Result<(), LoggerInitError> {
    if levels.console < log::Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel("console", levels.console));
    }
    if levels.file < log::Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel("file", levels.file));
    }

    let log_file =
        fern::log_file(session.log_file_path.clone()).map_err(LoggerInitError::LogFileInitError)?;

    let console = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{:10.6} {}] {}{}",
                session::get_elapsed_seconds(),
                level_to_str(record.level()),
                target_prefix(record),
                message
            ))
        })
        .level(levels.console)
        .chain(std::io::stdout());

    // No colour codes in the file
    let file = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{:10.6} {:5}] {}{}",
                session::get_elapsed_seconds(),
                record.level(),
                target_prefix(record),
                message
            ))
        })
        .level(levels.file)
        .chain(log_file);

    fern::Dispatch::new()
        .level(levels.console.max(levels.file))
        .level_for("rustyline", LevelFilter::Info)
        .chain(console)
        .chain(file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    if let Some(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    Console level: {:?}", levels.console);
    info!("    File level: {:?}", levels.file);
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the string representation of a log level
fn level_to_str(level: log::Level) -> ColoredString {
    match level {
        log::Level::Trace => "TRC".dimmed().italic(),
        log::Level::Debug => "DBG".dimmed(),
        log::Level::Info => "INF".normal(),
        log::Level::Warn => "WRN".yellow(),
        log::Level::Error => "ERR".red().bold(),
    }
}

/// Module prefix for debug and trace lines, empty otherwise.
fn target_prefix(record: &Record) -> String {
    if record.level() > log::Level::Info {
        format!("{}: ", short_target(record.target()))
    } else {
        String::new()
    }
}

/// Drop the crate name from a module path, `tens_lib::strut_ctrl::link` becomes
/// `strut_ctrl::link`.
fn short_target(target: &str) -> &str {
    match target.split_once("::") {
        Some((_, rest)) => rest,
        None => target,
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
