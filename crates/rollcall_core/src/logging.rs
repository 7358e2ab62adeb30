//! File logging for processes that host the student store.
//!
//! Store, pool and repository code only talks to the `log` facade. A host
//! that wants those events on disk builds a [`LoggingConfig`] (usually via
//! [`LoggingConfig::from_env`]) and calls [`init_logging`] once at startup.
//!
//! Every line carries the emitting thread, so work done by
//! `rollcall-worker-N` threads can be told apart from the submitting side:
//!
//! ```text
//! 2026-01-05 10:12:01.120931 DEBUG thread=rollcall-worker-1 [rollcall_core::repo::student_repo] event=repo_op ...
//! ```
//!
//! Messages carry metadata only; student names never reach the log.

use flexi_logger::{
    Cleanup, Criterion, DeferredNow, FileSpec, FlexiLoggerError, LogSpecification, Logger,
    LoggerHandle, Naming, WriteMode, TS_DASHES_BLANK_COLONS_DOT_BLANK,
};
use log::{error, info, Level, LevelFilter, Record};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Arguments, Display, Formatter};
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

const ENV_LOG_DIR: &str = "ROLLCALL_LOG_DIR";
const ENV_LOG_LEVEL: &str = "ROLLCALL_LOG_LEVEL";

const LOG_FILE_BASENAME: &str = "rollcall";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_ROTATED_FILES: usize = 5;
const PANIC_PAYLOAD_LIMIT: usize = 160;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();

struct ActiveLogger {
    config: LoggingConfig,
    _handle: LoggerHandle,
}

#[derive(Debug)]
pub enum LoggingError {
    InvalidLevel(String),
    RelativeDir(PathBuf),
    CreateDir { dir: PathBuf, source: std::io::Error },
    Backend(FlexiLoggerError),
    /// Logging already runs with a different directory or level.
    Conflict { active: LoggingConfig },
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLevel(raw) => write!(
                f,
                "unsupported log level `{raw}`; expected off|error|warn|info|debug|trace"
            ),
            Self::RelativeDir(dir) => {
                write!(f, "log directory must be absolute, got `{}`", dir.display())
            }
            Self::CreateDir { dir, source } => {
                write!(f, "cannot create log directory `{}`: {source}", dir.display())
            }
            Self::Backend(err) => write!(f, "log backend failed to start: {err}"),
            Self::Conflict { active } => write!(
                f,
                "logging already active at `{}` with level {}",
                active.dir.display(),
                active.level
            ),
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDir { source, .. } => Some(source),
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FlexiLoggerError> for LoggingError {
    fn from(value: FlexiLoggerError) -> Self {
        Self::Backend(value)
    }
}

/// Where log files go and how verbose they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Absolute directory for `rollcall*.log` files.
    pub dir: PathBuf,
    pub level: LevelFilter,
}

impl LoggingConfig {
    /// Logs to `dir` at [`default_log_level`].
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            level: default_log_level(),
        }
    }

    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    /// Reads `ROLLCALL_LOG_DIR` and `ROLLCALL_LOG_LEVEL`.
    ///
    /// Returns `Ok(None)` when no log directory is set, meaning the host runs
    /// without file logging.
    pub fn from_env() -> Result<Option<Self>, LoggingError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Option<Self>, LoggingError> {
        let read = |key: &'static str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let Some(dir) = read(ENV_LOG_DIR) else {
            return Ok(None);
        };
        let mut config = Self::new(dir);
        if let Some(raw) = read(ENV_LOG_LEVEL) {
            config.level =
                LevelFilter::from_str(&raw).map_err(|_| LoggingError::InvalidLevel(raw))?;
        }
        config.validate()?;
        Ok(Some(config))
    }

    pub fn validate(&self) -> Result<(), LoggingError> {
        if !self.dir.is_absolute() {
            return Err(LoggingError::RelativeDir(self.dir.clone()));
        }
        Ok(())
    }
}

/// `Debug` for debug builds, `Info` for release builds.
pub fn default_log_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Starts rolling file logs for this process.
///
/// Repeating the call with an equal config is a no-op. Once active, logging
/// cannot be moved or re-levelled; such calls return `Conflict`.
/// Never panics.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    config.validate()?;
    let active = ACTIVE.get_or_try_init(|| start_logger(config))?;
    if active.config != *config {
        return Err(LoggingError::Conflict {
            active: active.config.clone(),
        });
    }
    Ok(())
}

fn start_logger(config: &LoggingConfig) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(&config.dir).map_err(|source| LoggingError::CreateDir {
        dir: config.dir.clone(),
        source,
    })?;

    let handle = Logger::with(LogSpecification::builder().default(config.level).build())
        .log_to_file(
            FileSpec::default()
                .directory(config.dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_ROTATED_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(thread_tagged_format)
        .start()?;

    PANIC_HOOK.get_or_init(install_panic_hook);

    info!(
        "event=logging_init module=logging status=ok version={} level={} log_dir={}",
        env!("CARGO_PKG_VERSION"),
        config.level,
        config.dir.display()
    );

    Ok(ActiveLogger {
        config: config.clone(),
        _handle: handle,
    })
}

fn thread_tagged_format(
    w: &mut dyn Write,
    now: &mut DeferredNow,
    record: &Record,
) -> std::io::Result<()> {
    let thread = std::thread::current();
    write_line(
        w,
        &now.format(TS_DASHES_BLANK_COLONS_DOT_BLANK),
        record.level(),
        thread.name().unwrap_or("unnamed"),
        record.module_path().unwrap_or("<unknown>"),
        record.args(),
    )
}

fn write_line(
    w: &mut dyn Write,
    timestamp: &dyn Display,
    level: Level,
    thread: &str,
    module: &str,
    message: &Arguments<'_>,
) -> std::io::Result<()> {
    write!(w, "{timestamp} {level:<5} thread={thread} [{module}] {message}")
}

static PANIC_HOOK: OnceCell<()> = OnceCell::new();

fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string payload".to_string());
        error!(
            "event=panic module=logging status=error location={} payload={}",
            location,
            single_line(&payload, PANIC_PAYLOAD_LIMIT)
        );
        previous(info);
    }));
}

/// Flattens `value` onto one line and caps it at `limit` characters.
fn single_line(value: &str, limit: usize) -> String {
    let mut chars = value.chars().map(|c| if c == '\n' || c == '\r' { ' ' } else { c });
    let mut line: String = chars.by_ref().take(limit).collect();
    if chars.next().is_some() {
        line.push_str("...");
    }
    line
}
