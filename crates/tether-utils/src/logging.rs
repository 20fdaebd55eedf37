//! # Logging Utilities
//!
//! `tracing` setup shared by every tether host.
//!
//! Backends emit a steady stream of state changes, so the defaults favour
//! structured output that can be filtered per crate:
//!
//! - `RUST_LOG`: filter directives (`RUST_LOG=tether_core=debug,info`)
//! - `TETHER_LOG_FORMAT`: `pretty` (default) or `json`
//! - `TETHER_LOG_FILE`: optional file that receives a copy of every record
//!
//! ## Example
//!
//! ```rust,no_run
//! use tether_utils::init_logging;
//!
//! let _guard = init_logging().expect("Failed to initialize logging");
//! tracing::info!(backend = "lldb", "session connected");
//! ```
//!
//! The returned [`LoggingGuard`] owns the background writer of any file
//! output. Keep it alive for the life of the process or buffered records are
//! lost on exit.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use chrono::Utc;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "TETHER_LOG_FORMAT";
/// Environment variable naming an additional log file.
pub const LOG_FILE_ENV: &str = "TETHER_LOG_FILE";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat
{
    /// Human-readable lines with ANSI colours on the console
    Pretty,
    /// One JSON object per record, including the active span list
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" | "dev" => Ok(Self::Pretty),
            "json" | "prod" => Ok(Self::Json),
            other => Err(LoggingError::InvalidFormat(other.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel
{
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(LoggingError::InvalidLevel(other.to_string())),
        }
    }
}

/// Keeps the non-blocking file writer alive.
///
/// Dropping the guard flushes outstanding records and stops the writer
/// thread. A guard without a file writer is a no-op.
#[derive(Debug, Default)]
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard
{
    file: Option<WorkerGuard>,
    path: Option<PathBuf>,
}

impl LoggingGuard
{
    /// Path of the file receiving log records, if any.
    pub fn file_path(&self) -> Option<&Path>
    {
        self.path.as_deref()
    }

    /// Whether a file writer is attached.
    pub fn has_file(&self) -> bool
    {
        self.file.is_some()
    }
}

/// Initialize logging from the environment.
///
/// Format comes from `TETHER_LOG_FORMAT` (unparseable values fall back to
/// pretty output), filter directives from `RUST_LOG` (default `info`), and
/// `TETHER_LOG_FILE` adds a plain-text file copy.
///
/// ## Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging() -> Result<LoggingGuard, LoggingError>
{
    let format = env::var(LOG_FORMAT_ENV)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(LogFormat::Pretty);
    let file = env::var(LOG_FILE_ENV).ok().map(PathBuf::from);

    install(true, file, format, env_filter(None))
}

/// Initialize console logging with an explicit level and format.
///
/// `RUST_LOG` is ignored here; the level applies to every target.
///
/// ## Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<LoggingGuard, LoggingError>
{
    install(true, None, format, env_filter(Some(level)))
}

/// Initialize file-only logging for hosts that own stdout.
///
/// Records go to `<dir>/<YYYY-MM-DD>-tether.log`; the directory is created if
/// needed. `level` overrides `RUST_LOG` when given.
///
/// ## Errors
///
/// Fails if the directory cannot be created or a subscriber is already
/// installed.
pub fn init_logging_to_dir(dir: &Path, level: Option<LogLevel>) -> Result<LoggingGuard, LoggingError>
{
    std::fs::create_dir_all(dir)?;
    let file = dir.join(format!("{}-tether.log", Utc::now().format("%Y-%m-%d")));
    install(false, Some(file), LogFormat::Pretty, env_filter(level))
}

fn env_filter(level: Option<LogLevel>) -> EnvFilter
{
    match level {
        Some(level) => EnvFilter::new(Level::from(level).to_string()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string())),
    }
}

fn install(
    console: bool,
    file: Option<PathBuf>,
    format: LogFormat,
    filter: EnvFilter,
) -> Result<LoggingGuard, LoggingError>
{
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guard = LoggingGuard::default();

    if console {
        layers.push(build_layer(format, true, io::stdout));
    }

    if let Some(path) = file {
        let directory = path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let name = path
            .file_name()
            .ok_or_else(|| LoggingError::InitializationFailed(format!("not a file path: {}", path.display())))?
            .to_owned();
        let (writer, worker) = tracing_appender::non_blocking(tracing_appender::rolling::never(directory, name));
        layers.push(build_layer(format, false, writer));
        guard.file = Some(worker);
        guard.path = Some(path);
    }

    Registry::default()
        .with(layers.with_filter(filter))
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;

    Ok(guard)
}

fn build_layer<W>(format: LogFormat, ansi: bool, writer: W) -> BoxedLayer
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339());

    match format {
        LogFormat::Pretty => base.with_ansi(ansi).boxed(),
        LogFormat::Json => base.json().with_current_span(true).with_span_list(true).boxed(),
    }
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Unknown value for `TETHER_LOG_FORMAT`
    #[error("Invalid log format: {0} (expected 'pretty' or 'json')")]
    InvalidFormat(String),

    /// Unknown level name
    #[error("Invalid log level: {0} (expected error, warn, info, debug or trace)")]
    InvalidLevel(String),

    /// A subscriber was already installed, or the file path was unusable
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_log_format_from_str()
    {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!(" JSON ".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("prod".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!(matches!("xml".parse::<LogFormat>(), Err(LoggingError::InvalidFormat(value)) if value == "xml"));
    }

    #[test]
    fn test_log_level_from_str()
    {
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("TRACE".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert!("loud".parse::<LogLevel>().is_err());
        assert!(LogLevel::Error < LogLevel::Trace);
    }

    #[test]
    fn test_log_level_to_tracing_level()
    {
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
        assert_eq!(Level::from(LogLevel::Debug), Level::DEBUG);
    }

    #[test]
    fn test_empty_guard_has_no_file()
    {
        let guard = LoggingGuard::default();
        assert!(!guard.has_file());
        assert!(guard.file_path().is_none());
    }
}
