/// Structured logging for the weather monitoring service
///
/// Every entry is tagged with the data source it concerns and, when there
/// is one, the provider station id. Entries go through `tracing`, so the
/// console layer and the optional append-only file layer are both plain
/// `tracing-subscriber` fmt layers.

use std::fmt;
use std::fs::OpenOptions;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Instant;

use tracing_subscriber::Layer;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::model::{ProviderKind, UnitError};

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    OpenWeather,
    Netatmo,
    Database,
    Monitor,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::OpenWeather => write!(f, "OWM"),
            DataSource::Netatmo => write!(f, "NETATMO"),
            DataSource::Database => write!(f, "DB"),
            DataSource::Monitor => write!(f, "MON"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

impl From<ProviderKind> for DataSource {
    fn from(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::OpenWeather => DataSource::OpenWeather,
            ProviderKind::Netatmo => DataSource::Netatmo,
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Installs the global subscriber.
///
/// Console output always; file output appended to `log_file` when given.
/// `RUST_LOG`, when set, overrides `min_level`. Calling this twice keeps
/// the first subscriber.
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from(min_level).into())
        .from_env_lossy();

    let console = if console_timestamps {
        tracing_subscriber::fmt::layer().with_target(false).boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .without_time()
            .boxed()
    };

    let file = log_file.and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            ),
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", path, e);
                None
            }
        }
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init();
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Log a general informational message
pub fn info(source: DataSource, station_id: Option<&str>, message: &str) {
    tracing::info!(source = %source, station = station_id.unwrap_or("-"), "{}", message);
}

/// Log a warning message
pub fn warn(source: DataSource, station_id: Option<&str>, message: &str) {
    tracing::warn!(source = %source, station = station_id.unwrap_or("-"), "{}", message);
}

/// Log an error message
pub fn error(source: DataSource, station_id: Option<&str>, message: &str) {
    tracing::error!(source = %source, station = station_id.unwrap_or("-"), "{}", message);
}

/// Log a debug message
pub fn debug(source: DataSource, station_id: Option<&str>, message: &str) {
    tracing::debug!(source = %source, station = station_id.unwrap_or("-"), "{}", message);
}

// ---------------------------------------------------------------------------
// Operation Timing
// ---------------------------------------------------------------------------

/// Runs `op`, logging when it starts and how long it took.
pub fn timed<T, F>(source: DataSource, operation: &str, op: F) -> T
where
    F: FnOnce() -> T,
{
    debug(source, None, &format!("{} started", operation));
    let started = Instant::now();
    let result = op();
    info(
        source,
        None,
        &format!("{} finished in {:.3}s", operation, started.elapsed().as_secs_f64()),
    );
    result
}

// ---------------------------------------------------------------------------
// Failure Logging
// ---------------------------------------------------------------------------

/// Level a unit failure is logged at.
///
/// Bad payloads from a provider are its problem and only warn; failing
/// writes or aborted units point at this service.
pub fn unit_failure_level(err: &UnitError) -> LogLevel {
    match err {
        UnitError::Mapping(_) => LogLevel::Warning,
        UnitError::Persistence(_) | UnitError::Aborted => LogLevel::Error,
    }
}

/// Log one failed unit of a batch
pub fn log_unit_failure(source: DataSource, station_id: Option<&str>, err: &UnitError) {
    let message = format!("unit failed: {}", err);
    match unit_failure_level(err) {
        LogLevel::Error => error(source, station_id, &message),
        _ => warn(source, station_id, &message),
    }
}

/// Level a batch summary is logged at.
pub fn batch_summary_level(successful: usize, failed: usize) -> LogLevel {
    if failed == 0 {
        LogLevel::Info
    } else if successful == 0 {
        LogLevel::Error
    } else {
        LogLevel::Warning
    }
}

/// Log a summary of one ingestion batch
pub fn log_batch_summary(source: DataSource, total: usize, successful: usize, failed: usize) {
    let message = format!(
        "Batch complete: {}/{} successful, {} failed",
        successful, total, failed
    );

    match batch_summary_level(successful, failed) {
        LogLevel::Info | LogLevel::Debug => info(source, None, &message),
        LogLevel::Warning => warn(source, None, &message),
        LogLevel::Error => error(source, None, &message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MappingError, PersistenceError};

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("INFO".parse::<LogLevel>(), Ok(LogLevel::Info));
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!("trace".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_unit_failure_classification() {
        let mapping = UnitError::Mapping(MappingError::new("timestamp"));
        assert_eq!(unit_failure_level(&mapping), LogLevel::Warning);

        let persistence = UnitError::Persistence(PersistenceError::Poisoned);
        assert_eq!(unit_failure_level(&persistence), LogLevel::Error);
        assert_eq!(unit_failure_level(&UnitError::Aborted), LogLevel::Error);
    }

    #[test]
    fn test_batch_summary_levels() {
        assert_eq!(batch_summary_level(3, 0), LogLevel::Info);
        assert_eq!(batch_summary_level(0, 0), LogLevel::Info);
        assert_eq!(batch_summary_level(2, 1), LogLevel::Warning);
        assert_eq!(batch_summary_level(0, 3), LogLevel::Error);
    }

    #[test]
    fn test_timed_returns_result_without_subscriber() {
        let value = timed(DataSource::System, "answer", || 42);
        assert_eq!(value, 42);
    }
}
