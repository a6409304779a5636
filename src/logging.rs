/// Structured logging for the flood risk engine
///
/// Provides context-rich logging tagged with the engine component and an
/// optional subject (location, country, scenario), with timestamps and
/// severity levels. Supports both console output and file-based logging.
/// Messages emitted before `init_logger` are dropped.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::str::FromStr;
use std::sync::Mutex;

use crate::model::RiskError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(rename = "warn", alias = "warning")]
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
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Classifier,
    Probability,
    Extremes,
    DamageTable,
    Damage,
    Risk,
    Config,
    System,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Classifier => write!(f, "CLASSIFY"),
            Component::Probability => write!(f, "PROB"),
            Component::Extremes => write!(f, "GEV"),
            Component::DamageTable => write!(f, "TABLE"),
            Component::Damage => write!(f, "DAMAGE"),
            Component::Risk => write!(f, "RISK"),
            Component::Config => write!(f, "CONFIG"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the caller supplied an out-of-range or unknown input
    Expected,
    /// Unexpected failure - reference data or configuration is broken
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger, replacing any previous one
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        // A poisoned lock only means another thread panicked mid-log.
        let mut guard = LOGGER.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(logger);
    }

    fn log(&self, level: LogLevel, component: Component, subject: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");

        let subject_part = subject.map(|s| format!(" [{}]", s)).unwrap_or_default();
        let log_entry = format!(
            "{} {} {}{}: {}",
            timestamp, level, component, subject_part, message
        );

        // Console output
        if self.console_timestamps {
            match level {
                LogLevel::Error => eprintln!("{}", log_entry),
                LogLevel::Warning => eprintln!("   {}", log_entry),
                LogLevel::Info => println!("   {}", log_entry),
                LogLevel::Debug => println!("   [DEBUG] {}", log_entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", component, subject_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", component, subject_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}{}: {}", component, subject_part, message),
            }
        }

        // File output
        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn emit(level: LogLevel, component: Component, subject: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, component, subject, message);
        }
    }
}

/// Log a general informational message
pub fn info(component: Component, subject: Option<&str>, message: &str) {
    emit(LogLevel::Info, component, subject, message);
}

/// Log a warning message
pub fn warn(component: Component, subject: Option<&str>, message: &str) {
    emit(LogLevel::Warning, component, subject, message);
}

/// Log an error message
pub fn error(component: Component, subject: Option<&str>, message: &str) {
    emit(LogLevel::Error, component, subject, message);
}

/// Log a debug message
pub fn debug(component: Component, subject: Option<&str>, message: &str) {
    emit(LogLevel::Debug, component, subject, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify an engine error by who is expected to fix it
pub fn classify_failure(err: &RiskError) -> FailureType {
    match err {
        // Bad requests: the caller's problem, routinely seen in batches
        RiskError::InvalidInput(_)
        | RiskError::UnknownCountry(_)
        | RiskError::UnknownRegion(_)
        | RiskError::InsufficientData { .. } => FailureType::Expected,

        // Reference data or configuration is broken
        RiskError::TableFormat { .. }
        | RiskError::TableNotLoaded
        | RiskError::Csv(_)
        | RiskError::Json(_)
        | RiskError::Toml(_)
        | RiskError::Config(_) => FailureType::Unexpected,

        RiskError::Io { .. } => FailureType::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a per-item failure with automatic classification
pub fn log_item_failure(component: Component, subject: &str, operation: &str, err: &RiskError) {
    let failure_type = classify_failure(err);

    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => debug(component, Some(subject), &message),
        FailureType::Unexpected => error(component, Some(subject), &message),
        FailureType::Unknown => warn(component, Some(subject), &message),
    }
}

// ---------------------------------------------------------------------------
// Batch Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of a batch operation
pub fn log_batch_summary(component: Component, operation: &str, total: usize, successful: usize, failed: usize) {
    let message = format!(
        "{} complete: {}/{} successful, {} failed",
        operation, successful, total, failed
    );

    if failed == 0 {
        info(component, None, &message);
    } else if successful == 0 {
        error(component, None, &message);
    } else {
        warn(component, None, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!(" debug ".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_failure_classification() {
        let bad_area = RiskError::InvalidInput("area_m2 must be > 0".to_string());
        assert_eq!(classify_failure(&bad_area), FailureType::Expected);

        let unknown = RiskError::UnknownCountry("ZZ".to_string());
        assert_eq!(classify_failure(&unknown), FailureType::Expected);

        assert_eq!(classify_failure(&RiskError::TableNotLoaded), FailureType::Unexpected);

        let broken_row = RiskError::TableFormat {
            row: 12,
            message: "damage_ratio above 1".to_string(),
        };
        assert_eq!(classify_failure(&broken_row), FailureType::Unexpected);
    }

    #[test]
    fn test_logging_writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.log");
        let path_str = path.to_str().unwrap();

        init_logger(LogLevel::Debug, Some(path_str), true);
        warn(Component::Risk, Some("Kelantan"), "EAI exceeds exposure");
        log_batch_summary(Component::Damage, "Damage batch", 3, 3, 0);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("WARN RISK [Kelantan]: EAI exceeds exposure"));
        assert!(contents.contains("Damage batch complete: 3/3 successful, 0 failed"));
    }
}
