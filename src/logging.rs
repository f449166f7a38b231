/// Structured logging for the air-quality service.
///
/// Provides context-rich logging with data-source tags, timestamps, and
/// severity levels. Supports both console output and file-based logging for
/// daemon operations. The pipeline's error policy means most failures are
/// recovered silently; this log is the only place they remain visible, so
/// every fallback transition should leave a line here.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

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

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Bounded station endpoint (aqicn.org map bounds).
    Waqi,
    /// Single-point city feed endpoint.
    Feed,
    /// Persistent key/value store (cache slots).
    Store,
    /// Forecasting collaborator.
    Forecast,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Waqi => write!(f, "WAQI"),
            DataSource::Feed => write!(f, "FEED"),
            DataSource::Store => write!(f, "STORE"),
            DataSource::Forecast => write!(f, "FCAST"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - upstream rate limiting, empty bounds, demo quota
    Expected,
    /// Unexpected failure - indicates service degradation or API change
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

/// Classify a telemetry failure based on the error message and context.
pub fn classify_telemetry_failure(error_message: &str) -> FailureType {
    // Empty bounds and quota exhaustion are routine on the demo token.
    if error_message.contains("no valid stations") || error_message.contains("Over quota") {
        FailureType::Expected
    }
    // Parse errors suggest API changes or bugs.
    else if error_message.contains("parse error") || error_message.contains("HTTP error") {
        FailureType::Unexpected
    } else {
        FailureType::Unknown
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
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>) {
        let logger = Logger { min_level, log_file };
        *LOGGER.lock().unwrap() = Some(logger);
    }

    fn log(&self, level: LogLevel, source: DataSource, context: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let context_part = context.map(|c| format!(" [{}]", c)).unwrap_or_default();
        let log_entry = format!("{} {} {}{}: {}", timestamp, level, source, context_part, message);

        match level {
            LogLevel::Error | LogLevel::Warning => eprintln!("{}", log_entry),
            LogLevel::Info | LogLevel::Debug => println!("{}", log_entry),
        }

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
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>) {
    Logger::init(min_level, log_file.map(String::from));
}

/// Log a general informational message
pub fn info(source: DataSource, context: Option<&str>, message: &str) {
    if let Some(logger) = LOGGER.lock().unwrap().as_ref() {
        logger.log(LogLevel::Info, source, context, message);
    }
}

/// Log a warning message
pub fn warn(source: DataSource, context: Option<&str>, message: &str) {
    if let Some(logger) = LOGGER.lock().unwrap().as_ref() {
        logger.log(LogLevel::Warning, source, context, message);
    }
}

/// Log an error message
pub fn error(source: DataSource, context: Option<&str>, message: &str) {
    if let Some(logger) = LOGGER.lock().unwrap().as_ref() {
        logger.log(LogLevel::Error, source, context, message);
    }
}

/// Log a debug message
pub fn debug(source: DataSource, context: Option<&str>, message: &str) {
    if let Some(logger) = LOGGER.lock().unwrap().as_ref() {
        logger.log(LogLevel::Debug, source, context, message);
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log an upstream telemetry failure with automatic classification. The
/// severity is downgraded for expected failures so routine demo-quota noise
/// does not page anyone.
pub fn log_telemetry_failure(source: DataSource, operation: &str, err: &dyn std::error::Error) {
    let error_msg = err.to_string();
    let failure_type = classify_telemetry_failure(&error_msg);

    let message = format!("{} failed [{}]: {}", operation, failure_type, error_msg);

    match failure_type {
        FailureType::Expected => debug(source, None, &message),
        FailureType::Unexpected => error(source, None, &message),
        FailureType::Unknown => warn(source, None, &message),
    }
}

/// Log a persistent-store failure. Store failures are always treated as
/// cache misses by the caller; the log line is the only trace they leave.
pub fn log_store_failure(slot: &str, operation: &str, detail: &str) {
    warn(
        DataSource::Store,
        Some(slot),
        &format!("{} failed, treating as cache miss: {}", operation, detail),
    );
}
