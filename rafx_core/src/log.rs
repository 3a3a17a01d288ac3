//! Logging for rafx
//!
//! Every rafx component reports through one replaceable sink. Entries carry
//! a severity, a wall-clock timestamp and a source tag such as
//! `"rafx::registry"` or `"rafx::vulkan"`; errors also carry `file:line`.
//! The default sink prints colored lines to stdout.
//!
//! The sink is the only process-wide state of the crate. Everything GPU
//! related lives in an explicitly owned `RenderContext`.

use std::sync::{OnceLock, RwLock};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use colored::{ColoredString, Colorize};

/// Destination of log entries
///
/// ```no_run
/// use rafx_core::rafx::log::{LogEntry, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, entry: &LogEntry) {
///         eprintln!("{} {}", entry.source, entry.message);
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    fn log(&self, entry: &LogEntry);
}

/// One log record
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: LogSeverity,
    pub timestamp: SystemTime,
    /// Component tag, e.g. "rafx::frame"
    pub source: String,
    pub message: String,
    /// Call site, set for errors only
    pub file: Option<&'static str>,
    pub line: Option<u32>,
}

impl LogEntry {
    /// `file:line` of the call site, when recorded
    pub fn location(&self) -> Option<String> {
        match (self.file, self.line) {
            (Some(file), Some(line)) => Some(format!("{}:{}", file, line)),
            _ => None,
        }
    }
}

/// Severity, ordered from most to least verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    /// Per-command recording traces
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogSeverity {
    /// Fixed-width label used by `DefaultLogger`
    pub fn label(self) -> &'static str {
        match self {
            LogSeverity::Trace => "TRACE",
            LogSeverity::Debug => "DEBUG",
            LogSeverity::Info => "INFO ",
            LogSeverity::Warn => "WARN ",
            LogSeverity::Error => "ERROR",
        }
    }

    fn colored_label(self) -> ColoredString {
        let label = self.label();
        match self {
            LogSeverity::Trace => label.bright_black(),
            LogSeverity::Debug => label.cyan(),
            LogSeverity::Info => label.green(),
            LogSeverity::Warn => label.yellow(),
            LogSeverity::Error => label.red().bold(),
        }
    }
}

/// Console logger: `[timestamp] [SEVERITY] [source] message (file:line)`
///
/// Timestamps are local time with millisecond precision.
pub struct DefaultLogger;

impl DefaultLogger {
    /// Render an entry without color codes
    pub fn format_plain(entry: &LogEntry) -> String {
        Self::render(entry, entry.severity.label().into(), entry.source.as_str().into())
    }

    fn render(entry: &LogEntry, severity: ColoredString, source: ColoredString) -> String {
        let local: DateTime<Local> = entry.timestamp.into();
        let mut line = format!(
            "[{}] [{}] [{}] {}",
            local.format("%Y-%m-%d %H:%M:%S%.3f"),
            severity,
            source,
            entry.message
        );
        if let Some(location) = entry.location() {
            line.push_str(&format!(" ({})", location));
        }
        line
    }
}

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        let line = Self::render(entry, entry.severity.colored_label(), entry.source.bright_blue());
        println!("{}", line);
    }
}

// ===== SINK =====

struct LogSink {
    logger: Box<dyn Logger>,
    min_severity: LogSeverity,
}

impl Default for LogSink {
    fn default() -> Self {
        Self {
            logger: Box::new(DefaultLogger),
            min_severity: LogSeverity::Debug,
        }
    }
}

static SINK: OnceLock<RwLock<LogSink>> = OnceLock::new();

fn sink() -> &'static RwLock<LogSink> {
    SINK.get_or_init(|| RwLock::new(LogSink::default()))
}

fn with_sink_mut(update: impl FnOnce(&mut LogSink)) {
    if let Ok(mut sink) = sink().write() {
        update(&mut sink);
    }
}

/// Route every following entry to `logger`
pub fn set_logger<L: Logger + 'static>(logger: L) {
    with_sink_mut(|sink| sink.logger = Box::new(logger));
}

/// Back to `DefaultLogger` with minimum severity Debug
pub fn reset_logger() {
    with_sink_mut(|sink| *sink = LogSink::default());
}

/// Drop every entry below `severity`
pub fn set_min_severity(severity: LogSeverity) {
    with_sink_mut(|sink| sink.min_severity = severity);
}

pub fn min_severity() -> LogSeverity {
    sink()
        .read()
        .map(|sink| sink.min_severity)
        .unwrap_or(LogSeverity::Debug)
}

/// Entry point of the logging macros
pub fn log(severity: LogSeverity, source: &str, message: String) {
    dispatch(severity, source, message, None);
}

/// Entry point of the error macros, which record their call site
pub fn log_detailed(severity: LogSeverity, source: &str, message: String, file: &'static str, line: u32) {
    dispatch(severity, source, message, Some((file, line)));
}

fn dispatch(severity: LogSeverity, source: &str, message: String, call_site: Option<(&'static str, u32)>) {
    let Ok(sink) = sink().read() else {
        return;
    };
    if severity < sink.min_severity {
        return;
    }
    sink.logger.log(&LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: source.to_string(),
        message,
        file: call_site.map(|(file, _)| file),
        line: call_site.map(|(_, line)| line),
    });
}

// ===== MACROS =====

#[doc(hidden)]
#[macro_export]
macro_rules! __rafx_log {
    ($severity:ident, $source:expr, $($arg:tt)*) => {
        $crate::log::log($crate::log::LogSeverity::$severity, $source, format!($($arg)*))
    };
}

/// ```no_run
/// rafx_core::rafx_trace!("rafx::recorder", "bind_pipeline {:?}", 3);
/// ```
#[macro_export]
macro_rules! rafx_trace {
    ($source:expr, $($arg:tt)*) => { $crate::__rafx_log!(Trace, $source, $($arg)*) };
}

#[macro_export]
macro_rules! rafx_debug {
    ($source:expr, $($arg:tt)*) => { $crate::__rafx_log!(Debug, $source, $($arg)*) };
}

/// ```no_run
/// rafx_core::rafx_info!("rafx::context", "Context created with {} frames in flight", 2);
/// ```
#[macro_export]
macro_rules! rafx_info {
    ($source:expr, $($arg:tt)*) => { $crate::__rafx_log!(Info, $source, $($arg)*) };
}

#[macro_export]
macro_rules! rafx_warn {
    ($source:expr, $($arg:tt)*) => { $crate::__rafx_log!(Warn, $source, $($arg)*) };
}

/// Error with the call site attached
///
/// ```no_run
/// rafx_core::rafx_error!("rafx::vulkan", "Failed to create image: {}", "OOM");
/// ```
#[macro_export]
macro_rules! rafx_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log_detailed(
            $crate::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!(),
        )
    };
}

/// Log an error and evaluate to `DeviceError::Backend` with the same text
///
/// ```ignore
/// device.create_fence(&info, None)
///     .map_err(|e| rafx_err!("rafx::vulkan", "Failed to create fence: {:?}", e))?;
/// ```
#[macro_export]
macro_rules! rafx_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::log::log_detailed(
            $crate::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!(),
        );
        $crate::rafx::Error::from($crate::rafx::DeviceError::Backend(message))
    }};
}

/// `rafx_err!` and return it
#[macro_export]
macro_rules! rafx_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::rafx_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
