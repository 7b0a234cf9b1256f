//! Structured JSON logger
//!
//! - One log line = one event
//! - Keys sorted, so a line is stable apart from its timestamp
//! - Explicit severity levels
//! - Synchronous, no buffering
//!
//! Records below the process-wide minimum severity are dropped. The default
//! minimum is INFO; the driver lowers or raises it from its configuration.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Per-batch detail
    Trace = 0,
    /// Normal operations
    Info = 1,
    /// Recoverable issues (torn tail trimmed, backend fallback)
    Warn = 2,
    /// Operation failures
    Error = 3,
    /// Unrecoverable, process exits
    Fatal = 4,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Severity::Trace,
            1 => Severity::Info,
            2 => Severity::Warn,
            3 => Severity::Error,
            _ => Severity::Fatal,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Severity::Trace),
            "INFO" => Ok(Severity::Info),
            "WARN" => Ok(Severity::Warn),
            "ERROR" => Ok(Severity::Error),
            "FATAL" => Ok(Severity::Fatal),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

static MIN_SEVERITY: AtomicU8 = AtomicU8::new(Severity::Info as u8);

/// A structured logger that outputs JSON logs
///
/// INFO and below go to stdout, ERROR and FATAL to stderr.
pub struct Logger;

impl Logger {
    /// Sets the process-wide minimum severity
    pub fn set_min_severity(severity: Severity) {
        MIN_SEVERITY.store(severity as u8, Ordering::Relaxed);
    }

    /// Returns the process-wide minimum severity
    pub fn min_severity() -> Severity {
        Severity::from_u8(MIN_SEVERITY.load(Ordering::Relaxed))
    }

    /// Whether a record at `severity` would be written
    pub fn enabled(severity: Severity) -> bool {
        severity >= Self::min_severity()
    }

    /// Log an event with the given severity and fields
    ///
    /// Keys are output in alphabetical order
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if !Self::enabled(severity) {
            return;
        }
        if severity >= Severity::Error {
            Self::log_to_writer(severity, event, fields, &mut io::stderr());
        } else {
            Self::log_to_writer(severity, event, fields, &mut io::stdout());
        }
    }

    fn log_to_writer<W: Write>(
        severity: Severity,
        event: &str,
        fields: &[(&str, &str)],
        writer: &mut W,
    ) {
        let line = Self::render(severity, event, fields);
        // single write per line
        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }

    fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        // serde_json's default map keeps keys sorted
        let mut record: Map<String, Value> = fields
            .iter()
            .map(|(key, value)| (key.to_string(), Value::from(*value)))
            .collect();
        record.insert("event".into(), Value::from(event));
        record.insert("severity".into(), Value::from(severity.as_str()));
        record.insert(
            "ts".into(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );

        let mut line = Value::Object(record).to_string();
        line.push('\n');
        line
    }

    /// Log at INFO level
    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut buffer = Vec::new();
        Logger::log_to_writer(severity, event, fields, &mut buffer);
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Trace < Severity::Info);
        assert!(Severity::Info < Severity::Warn);
        assert!(Severity::Warn < Severity::Error);
        assert!(Severity::Error < Severity::Fatal);
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!("warn".parse::<Severity>().unwrap(), Severity::Warn);
        assert_eq!("TRACE".parse::<Severity>().unwrap(), Severity::Trace);
        assert!("loud".parse::<Severity>().is_err());
    }

    #[test]
    fn test_log_json_format() {
        let output = capture(Severity::Info, "BATCH_MINED", &[("items", "4")]);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["event"], "BATCH_MINED");
        assert_eq!(parsed["severity"], "INFO");
        assert_eq!(parsed["items"], "4");
        assert!(parsed["ts"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_log_deterministic_ordering() {
        let a = capture(Severity::Info, "T", &[("y", "1"), ("x", "2"), ("rare", "3")]);
        let b = capture(Severity::Info, "T", &[("rare", "3"), ("x", "2"), ("y", "1")]);
        let strip = |line: &str| {
            let mut value: serde_json::Value = serde_json::from_str(line).unwrap();
            value.as_object_mut().unwrap().remove("ts");
            value.to_string()
        };
        assert_eq!(strip(&a), strip(&b));
        assert!(a.find("rare").unwrap() < a.find("\"x\"").unwrap());
    }

    #[test]
    fn test_log_escapes_special_chars() {
        let output = capture(Severity::Warn, "T", &[("path", "C:\\data\n\"x\"")]);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["path"], "C:\\data\n\"x\"");
        assert_eq!(output.matches('\n').count(), 1);
    }

    #[test]
    fn test_from_u8_covers_all_levels() {
        for severity in [
            Severity::Trace,
            Severity::Info,
            Severity::Warn,
            Severity::Error,
            Severity::Fatal,
        ] {
            assert_eq!(Severity::from_u8(severity as u8), severity);
        }
    }
}
