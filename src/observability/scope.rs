//! ObservationScope for automatic begin/complete logging
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` with `duration_ms` on completion
//! - Logs `{name}_FAILED` on explicit failure
//! - Logs `{name}_INCOMPLETE` if dropped without either

use std::time::Instant;

use super::logger::{Logger, Severity};

/// A scope that automatically logs begin and complete events.
///
/// ```ignore
/// let scope = ObservationScope::with_fields("STORAGE_COMPACT", &[("dir", "/data")]);
/// // ... do work ...
/// scope.complete_with_fields(&[("records", "42")]);
/// ```
pub struct ObservationScope {
    name: String,
    completed: bool,
    fields: Vec<(String, String)>,
    timer: Timer,
}

impl ObservationScope {
    /// Logs `{name}_BEGIN` immediately.
    pub fn new(name: &str) -> Self {
        Self::with_fields(name, &[])
    }

    /// Scope whose fields are repeated on every event it logs
    pub fn with_fields(name: &str, fields: &[(&str, &str)]) -> Self {
        Logger::info(&format!("{}_BEGIN", name), fields);
        Self {
            name: name.to_string(),
            completed: false,
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            timer: Timer::new(),
        }
    }

    fn emit(&self, severity: Severity, suffix: &str, extra: &[(&str, &str)]) {
        let duration = self.timer.elapsed_ms();
        let mut all: Vec<(&str, &str)> = self
            .fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        all.extend(extra.iter().copied());
        all.push(("duration_ms", duration.as_str()));
        Logger::log(severity, &format!("{}_{}", self.name, suffix), &all);
    }

    /// Logs `{name}_COMPLETE` at INFO level.
    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    /// Logs `{name}_COMPLETE` with extra result fields.
    pub fn complete_with_fields(mut self, extra_fields: &[(&str, &str)]) {
        self.completed = true;
        self.emit(Severity::Info, "COMPLETE", extra_fields);
    }

    /// Logs `{name}_FAILED` at ERROR level.
    pub fn fail(mut self, reason: &str) {
        self.completed = true;
        self.emit(Severity::Error, "FAILED", &[("reason", reason)]);
    }

    /// Logs `{name}_FAILED` at FATAL level.
    pub fn fail_fatal(mut self, reason: &str) {
        self.completed = true;
        self.emit(Severity::Fatal, "FAILED", &[("reason", reason)]);
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.completed {
            self.emit(
                Severity::Warn,
                "INCOMPLETE",
                &[("reason", "scope dropped without completion")],
            );
        }
    }
}

/// A simple duration timer for logging elapsed time
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed milliseconds as a string
    pub fn elapsed_ms(&self) -> String {
        self.elapsed_millis().to_string()
    }

    pub fn elapsed_millis(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Elapsed seconds, for rate computations
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
