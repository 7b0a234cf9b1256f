//! Observability subsystem
//!
//! - Structured logging (JSON lines)
//! - Typed lifecycle events
//! - Atomic counters
//!
//! Observability is read-only: it never changes what is mined or stored,
//! and a failed log write is ignored.
//!
//! ```ignore
//! use bluespace::observability::{log_event_with_fields, Event, MetricsRegistry};
//!
//! log_event_with_fields(Event::RareFound, &[("x", "3"), ("y", "-2")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.record_batch(1024, 1);
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::{ObservationScope, Timer};

/// Log a lifecycle event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
