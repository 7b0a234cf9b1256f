//! Observable lifecycle events
//!
//! Events are explicit and typed.

use std::fmt;

use super::logger::Severity;

/// Observable events in a search run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Run lifecycle
    /// Search run starts
    RunStart,
    /// Search run finished its requested batches
    RunComplete,
    /// Configuration loaded and validated
    ConfigLoaded,

    // Storage
    /// Storage directory opened and index rebuilt
    StorageOpened,
    /// Incomplete trailing record removed on open
    TornTailTrimmed,
    /// Stale cursor temp file removed on open
    StaleCursorTempRemoved,
    /// Corrupt record found (FATAL)
    StorageCorruption,
    /// Result log rewritten without superseded records
    StorageCompacted,

    // Explorer
    /// Persisted cursor loaded
    CursorResumed,
    /// No persisted cursor, starting at the origin
    CursorFresh,
    /// Cursor made durable
    CursorFlushed,

    // Mining
    /// Miner backend selected
    BackendSelected,
    /// Preferred backend failed, falling back
    BackendFallback,
    /// One batch mined
    BatchMined,
    /// One batch stored
    BatchStored,
    /// Rare coordinate found
    RareFound,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::RunStart => "SEARCH_RUN_BEGIN",
            Event::RunComplete => "SEARCH_RUN_COMPLETE",
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::StorageOpened => "STORAGE_OPENED",
            Event::TornTailTrimmed => "STORAGE_TORN_TAIL_TRIMMED",
            Event::StaleCursorTempRemoved => "CURSOR_STALE_TEMP_REMOVED",
            Event::StorageCorruption => "STORAGE_CORRUPTION",
            Event::StorageCompacted => "STORAGE_COMPACTED",

            Event::CursorResumed => "CURSOR_RESUMED",
            Event::CursorFresh => "CURSOR_FRESH",
            Event::CursorFlushed => "CURSOR_FLUSHED",

            Event::BackendSelected => "MINER_BACKEND_SELECTED",
            Event::BackendFallback => "MINER_BACKEND_FALLBACK",
            Event::BatchMined => "BATCH_MINED",
            Event::BatchStored => "BATCH_STORED",
            Event::RareFound => "RARE_FOUND",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::StorageCorruption => Severity::Fatal,
            Event::TornTailTrimmed | Event::StaleCursorTempRemoved | Event::BackendFallback => {
                Severity::Warn
            }
            Event::BatchMined | Event::BatchStored | Event::CursorFlushed => Severity::Trace,
            _ => Severity::Info,
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
