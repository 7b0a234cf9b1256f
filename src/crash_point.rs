//! Crash point injection for testing durability
//!
//! When `BLUESPACE_CRASH_POINT` names a point, the process terminates via
//! `std::process::abort()` as soon as execution reaches it: no cleanup, no
//! unwinding, no catching. Integration tests run the binary with the
//! variable set and then reopen the data directory.
//!
//! ```bash
//! BLUESPACE_CRASH_POINT=cursor_before_rename bluespace mine --config search.json
//! ```

use std::sync::OnceLock;

/// Environment variable selecting the crash point
pub const CRASH_POINT_ENV: &str = "BLUESPACE_CRASH_POINT";

static CRASH_POINT: OnceLock<Option<String>> = OnceLock::new();

#[inline]
fn get_crash_point() -> Option<&'static str> {
    CRASH_POINT
        .get_or_init(|| std::env::var(CRASH_POINT_ENV).ok())
        .as_deref()
}

/// Returns true if `BLUESPACE_CRASH_POINT` equals the given name.
#[inline]
pub fn crash_point_enabled(name: &str) -> bool {
    get_crash_point() == Some(name)
}

/// Aborts the process if the named crash point is enabled.
///
/// No-op when the variable is unset or names another point.
#[inline]
pub fn maybe_crash(name: &str) {
    if crash_point_enabled(name) {
        eprintln!("[CRASH] Triggering crash at point: {}", name);
        std::process::abort();
    }
}

/// All defined crash point names
pub mod points {
    // Result log
    pub const STORAGE_BEFORE_APPEND: &str = "storage_before_append";
    pub const STORAGE_AFTER_APPEND: &str = "storage_after_append";
    pub const STORAGE_AFTER_FSYNC: &str = "storage_after_fsync";

    // Cursor file
    pub const CURSOR_BEFORE_RENAME: &str = "cursor_before_rename";
    pub const CURSOR_AFTER_RENAME: &str = "cursor_after_rename";

    // Compaction
    pub const COMPACT_BEFORE_RENAME: &str = "compact_before_rename";

    // Driver loop, between storing a batch and flushing the cursor
    pub const DRIVER_AFTER_STORE: &str = "driver_after_store";

    pub fn all() -> &'static [&'static str] {
        &[
            STORAGE_BEFORE_APPEND,
            STORAGE_AFTER_APPEND,
            STORAGE_AFTER_FSYNC,
            CURSOR_BEFORE_RENAME,
            CURSOR_AFTER_RENAME,
            COMPACT_BEFORE_RENAME,
            DRIVER_AFTER_STORE,
        ]
    }
}
