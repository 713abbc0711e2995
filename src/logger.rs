//! Logging capability with colored module prefixes.
//!
//! This module provides:
//! - `Log` trait, passed into the transform instead of a process-wide flag
//! - `NoopLog` (default), `TermLog` (colored stderr), `MemoryLog` (captured lines)
//! - `log!` / `debug!` macros for formatted output through a `Log`
//!
//! # Example
//!
//! ```ignore
//! let log = TermLog::new();
//! log!(log, "transform"; "patched {} scripts", count);
//! debug!(log, "transform"; "script {:?} patch {:?}", src, patch);
//! ```

use owo_colors::OwoColorize;
use parking_lot::Mutex;
use std::io::{Write, stderr};

/// Sink for diagnostic messages.
///
/// `enabled()` gates `debug!` so callers skip formatting when nobody listens.
pub trait Log: Send + Sync {
    /// Whether debug messages should be produced at all.
    fn enabled(&self) -> bool;

    /// Write one message under a module prefix.
    fn log(&self, module: &str, message: &str);
}

// ============================================================================
// Log Macros
// ============================================================================

/// Log a message with a module prefix, regardless of `enabled()`.
///
/// # Usage
/// ```ignore
/// log!(logger, "module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $module:expr; $($arg:tt)*) => {{
        #[allow(unused_imports)]
        use $crate::logger::Log as _;
        $logger.log($module, &format!($($arg)*))
    }};
}

/// Log a debug message (only formatted when the logger is enabled).
///
/// # Usage
/// ```ignore
/// debug!(logger, "module"; "debug info: {}", value);
/// ```
#[macro_export]
macro_rules! debug {
    ($logger:expr, $module:expr; $($arg:tt)*) => {{
        #[allow(unused_imports)]
        use $crate::logger::Log as _;
        let logger = &$logger;
        if logger.enabled() {
            logger.log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Implementations
// ============================================================================

/// Discards everything. Default logger.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLog;

impl Log for NoopLog {
    #[inline]
    fn enabled(&self) -> bool {
        false
    }

    #[inline]
    fn log(&self, _module: &str, _message: &str) {}
}

/// Writes `[module] message` lines to stderr with a colored prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct TermLog;

impl TermLog {
    pub const fn new() -> Self {
        Self
    }
}

impl Log for TermLog {
    fn enabled(&self) -> bool {
        true
    }

    fn log(&self, module: &str, message: &str) {
        let prefix = colorize_prefix(module, &module.to_ascii_lowercase());
        let mut out = stderr().lock();
        writeln!(out, "{prefix} {message}").ok();
        out.flush().ok();
    }
}

/// Apply color to a module prefix based on module type
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> String {
    let prefix = format!("[{module}]");
    match module_lower {
        "host" => prefix.bright_blue().bold().to_string(),
        "site" => prefix.bright_green().bold().to_string(),
        "error" | "warning" => prefix.bright_red().bold().to_string(),
        _ => prefix.bright_yellow().bold().to_string(),
    }
}

/// Keeps every message in memory as `[module] message`.
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the captured lines.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Whether any captured line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|line| line.contains(needle))
    }
}

impl Log for MemoryLog {
    fn enabled(&self) -> bool {
        true
    }

    fn log(&self, module: &str, message: &str) {
        self.lines.lock().push(format!("[{module}] {message}"));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_memory_log_captures_prefix() {
        let log = MemoryLog::new();
        crate::log!(log, "transform"; "patched {} scripts", 2);
        assert_eq!(log.lines(), vec!["[transform] patched 2 scripts"]);
    }

    #[test]
    fn test_debug_skips_formatting_when_disabled() {
        struct Counting(AtomicUsize);
        impl std::fmt::Display for Counting {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fetch_add(1, Ordering::SeqCst);
                write!(f, "x")
            }
        }

        let value = Counting(AtomicUsize::new(0));
        let log = NoopLog;
        crate::debug!(log, "transform"; "{}", value);
        assert_eq!(value.0.load(Ordering::SeqCst), 0);

        let memory = MemoryLog::new();
        crate::debug!(memory, "transform"; "{}", value);
        assert_eq!(value.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_macros_accept_shared_trait_objects() {
        let memory = Arc::new(MemoryLog::new());
        let shared: Arc<dyn Log> = memory.clone();
        crate::debug!(shared, "host"; "wired");
        assert!(memory.contains("[host] wired"));
    }

    #[test]
    #[deny(unused_imports)]
    fn test_macros_on_dyn_log_are_warning_free() {
        let memory = MemoryLog::new();
        let log: &dyn Log = &memory;
        crate::log!(log, "site"; "scanned {}", 1);
        crate::debug!(log, "site"; "rewrote {}", 1);
        assert_eq!(memory.lines(), vec!["[site] scanned 1", "[site] rewrote 1"]);
    }

    #[test]
    fn test_colorize_prefix_keeps_module_name() {
        let prefix = colorize_prefix("site", "site");
        assert!(prefix.contains("[site]"));
    }
}
