//! Unit tests for log.rs
//!
//! Tests LogSeverity, LogEntry, and DefaultLogger formatting.

use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
use std::time::SystemTime;

fn entry(severity: LogSeverity, file: Option<&'static str>, line: Option<u32>) -> LogEntry {
    LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: "swapframe::Swapchain".to_string(),
        message: "present mode fallback".to_string(),
        file,
        line,
    }
}

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_labels_are_fixed_width() {
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        assert_eq!(severity.label().len(), 5);
    }
    assert_eq!(LogSeverity::Warn.label(), "WARN ");
}

// ============================================================================
// DEFAULT LOGGER TESTS
// ============================================================================

#[test]
fn test_format_plain_without_location() {
    let line = DefaultLogger::format_plain(&entry(LogSeverity::Warn, None, None));
    assert!(line.contains("[WARN ] [swapframe::Swapchain] present mode fallback"));
    assert!(!line.ends_with(")"));
}

#[test]
fn test_format_plain_with_location() {
    let line = DefaultLogger::format_plain(&entry(LogSeverity::Error, Some("swapchain.rs"), Some(42)));
    assert!(line.contains("[ERROR]"));
    assert!(line.ends_with("(swapchain.rs:42)"));
}

#[test]
fn test_default_logger_min_severity() {
    assert_eq!(DefaultLogger::new().min_severity(), LogSeverity::Trace);
    assert_eq!(DefaultLogger::default().min_severity(), LogSeverity::Trace);
    let logger = DefaultLogger::with_min_severity(LogSeverity::Warn);
    assert_eq!(logger.min_severity(), LogSeverity::Warn);
    // Filtered entries must not panic or print
    logger.log(&entry(LogSeverity::Debug, None, None));
}

#[test]
fn test_logger_is_object_safe() {
    let logger: Box<dyn Logger> = Box::new(DefaultLogger::with_min_severity(LogSeverity::Error));
    logger.log(&entry(LogSeverity::Info, None, None));
}
