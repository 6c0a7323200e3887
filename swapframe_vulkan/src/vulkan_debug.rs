//! Vulkan debug messenger routed to the swapframe logger
//!
//! Validation messages are counted per severity and forwarded to the
//! process-wide logger. Repeated messages are tagged with their occurrence
//! count.

#![cfg_attr(not(feature = "vulkan-validation"), allow(dead_code))]

use ash::vk;
use colored::*;
use rustc_hash::FxHashMap;
use std::ffi::CStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use swapframe_core::swapframe::log::LogSeverity;
use swapframe_core::swapframe::DebugSeverity;

const SOURCE: &str = "swapframe::vulkan::validation";

/// Message counts per severity, indexed by [`counter_slot`]
static COUNTERS: [AtomicU32; 4] = [AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0)];

/// Occurrences per message text
static MESSAGE_TRACKER: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

/// Validation message counts since the device was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

fn counter_slot(severity: LogSeverity) -> usize {
    match severity {
        LogSeverity::Error => 0,
        LogSeverity::Warn => 1,
        LogSeverity::Info => 2,
        LogSeverity::Debug | LogSeverity::Trace => 3,
    }
}

/// Reset counters and the repeat tracker
pub fn reset_validation_stats() {
    for counter in &COUNTERS {
        counter.store(0, Ordering::Relaxed);
    }
    if let Ok(mut tracker) = MESSAGE_TRACKER.lock() {
        *tracker = Some(FxHashMap::default());
    }
}

pub fn validation_stats() -> ValidationStats {
    let count = |severity: LogSeverity| COUNTERS[counter_slot(severity)].load(Ordering::Relaxed);
    ValidationStats {
        errors: count(LogSeverity::Error),
        warnings: count(LogSeverity::Warn),
        info: count(LogSeverity::Info),
        verbose: count(LogSeverity::Trace),
    }
}

fn repeated_message_count() -> usize {
    MESSAGE_TRACKER
        .lock()
        .ok()
        .and_then(|tracker| {
            tracker
                .as_ref()
                .map(|messages| messages.values().filter(|&&count| count > 1).count())
        })
        .unwrap_or(0)
}

/// Print a colored summary of the validation messages seen so far
pub fn print_validation_stats_report() {
    let stats = validation_stats();
    if stats.total() == 0 {
        println!("\n{}", "swapframe: no validation messages".green().bold());
        return;
    }

    let rows = [
        ("errors".red().bold(), stats.errors),
        ("warnings".yellow().bold(), stats.warnings),
        ("info".cyan(), stats.info),
        ("verbose".bright_black(), stats.verbose),
    ];
    println!("\n{}", "swapframe validation summary".bright_blue().bold());
    for (label, count) in rows.iter().filter(|(_, count)| *count > 0) {
        println!("  {:>6} {}", count, label);
    }
    println!("  {:>6} {}", stats.total(), "total".white().bold());

    let repeated = repeated_message_count();
    if repeated > 0 {
        println!("  {} distinct message(s) repeated", repeated);
    }
    println!();
}

/// Messenger severity mask for a configured verbosity
pub fn severity_flags(severity: DebugSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    match severity {
        DebugSeverity::ErrorsOnly => vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        DebugSeverity::ErrorsAndWarnings => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
        }
        DebugSeverity::All => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
        }
    }
}

/// Logger severity for a messenger severity
pub fn log_severity(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> LogSeverity {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        LogSeverity::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        LogSeverity::Warn
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        LogSeverity::Info
    } else {
        LogSeverity::Trace
    }
}

fn message_type_label(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    }
}

fn track_message(message: &str) -> u32 {
    let Ok(mut guard) = MESSAGE_TRACKER.lock() else {
        return 1;
    };
    let tracker = guard.get_or_insert_with(FxHashMap::default);
    let count = tracker.entry(message.to_string()).or_insert(0);
    *count += 1;
    *count
}

/// Debug messenger callback
///
/// # Safety
///
/// Called by the Vulkan loader with valid callback data.
pub unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }
    let callback_data = &*p_callback_data;
    let message_id_name = if callback_data.p_message_id_name.is_null() {
        "Unknown"
    } else {
        CStr::from_ptr(callback_data.p_message_id_name)
            .to_str()
            .unwrap_or("Invalid UTF-8")
    };
    let message = if callback_data.p_message.is_null() {
        "No message"
    } else {
        CStr::from_ptr(callback_data.p_message).to_str().unwrap_or("Invalid UTF-8")
    };

    let severity = log_severity(message_severity);
    COUNTERS[counter_slot(severity)].fetch_add(1, Ordering::Relaxed);

    let occurrences = track_message(message);
    let repeat = if occurrences > 1 { format!(" [x{}]", occurrences) } else { String::new() };

    swapframe_core::log::log(
        severity,
        SOURCE,
        format!(
            "[{}]{} {}: {}",
            message_type_label(message_type),
            repeat,
            message_id_name,
            message
        ),
    );

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_flags_widen_with_verbosity() {
        assert_eq!(severity_flags(DebugSeverity::ErrorsOnly), vk::DebugUtilsMessageSeverityFlagsEXT::ERROR);
        assert!(severity_flags(DebugSeverity::ErrorsAndWarnings)
            .contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING));
        assert!(severity_flags(DebugSeverity::All).contains(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE));
    }

    #[test]
    fn test_log_severity_mapping() {
        assert_eq!(log_severity(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR), LogSeverity::Error);
        assert_eq!(log_severity(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING), LogSeverity::Warn);
        assert_eq!(log_severity(vk::DebugUtilsMessageSeverityFlagsEXT::INFO), LogSeverity::Info);
        assert_eq!(log_severity(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE), LogSeverity::Trace);
    }

    #[test]
    fn test_verbose_severities_share_a_counter() {
        assert_eq!(counter_slot(LogSeverity::Debug), counter_slot(LogSeverity::Trace));
        assert_ne!(counter_slot(LogSeverity::Error), counter_slot(LogSeverity::Warn));
    }

    #[test]
    fn test_stats_total() {
        let stats = ValidationStats { errors: 1, warnings: 2, info: 3, verbose: 4 };
        assert_eq!(stats.total(), 10);
    }
}
