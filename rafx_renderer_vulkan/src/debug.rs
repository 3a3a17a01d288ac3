/// Vulkan debug messenger - routes validation layer messages into the rafx logger
///
/// Messages are filtered by severity and category, counted, and grouped:
/// a message seen before is logged with an `[xN]` repeat indicator.

use ash::vk;
use colored::*;
use rafx_core::{rafx_debug, rafx_error, rafx_trace, rafx_warn};
use rustc_hash::FxHashMap;
use std::ffi::CStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

const SOURCE: &str = "rafx::vulkan::validation";

/// Global debug configuration (shared across callbacks)
static DEBUG_CONFIG: Mutex<Option<DebugConfig>> = Mutex::new(None);

/// Global validation statistics
static VALIDATION_STATS: ValidationStatsTracker = ValidationStatsTracker::new();

/// Global message tracker for grouping identical messages
static MESSAGE_TRACKER: Mutex<Option<MessageTracker>> = Mutex::new(None);

/// Which severities reach the logger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    ErrorsOnly,
    ErrorsAndWarnings,
    All,
}

impl DebugSeverity {
    pub(crate) fn to_vk(self) -> vk::DebugUtilsMessageSeverityFlagsEXT {
        use vk::DebugUtilsMessageSeverityFlagsEXT as S;
        match self {
            DebugSeverity::ErrorsOnly => S::ERROR,
            DebugSeverity::ErrorsAndWarnings => S::ERROR | S::WARNING,
            DebugSeverity::All => S::ERROR | S::WARNING | S::INFO | S::VERBOSE,
        }
    }
}

/// Message categories to display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugMessageFilter {
    pub show_general: bool,
    pub show_validation: bool,
    pub show_performance: bool,
}

impl Default for DebugMessageFilter {
    fn default() -> Self {
        Self {
            show_general: true,
            show_validation: true,
            show_performance: true,
        }
    }
}

/// Debug configuration for the callback
#[derive(Debug, Clone)]
pub struct DebugConfig {
    pub severity: DebugSeverity,
    pub message_filter: DebugMessageFilter,
    /// Panic on the first validation error (strict mode for tests)
    pub panic_on_error: bool,
    pub enable_stats: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            severity: DebugSeverity::ErrorsAndWarnings,
            message_filter: DebugMessageFilter::default(),
            panic_on_error: false,
            enable_stats: true,
        }
    }
}

/// Validation message counters
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

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

struct ValidationStatsTracker {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

impl ValidationStatsTracker {
    const fn new() -> Self {
        Self {
            errors: AtomicU32::new(0),
            warnings: AtomicU32::new(0),
            info: AtomicU32::new(0),
            verbose: AtomicU32::new(0),
        }
    }

    fn record(&self, severity: vk::DebugUtilsMessageSeverityFlagsEXT) {
        let counter = if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            &self.errors
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            &self.warnings
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            &self.info
        } else {
            &self.verbose
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn get(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.errors.store(0, Ordering::Relaxed);
        self.warnings.store(0, Ordering::Relaxed);
        self.info.store(0, Ordering::Relaxed);
        self.verbose.store(0, Ordering::Relaxed);
    }
}

#[derive(Default)]
struct MessageTracker {
    messages: FxHashMap<String, u32>,
}

impl MessageTracker {
    fn track_message(&mut self, message: &str) -> u32 {
        let count = self.messages.entry(message.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    fn repeated(&self) -> usize {
        self.messages.values().filter(|&&count| count > 1).count()
    }
}

/// Install the callback configuration and reset statistics
pub fn init_debug_config(config: DebugConfig) {
    VALIDATION_STATS.reset();
    if let Ok(mut tracker) = MESSAGE_TRACKER.lock() {
        *tracker = Some(MessageTracker::default());
    }
    if let Ok(mut current) = DEBUG_CONFIG.lock() {
        *current = Some(config);
    }
}

/// Stop handling messages (called before the messenger is destroyed)
pub fn cleanup_debug_config() {
    if let Ok(mut current) = DEBUG_CONFIG.lock() {
        *current = None;
    }
}

/// Current validation statistics
pub fn validation_stats() -> ValidationStats {
    VALIDATION_STATS.get()
}

/// Print a colored summary of the validation messages seen so far
pub fn print_validation_stats_report() {
    let stats = validation_stats();

    if stats.total() == 0 {
        println!("\n{}", "No validation messages".green().bold());
        return;
    }

    println!("\n{}", "=== Validation Statistics Report ===".bright_blue().bold());
    if stats.errors > 0 {
        println!("  {} {}", "Errors:".red().bold(), stats.errors);
    }
    if stats.warnings > 0 {
        println!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
    }
    if stats.info > 0 {
        println!("  {} {}", "Info:".cyan(), stats.info);
    }
    if stats.verbose > 0 {
        println!("  {} {}", "Verbose:".bright_black(), stats.verbose);
    }
    println!("  {} {}", "Total:".white().bold(), stats.total());

    if let Ok(tracker) = MESSAGE_TRACKER.lock() {
        let repeated = tracker.as_ref().map(MessageTracker::repeated).unwrap_or(0);
        if repeated > 0 {
            println!("\n  {} message(s) appeared multiple times", repeated);
        }
    }
    println!("{}\n", "====================================".bright_blue().bold());
}

/// Whether a message passes the configured filters
fn should_display(
    config: &DebugConfig,
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
) -> bool {
    if !config.severity.to_vk().intersects(severity) {
        return false;
    }
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        config.message_filter.show_validation
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        config.message_filter.show_performance
    } else {
        config.message_filter.show_general
    }
}

fn type_name(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    }
}

/// Count, group and log one message
fn handle_message(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    message_id: &str,
    message: &str,
) {
    let config = match DEBUG_CONFIG.lock().ok().and_then(|guard| guard.clone()) {
        Some(config) => config,
        None => return,
    };
    if !should_display(&config, severity, message_type) {
        return;
    }

    let occurrences = if config.enable_stats {
        VALIDATION_STATS.record(severity);
        MESSAGE_TRACKER
            .lock()
            .ok()
            .map(|mut guard| guard.get_or_insert_with(MessageTracker::default).track_message(message))
            .unwrap_or(1)
    } else {
        1
    };
    let repeat = if occurrences > 1 {
        format!(" [x{}]", occurrences)
    } else {
        String::new()
    };
    let kind = type_name(message_type);

    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        rafx_error!(SOURCE, "[{}]{} {}: {}", kind, repeat, message_id, message);
        if config.panic_on_error {
            panic!("Vulkan validation error {}: {}", message_id, message);
        }
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        rafx_warn!(SOURCE, "[{}]{} {}: {}", kind, repeat, message_id, message);
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        rafx_debug!(SOURCE, "[{}]{} {}: {}", kind, repeat, message_id, message);
    } else {
        rafx_trace!(SOURCE, "[{}]{} {}: {}", kind, repeat, message_id, message);
    }
}

/// Vulkan debug messenger callback
///
/// # Safety
///
/// Called by the validation layers with a valid callback data pointer.
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
    let message_id = if callback_data.p_message_id_name.is_null() {
        "Unknown"
    } else {
        CStr::from_ptr(callback_data.p_message_id_name)
            .to_str()
            .unwrap_or("Invalid UTF-8")
    };
    let message = if callback_data.p_message.is_null() {
        "No message"
    } else {
        CStr::from_ptr(callback_data.p_message)
            .to_str()
            .unwrap_or("Invalid UTF-8")
    };

    handle_message(message_severity, message_type, message_id, message);

    vk::FALSE
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
