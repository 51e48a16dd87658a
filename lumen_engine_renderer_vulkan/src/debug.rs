/// Vulkan Debug Messenger - routes validation layer messages into the engine log
///
/// Only compiled with the `vulkan-validation` feature. Messages are filtered by the
/// configured [`DebugSeverity`], counted per severity, and forwarded to the
/// process-wide logger under the `lumen::vulkan::validation` source.

use ash::vk;
use colored::*;
use lumen_engine::lumen::render::DebugSeverity;
use lumen_engine::lumen::Result;
use lumen_engine::{engine_debug, engine_error, engine_info, engine_trace, engine_warn};
use rustc_hash::FxHashMap;
use std::ffi::CStr;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Mutex;

use crate::vulkan_error::vk_check;

const SOURCE: &str = "lumen::vulkan::validation";

/// Severity filter shared with the callback
static SEVERITY_FILTER: AtomicU8 = AtomicU8::new(DebugSeverity::ErrorsAndWarnings as u8);

/// Global validation statistics (atomic counters)
static VALIDATION_STATS: ValidationStatsTracker = ValidationStatsTracker::new();

/// Occurrences per message id, for the duplicate report
static MESSAGE_TRACKER: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

/// Snapshot of validation message counts since the messenger was created
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

    fn get_stats(&self) -> ValidationStats {
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

/// Severity bits the messenger subscribes to for a given filter
pub fn severity_flags(severity: DebugSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    match severity {
        DebugSeverity::ErrorsOnly => vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        DebugSeverity::ErrorsAndWarnings => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
        }
        DebugSeverity::All => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
        }
    }
}

fn severity_from_u8(value: u8) -> DebugSeverity {
    match value {
        v if v == DebugSeverity::ErrorsOnly as u8 => DebugSeverity::ErrorsOnly,
        v if v == DebugSeverity::All as u8 => DebugSeverity::All,
        _ => DebugSeverity::ErrorsAndWarnings,
    }
}

/// Whether a message of `message_severity` passes `filter`
pub fn passes_filter(filter: DebugSeverity, message_severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> bool {
    severity_flags(filter).intersects(message_severity)
}

fn message_type_name(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    }
}

/// Count one more occurrence of `message_id`, returning the new count
fn track_message(message_id: &str) -> u32 {
    let Ok(mut guard) = MESSAGE_TRACKER.lock() else {
        return 1;
    };
    let count = guard
        .get_or_insert_with(FxHashMap::default)
        .entry(message_id.to_string())
        .or_insert(0);
    *count += 1;
    *count
}

/// Current validation statistics
pub fn get_validation_stats() -> ValidationStats {
    VALIDATION_STATS.get_stats()
}

/// Log a summary of validation messages seen so far
pub fn print_validation_stats_report() {
    let stats = get_validation_stats();

    if stats.total() == 0 {
        engine_info!(SOURCE, "{}", "No validation messages".green());
        return;
    }

    let duplicates = MESSAGE_TRACKER
        .lock()
        .ok()
        .and_then(|guard| guard.as_ref().map(|m| m.values().filter(|&&c| c > 1).count()))
        .unwrap_or(0);

    engine_info!(SOURCE, "{} {} {} {} {} {} {} {} ({} repeated message ids)",
        "errors:".red().bold(), stats.errors,
        "warnings:".yellow().bold(), stats.warnings,
        "info:".cyan(), stats.info,
        "verbose:".bright_black(), stats.verbose,
        duplicates);
}

unsafe fn cstr_or<'a>(ptr: *const std::os::raw::c_char, fallback: &'a str) -> std::borrow::Cow<'a, str> {
    if ptr.is_null() {
        std::borrow::Cow::Borrowed(fallback)
    } else {
        CStr::from_ptr(ptr).to_string_lossy()
    }
}

/// Vulkan debug messenger callback
///
/// Never aborts the call that triggered the message.
pub unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }

    let filter = severity_from_u8(SEVERITY_FILTER.load(Ordering::Relaxed));
    if !passes_filter(filter, message_severity) {
        return vk::FALSE;
    }

    let callback_data = &*p_callback_data;
    let message_id = cstr_or(callback_data.p_message_id_name, "Unknown");
    let message = cstr_or(callback_data.p_message, "No message");
    let type_name = message_type_name(message_type);

    VALIDATION_STATS.record(message_severity);
    let occurrences = track_message(&message_id);
    let repeat = if occurrences > 1 {
        format!(" [x{}]", occurrences)
    } else {
        String::new()
    };

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        engine_error!(SOURCE, "[{}] {}{}: {}", type_name, message_id, repeat, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        engine_warn!(SOURCE, "[{}] {}{}: {}", type_name, message_id, repeat, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        engine_debug!(SOURCE, "[{}] {}{}: {}", type_name, message_id, repeat, message);
    } else {
        engine_trace!(SOURCE, "[{}] {}{}: {}", type_name, message_id, repeat, message);
    }

    vk::FALSE
}

/// Debug utils messenger owned by the instance
pub struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    /// Install the callback; statistics restart from zero
    pub fn new(entry: &ash::Entry, instance: &ash::Instance, severity: DebugSeverity) -> Result<Self> {
        VALIDATION_STATS.reset();
        if let Ok(mut guard) = MESSAGE_TRACKER.lock() {
            *guard = Some(FxHashMap::default());
        }
        SEVERITY_FILTER.store(severity as u8, Ordering::Relaxed);

        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let info = messenger_create_info(severity);
        let messenger = unsafe {
            vk_check!("vkCreateDebugUtilsMessengerEXT", loader.create_debug_utils_messenger(&info, None))?
        };

        engine_debug!("lumen::vulkan", "Debug messenger installed ({:?})", severity);
        Ok(Self { loader, messenger })
    }

    /// Remove the callback; must run before the instance is destroyed
    pub fn destroy(&mut self) {
        if self.messenger != vk::DebugUtilsMessengerEXT::null() {
            unsafe { self.loader.destroy_debug_utils_messenger(self.messenger, None) };
            self.messenger = vk::DebugUtilsMessengerEXT::null();
        }
    }
}

/// Messenger parameters for a severity filter
pub fn messenger_create_info(severity: DebugSeverity) -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(severity_flags(severity))
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(vulkan_debug_callback))
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
