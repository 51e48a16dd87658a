//! Integration tests for the logging facade, used from outside the crate
//!
//! No GPU required.
//!
//! Run with: cargo test --test logging_integration_tests

use lumen_engine::lumen::log::{LogEntry, LogSeverity, Logger};
use lumen_engine::lumen::{DeletionQueue, Engine, Error, Result};
use lumen_engine::{engine_bail, engine_debug, engine_error, engine_info, engine_warn};
use serial_test::serial;
use std::sync::{Arc, Mutex};
use std::thread;

// ============================================================================
// TEST LOGGER IMPLEMENTATION
// ============================================================================

/// Logger that keeps every entry it receives
struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl CaptureLogger {
    fn install() -> Arc<Mutex<Vec<LogEntry>>> {
        let entries = Arc::new(Mutex::new(Vec::new()));
        Engine::set_logger(Self { entries: entries.clone() });
        entries
    }
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

fn restore_defaults() {
    Engine::reset_logger();
    Engine::set_min_severity(LogSeverity::Trace);
}

// ============================================================================
// MACROS FROM A DOWNSTREAM CRATE
// ============================================================================

#[test]
#[serial]
fn test_integration_macros_reach_custom_logger() {
    let entries = CaptureLogger::install();

    engine_debug!("app::render", "Recording {} passes", 2);
    engine_info!("app::render", "Swapchain ready");
    engine_warn!("app::render", "Falling back to FIFO");
    engine_error!("app::render", "Device lost");

    {
        let captured = entries.lock().unwrap();
        assert_eq!(captured.len(), 4);
        assert_eq!(captured[0].message, "Recording 2 passes");
        assert_eq!(captured[2].severity, LogSeverity::Warn);

        let error = &captured[3];
        assert_eq!(error.severity, LogSeverity::Error);
        assert_eq!(error.source, "app::render");
        assert!(error.file.is_some_and(|f| f.ends_with("logging_integration_tests.rs")));
        assert!(error.line.is_some());
    }

    restore_defaults();
}

fn require_images(count: u32) -> Result<u32> {
    if count == 0 {
        engine_bail!("app::swapchain", "surface reported {} images", count);
    }
    Ok(count)
}

#[test]
#[serial]
fn test_integration_bail_returns_backend_error() {
    let entries = CaptureLogger::install();

    assert_eq!(require_images(3), Ok(3));
    assert_eq!(
        require_images(0),
        Err(Error::BackendError("surface reported 0 images".to_string()))
    );

    {
        let captured = entries.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].source, "app::swapchain");
    }

    restore_defaults();
}

#[test]
#[serial]
fn test_integration_severity_filter() {
    let entries = CaptureLogger::install();
    Engine::set_min_severity(LogSeverity::Warn);

    engine_debug!("app", "dropped");
    engine_info!("app", "dropped");
    engine_warn!("app", "kept");
    engine_error!("app", "kept");

    {
        let captured = entries.lock().unwrap();
        assert_eq!(captured.len(), 2);
        assert!(captured.iter().all(|e| e.message == "kept"));
    }

    restore_defaults();
}

#[test]
#[serial]
fn test_integration_logging_from_threads() {
    let entries = CaptureLogger::install();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            thread::spawn(move || {
                for j in 0..10 {
                    engine_info!("app::worker", "worker {} step {}", i, j);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(entries.lock().unwrap().len(), 40);

    restore_defaults();
}

// ============================================================================
// DELETION QUEUE
// ============================================================================

#[test]
#[serial]
fn test_integration_deletion_queue_logs_teardown_newest_first() {
    let entries = CaptureLogger::install();

    let mut queue = DeletionQueue::new();
    for name in ["allocator", "pool", "layout"] {
        queue.push(move || engine_debug!("app::teardown", "destroyed {}", name));
    }
    queue.flush();
    assert!(queue.is_empty());

    {
        let captured = entries.lock().unwrap();
        let messages: Vec<_> = captured.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["destroyed layout", "destroyed pool", "destroyed allocator"]);
    }

    restore_defaults();
}
