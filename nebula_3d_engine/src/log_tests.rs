use super::*;
use std::sync::{Arc, Mutex};

/// Logger capturing entries for assertions
struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

// The global logger is process-wide state; tests touching it run serially
#[test]
#[serial_test::serial]
fn test_macros_route_through_installed_logger() {
    let entries = Arc::new(Mutex::new(Vec::new()));
    set_logger(Box::new(CaptureLogger {
        entries: entries.clone(),
    }));

    crate::engine_info!("nebula3d::Tests", "hello {}", 42);
    crate::engine_error!("nebula3d::Tests", "boom");

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 2);
    assert_eq!(captured[0].severity, LogSeverity::Info);
    assert_eq!(captured[0].source, "nebula3d::Tests");
    assert_eq!(captured[0].message, "hello 42");

    // ERROR entries carry file/line details
    assert_eq!(captured[1].severity, LogSeverity::Error);
    assert!(captured[1].file.is_some());
    assert!(captured[1].line.is_some());
    drop(captured);

    set_logger(Box::new(DefaultLogger));
}

#[test]
fn test_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}
