use std::sync::{Arc, Mutex};

use chrono::Local;

use crate::{
    manager::observer::SupervisorObserver,
    models::log_buffer::BoundedLogBuffer,
    process::{OutputObserver, StreamKind},
    sync::mutex_lock_or_recover,
};

pub const STDERR_MARKER: &str = "[WARN]";

/// Timestamped server log shared by the stream readers, the supervisor
/// worker and callers. Pushes the full snapshot to the observer after every
/// append, in append order.
///
/// Observers must not append to the log from inside `logs_updated`.
pub struct LogAggregator {
    buffer: BoundedLogBuffer,
    observer: Arc<dyn SupervisorObserver>,
    delivery: Mutex<()>,
}

impl LogAggregator {
    pub fn new(capacity: usize, observer: Arc<dyn SupervisorObserver>) -> Self {
        Self {
            buffer: BoundedLogBuffer::new(capacity),
            observer,
            delivery: Mutex::new(()),
        }
    }

    /// A record written by the supervisor itself.
    pub fn record(&self, text: impl AsRef<str>) {
        self.push(format!("[{}] {}", timestamp(), text.as_ref()));
    }

    /// A chunk captured from the server's output. Each non-blank line of the
    /// chunk becomes one record; a chunk without a trailing newline is
    /// recorded right away.
    pub fn capture(&self, kind: StreamKind, text: &str) {
        for line in text.lines().filter(|line| !line.trim().is_empty()) {
            let record = match kind {
                StreamKind::Stdout => format!("[{}] {}", timestamp(), line),
                StreamKind::Stderr => format!("[{}] {} {}", timestamp(), STDERR_MARKER, line),
            };
            self.push(record);
        }
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.buffer.snapshot()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Observer that feeds process output into this log.
    pub fn output_observer(self: &Arc<Self>) -> OutputObserver {
        let logs = Arc::clone(self);
        Arc::new(move |kind: StreamKind, text: &str| logs.capture(kind, text))
    }

    fn push(&self, record: String) {
        // Held across the callback so an older snapshot never lands last.
        let _delivery = mutex_lock_or_recover(&self.delivery);
        let snapshot = self.buffer.append_and_snapshot(record);
        self.observer.logs_updated(&snapshot);
    }
}

fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}
