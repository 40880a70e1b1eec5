//! Bounded in-memory log buffer backing `GET /logs` (C10).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

const CAPACITY: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub logger: String,
    pub message: String,
    pub module: Option<String>,
    pub line: Option<u32>,
}

/// A thread-safe, capacity-100 ring buffer of the most recent log lines.
/// Oldest entries fall off the front once full.
#[derive(Clone, Default)]
pub struct LogRingBuffer {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
}

impl LogRingBuffer {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(CAPACITY))),
        }
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().iter().cloned().collect()
    }

    fn push(&self, entry: LogEntry) {
        let mut entries = self.entries.lock().unwrap();
        if entries.len() >= CAPACITY {
            entries.pop_front();
        }
        entries.push_back(entry);
    }
}

struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for LogRingBuffer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut visitor);

        self.push(LogEntry {
            timestamp: Utc::now(),
            level: metadata.level().to_string(),
            logger: metadata.target().to_string(),
            message: visitor.message,
            module: metadata.module_path().map(|s| s.to_string()),
            line: metadata.line(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_at_capacity_dropping_oldest() {
        let buffer = LogRingBuffer::new();
        for i in 0..(CAPACITY + 10) {
            buffer.push(LogEntry {
                timestamp: Utc::now(),
                level: "INFO".to_string(),
                logger: "test".to_string(),
                message: format!("entry {i}"),
                module: None,
                line: None,
            });
        }
        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), CAPACITY);
        assert_eq!(snapshot.first().unwrap().message, "entry 10");
    }
}
