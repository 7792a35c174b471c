//! Process-local exposure of handle counts for external pollers.

use crate::error::DbError;
use crate::tracker::HandleTracker;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::warn;

/// Receives handle counters of monitored connection sources.
///
/// Sinks only read the counters; they never change them.
pub trait MonitoringSink: Send + Sync {
    /// Exposes `tracker` and returns the identifier it was registered under.
    fn register(&self, name: &str, tracker: Arc<HandleTracker>) -> Result<String, DbError>;

    fn unregister(&self, id: &str);

    /// Called for every non-fatal failure during teardown.
    fn report_teardown_error(&self, name: &str, err: &DbError) {
        warn!(datasource = name, error = %err, "connection source teardown error");
    }
}

/// Point-in-time view of one monitored datasource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleCountSnapshot {
    pub id: String,
    pub name: String,
    pub handle_count: u64,
    pub registered_at: DateTime<Utc>,
}

struct Entry {
    name: String,
    tracker: Weak<HandleTracker>,
    registered_at: DateTime<Utc>,
}

/// In-memory [`MonitoringSink`] keyed by a generated identifier.
///
/// Counters are held weakly so a forgotten `unregister` does not keep a torn
/// down connection source's tracker alive.
pub struct HandleCountRegistry {
    app: String,
    seq: AtomicU64,
    entries: DashMap<String, Entry>,
    teardown_errors: AtomicU64,
}

impl HandleCountRegistry {
    pub fn new(app: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            seq: AtomicU64::new(0),
            entries: DashMap::new(),
            teardown_errors: AtomicU64::new(0),
        }
    }

    /// Current handle count for a datasource, if it is monitored.
    pub fn handle_count(&self, name: &str) -> Option<u64> {
        self.entries
            .iter()
            .filter(|e| e.value().name == name)
            .find_map(|e| e.value().tracker.upgrade())
            .map(|t| t.current())
    }

    /// All live monitored datasources, ordered by name.
    pub fn snapshot(&self) -> Vec<HandleCountSnapshot> {
        let mut out: Vec<_> = self
            .entries
            .iter()
            .filter_map(|e| {
                let tracker = e.value().tracker.upgrade()?;
                Some(HandleCountSnapshot {
                    id: e.key().clone(),
                    name: e.value().name.clone(),
                    handle_count: tracker.current(),
                    registered_at: e.value().registered_at,
                })
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of teardown failures reported so far.
    pub fn teardown_errors(&self) -> u64 {
        self.teardown_errors.load(Ordering::Relaxed)
    }
}

impl MonitoringSink for HandleCountRegistry {
    fn register(&self, name: &str, tracker: Arc<HandleTracker>) -> Result<String, DbError> {
        if name.trim().is_empty() {
            return Err(DbError::InvalidArgument(
                "monitored datasource name must not be blank".into(),
            ));
        }
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let id = format!("uorm:type=ConnectionSource,application={},name={},id={}", self.app, name, seq);
        self.entries.insert(
            id.clone(),
            Entry {
                name: name.to_string(),
                tracker: Arc::downgrade(&tracker),
                registered_at: Utc::now(),
            },
        );
        Ok(id)
    }

    fn unregister(&self, id: &str) {
        self.entries.remove(id);
    }

    fn report_teardown_error(&self, name: &str, err: &DbError) {
        self.teardown_errors.fetch_add(1, Ordering::Relaxed);
        warn!(datasource = name, error = %err, "connection source teardown error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_read() {
        let sink = HandleCountRegistry::new("app");
        let tracker = Arc::new(HandleTracker::new("primary"));
        let id = sink.register("primary", tracker.clone()).unwrap();
        assert!(id.contains("name=primary"));

        tracker.acquire();
        tracker.acquire();
        assert_eq!(sink.handle_count("primary"), Some(2));
        assert_eq!(sink.snapshot()[0].handle_count, 2);

        sink.unregister(&id);
        assert_eq!(sink.handle_count("primary"), None);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_dropped_tracker_disappears_from_snapshot() {
        let sink = HandleCountRegistry::new("app");
        let tracker = Arc::new(HandleTracker::new("primary"));
        sink.register("primary", tracker.clone()).unwrap();
        drop(tracker);
        assert!(sink.snapshot().is_empty());
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let sink = HandleCountRegistry::new("app");
        let tracker = Arc::new(HandleTracker::new(" "));
        assert!(matches!(sink.register(" ", tracker), Err(DbError::InvalidArgument(_))));
    }
}
