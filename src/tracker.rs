//! Lock-free open-handle counter attached to every connection source.

use crate::error::DbError;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::error;

/// Counts the handles currently checked out of one connection source.
///
/// The counter always runs; whether it is exposed to a monitoring sink is a
/// per-datasource setting.
#[derive(Debug)]
pub struct HandleTracker {
    name: String,
    count: AtomicU64,
}

impl HandleTracker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: AtomicU64::new(0),
        }
    }

    /// Datasource this counter belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records a newly opened handle and returns the new count.
    pub fn acquire(&self) -> u64 {
        self.count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Records a closed handle and returns the new count.
    ///
    /// A release with no open handle leaves the count at zero and returns
    /// [`DbError::HandleCountUnderflow`].
    pub fn release(&self) -> Result<u64, DbError> {
        match self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(prev) => Ok(prev - 1),
            Err(_) => {
                error!(datasource = %self.name, "handle released without a matching acquire");
                Err(DbError::HandleCountUnderflow(self.name.clone()))
            }
        }
    }

    /// Current number of open handles.
    pub fn current(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_balanced_acquire_release() {
        let tracker = HandleTracker::new("primary");
        for i in 1..=5 {
            assert_eq!(tracker.acquire(), i);
        }
        for i in (0..5).rev() {
            assert_eq!(tracker.release().unwrap(), i);
        }
        assert_eq!(tracker.current(), 0);
    }

    #[test]
    fn test_unmatched_release_is_flagged() {
        let tracker = HandleTracker::new("primary");
        assert!(matches!(
            tracker.release(),
            Err(DbError::HandleCountUnderflow(name)) if name == "primary"
        ));
        assert_eq!(tracker.current(), 0);
        tracker.acquire();
        assert_eq!(tracker.current(), 1);
    }

    #[test]
    fn test_concurrent_updates() {
        let tracker = Arc::new(HandleTracker::new("primary"));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        tracker.acquire();
                        tracker.release().unwrap();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(tracker.current(), 0);
    }
}
