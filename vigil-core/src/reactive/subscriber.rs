//! Identifier types for the reactive system.
//!
//! Watchers and dependencies each get a unique, monotonically increasing ID
//! when created. Watcher IDs double as the firing order: ascending ID is
//! ascending creation order.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatcherId(u64);

impl WatcherId {
    /// Generate a new unique watcher ID.
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Unique identifier for a dependency.
///
/// Only uniqueness matters; the ordering between dependencies carries no
/// meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepId(u64);

impl DepId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watcher_ids_increase() {
        let id1 = WatcherId::next();
        let id2 = WatcherId::next();
        let id3 = WatcherId::next();

        assert!(id1 < id2);
        assert!(id2 < id3);
    }

    #[test]
    fn dep_ids_are_unique() {
        let a = DepId::next();
        let b = DepId::next();
        assert_ne!(a, b);
    }
}
