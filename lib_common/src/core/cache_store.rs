//! # Cache Store
//!
//! The single owner of the loaded record set. Writes replace the whole
//! snapshot; reads scan it under the same guard and hand back owned copies
//! of the matching records, so no caller ever holds the lock across I/O,
//! logging or a transport send.
//!
//! A poisoned lock is recovered rather than propagated: the snapshot is only
//! ever swapped in one assignment, so it cannot be observed half-written.

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::record::Record;

/// Mutex-guarded holder of the full record set.
#[derive(Debug, Default)]
pub struct CacheStore {
    records: Mutex<Vec<Record>>,
}

impl CacheStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<Record>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs `records` as the new snapshot, discarding the previous one.
    ///
    /// Concurrent calls are serialized by the guard; the last writer wins.
    pub fn replace_all(&self, records: Vec<Record>) {
        let previous = {
            let mut current = self.guard();
            std::mem::replace(&mut *current, records)
        };
        // The old snapshot is freed after the guard is released.
        drop(previous);
    }

    /// Scans the current snapshot and returns clones of every record that
    /// satisfies `predicate`, in cache order.
    ///
    /// The guard is held for the scan and copy only. `predicate` must be a
    /// pure in-memory check.
    pub fn snapshot_and_filter<F>(&self, predicate: F) -> Vec<Record>
    where
        F: Fn(&Record) -> bool,
    {
        let current = self.guard();
        current.iter().filter(|r| predicate(r)).cloned().collect()
    }

    /// Number of records in the current snapshot.
    pub fn len(&self) -> usize {
        self.guard().len()
    }

    /// `true` when nothing is cached (never loaded, or the load failed).
    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}
