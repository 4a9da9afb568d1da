//! # Query Engine
//!
//! Inclusive date-range filtering over cached records. Bounds and keys are
//! compared as plain strings; correctness depends on every key being an
//! 8-digit, zero-padded `YYYYMMDD` value. Keys that break that rule (a
//! 6-digit date, say) are still compared as-is and may sort wrongly.

use super::cache_store::CacheStore;
use super::record::{trade_date_key, Record};

/// An inclusive `[start, end]` range of canonical date keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    /// Lower bound, inclusive.
    pub start: String,
    /// Upper bound, inclusive.
    pub end: String,
}

impl DateRange {
    /// Builds a range from any two string-like bounds.
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// `true` when `start` sorts after `end`; such a range matches nothing.
    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }

    /// Whether a canonical key falls inside the range.
    pub fn contains(&self, key: &str) -> bool {
        key >= self.start.as_str() && key <= self.end.as_str()
    }

    /// Whether a record's `tradeDateKey` falls inside the range. Records
    /// without a usable key never match.
    pub fn matches(&self, record: &Record) -> bool {
        trade_date_key(record).is_some_and(|key| self.contains(&key))
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Stable filter over a record slice: keeps matches in their original order.
pub fn filter(records: &[Record], range: &DateRange) -> Vec<Record> {
    records.iter().filter(|r| range.matches(r)).cloned().collect()
}

/// Runs the range filter against the store's current snapshot.
pub fn query(store: &CacheStore, range: &DateRange) -> Vec<Record> {
    store.snapshot_and_filter(|r| range.matches(r))
}
