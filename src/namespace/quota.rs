//! Per-namespace daily usage counters.
//!
//! Only consulted when `quota_mode = "daily"`. Counters live in process
//! memory, so each gateway replica enforces its own share of the quota.

use chrono::NaiveDate;
use dashmap::DashMap;

/// Events accepted per namespace for the current UTC day.
#[derive(Debug, Default)]
pub struct DailyUsage {
    counters: DashMap<String, (NaiveDate, u64)>,
}

impl DailyUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events already counted for `namespace` on `day`.
    pub fn used(&self, namespace: &str, day: NaiveDate) -> u64 {
        match self.counters.get(namespace) {
            Some(entry) if entry.0 == day => entry.1,
            _ => 0,
        }
    }

    /// Add `count` if the total stays within `limit`. The check and the
    /// increment happen under the same entry lock.
    pub fn try_reserve(&self, namespace: &str, day: NaiveDate, count: u64, limit: u64) -> bool {
        let mut entry = self
            .counters
            .entry(namespace.to_string())
            .or_insert((day, 0));
        if entry.0 != day {
            *entry = (day, 0);
        }
        match entry.1.checked_add(count) {
            Some(total) if total <= limit => {
                entry.1 = total;
                true
            }
            _ => false,
        }
    }

    /// Give back `count` reserved on `day`. Nothing happens once the day
    /// rolled over.
    pub fn release(&self, namespace: &str, day: NaiveDate, count: u64) {
        if let Some(mut entry) = self.counters.get_mut(namespace) {
            if entry.0 == day {
                entry.1 = entry.1.saturating_sub(count);
            }
        }
    }
}
