//! A buffer of records with the instant it was last flushed.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct Batch<T> {
    items: Vec<T>,
    last_flush: Instant,
}

impl<T> Batch<T> {
    pub fn new(now: Instant) -> Self {
        Self {
            items: Vec::new(),
            last_flush: now,
        }
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Non-empty and older than `timeout` since the last successful flush.
    pub fn is_stale(&self, timeout: Duration, now: Instant) -> bool {
        !self.items.is_empty() && now.saturating_duration_since(self.last_flush) >= timeout
    }

    /// Size trigger or time trigger.
    pub fn should_flush(&self, batch_size: usize, timeout: Duration, now: Instant) -> bool {
        self.items.len() >= batch_size || self.is_stale(timeout, now)
    }

    /// Swap the buffer out, leaving an empty one behind.
    pub fn take(&mut self) -> Vec<T> {
        std::mem::take(&mut self.items)
    }

    pub fn mark_flushed(&mut self, now: Instant) {
        self.last_flush = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_size_and_time_triggers() {
        let start = Instant::now();
        let mut batch = Batch::new(start);
        let timeout = Duration::from_secs(30);

        assert!(!batch.should_flush(2, timeout, start + Duration::from_secs(60)));

        batch.push(1);
        assert!(!batch.should_flush(2, timeout, start + Duration::from_secs(29)));
        assert!(batch.should_flush(2, timeout, start + Duration::from_secs(30)));

        batch.push(2);
        assert!(batch.should_flush(2, timeout, start));

        assert_eq!(batch.take(), vec![1, 2]);
        assert!(batch.is_empty());
        batch.mark_flushed(start + Duration::from_secs(40));
        batch.push(3);
        assert!(!batch.is_stale(timeout, start + Duration::from_secs(60)));
    }
}
