//! In-process durable log.
//!
//! Topics, keyed partitions, headers and per-group committed offsets with the
//! same observable behaviour as the broker backend, minus persistence. Used
//! by single-process deployments (`hub all`) and by tests.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::Notify;

use crate::log::error::LogError;
use crate::log::record::{ConsumedMessage, Delivery, LogMessage};
use crate::log::transport::{LogConsumer, LogProducer};

/// Shared handle to an in-memory log. Clones refer to the same log.
#[derive(Debug, Clone)]
pub struct MemoryLog {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    partitions: usize,
    state: Mutex<State>,
    appended: Notify,
    available: AtomicBool,
    closed: AtomicBool,
}

#[derive(Debug, Default)]
struct State {
    topics: HashMap<String, Vec<Vec<ConsumedMessage>>>,
    /// (group, topic, partition) -> next offset to read
    committed: HashMap<(String, String, i32), i64>,
}

impl MemoryLog {
    pub fn new(partitions: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                partitions: partitions.max(1),
                state: Mutex::new(State::default()),
                appended: Notify::new(),
                available: AtomicBool::new(true),
                closed: AtomicBool::new(false),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn partition_for(&self, key: Option<&str>) -> usize {
        let n = self.inner.partitions;
        match key {
            Some(key) => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                (hasher.finish() % n as u64) as usize
            }
            None => rand::thread_rng().gen_range(0..n),
        }
    }

    /// Join `group` reading `topics`. Reading starts at the group's
    /// committed offsets.
    pub fn subscribe(&self, group: &str, topics: &[&str]) -> MemoryConsumer {
        MemoryConsumer {
            log: self.clone(),
            group: group.to_string(),
            topics: topics.iter().map(|t| t.to_string()).collect(),
            positions: HashMap::new(),
            cursor: 0,
        }
    }

    /// Toggle broker reachability. Sends fail while unavailable.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Stop the log; pending `recv` calls return [`LogError::Closed`] once
    /// drained.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.appended.notify_waiters();
    }

    /// All messages on `topic`, ordered by partition then offset.
    pub fn messages(&self, topic: &str) -> Vec<ConsumedMessage> {
        self.lock()
            .topics
            .get(topic)
            .map(|partitions| partitions.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    pub fn committed(&self, group: &str, topic: &str, partition: i32) -> Option<i64> {
        self.lock()
            .committed
            .get(&(group.to_string(), topic.to_string(), partition))
            .copied()
    }
}

#[async_trait]
impl LogProducer for MemoryLog {
    async fn send(&self, message: LogMessage, _timeout: Duration) -> Result<Delivery, LogError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(LogError::Closed);
        }
        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(LogError::Unavailable("memory log marked unavailable".into()));
        }

        let partition = self.partition_for(message.key.as_deref());
        let delivery = {
            let mut state = self.lock();
            let partitions = state
                .topics
                .entry(message.topic.clone())
                .or_insert_with(|| vec![Vec::new(); self.inner.partitions]);
            let log = &mut partitions[partition];
            let offset = log.len() as i64;
            log.push(ConsumedMessage {
                topic: message.topic,
                partition: partition as i32,
                offset,
                key: message.key,
                value: message.value,
                headers: message.headers,
            });
            Delivery {
                partition: partition as i32,
                offset,
            }
        };

        self.inner.appended.notify_waiters();
        Ok(delivery)
    }

    async fn flush(&self, _timeout: Duration) -> Result<(), LogError> {
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        self.inner.available.load(Ordering::SeqCst) && !self.inner.closed.load(Ordering::SeqCst)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// One group member reading every partition of its topics.
#[derive(Debug)]
pub struct MemoryConsumer {
    log: MemoryLog,
    group: String,
    topics: Vec<String>,
    positions: HashMap<(String, i32), i64>,
    cursor: usize,
}

impl MemoryConsumer {
    /// Next unread message, rotating over partitions so a busy partition
    /// cannot starve the others.
    fn poll(&mut self) -> Option<ConsumedMessage> {
        let Self {
            log,
            group,
            topics,
            positions,
            cursor,
        } = self;

        let slots: Vec<(&String, i32)> = topics
            .iter()
            .flat_map(|t| (0..log.inner.partitions as i32).map(move |p| (t, p)))
            .collect();
        if slots.is_empty() {
            return None;
        }

        let state = log.lock();
        for step in 0..slots.len() {
            let index = (*cursor + step) % slots.len();
            let (topic, partition) = slots[index];

            let position = *positions
                .entry((topic.clone(), partition))
                .or_insert_with(|| {
                    state
                        .committed
                        .get(&(group.clone(), topic.clone(), partition))
                        .copied()
                        .unwrap_or(0)
                });

            let next = state
                .topics
                .get(topic)
                .and_then(|partitions| partitions.get(partition as usize))
                .and_then(|log| log.get(position as usize));

            if let Some(message) = next {
                positions.insert((topic.clone(), partition), position + 1);
                *cursor = (index + 1) % slots.len();
                return Some(message.clone());
            }
        }
        None
    }
}

#[async_trait]
impl LogConsumer for MemoryConsumer {
    async fn recv(&mut self) -> Result<ConsumedMessage, LogError> {
        let inner = Arc::clone(&self.log.inner);
        loop {
            let notified = inner.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(message) = self.poll() {
                return Ok(message);
            }
            if inner.closed.load(Ordering::SeqCst) {
                return Err(LogError::Closed);
            }
            notified.await;
        }
    }

    async fn commit(&mut self, message: &ConsumedMessage) -> Result<(), LogError> {
        let mut state = self.log.lock();
        let next = message.offset + 1;
        let committed = state
            .committed
            .entry((self.group.clone(), message.topic.clone(), message.partition))
            .or_insert(0);
        *committed = (*committed).max(next);
        Ok(())
    }
}
