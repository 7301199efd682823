use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::sync::broadcast;

/// Type of event in the watch stream.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventType {
    Put,
    Delete,
}

/// A single watch event representing a state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchEvent {
    pub seq: u64,
    pub event_type: EventType,
    pub key: String,
    #[serde(default)]
    pub value: Option<Vec<u8>>,
}

/// In-memory event log that tracks all state mutations with monotonic sequence numbers.
/// Subscribers receive every event and filter by key prefix themselves.
#[derive(Clone)]
pub struct EventLog {
    inner: Arc<RwLock<EventLogInner>>,
    sender: broadcast::Sender<WatchEvent>,
}

struct EventLogInner {
    seq: u64,
    events: VecDeque<WatchEvent>,
    max_events: usize,
}

impl EventLog {
    /// Create a new event log retaining at most `max_events` recent events.
    pub fn new(max_events: usize) -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(RwLock::new(EventLogInner {
                seq: 0,
                events: VecDeque::with_capacity(max_events),
                max_events,
            })),
            sender,
        }
    }

    /// Record a new event. Called by `StateStore` on put/delete.
    pub async fn emit(&self, event_type: EventType, key: String, value: Option<Vec<u8>>) {
        let mut inner = self.inner.write().await;
        inner.seq += 1;
        let event = WatchEvent {
            seq: inner.seq,
            event_type,
            key,
            value,
        };
        if inner.events.len() >= inner.max_events {
            inner.events.pop_front();
        }
        inner.events.push_back(event.clone());
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    /// Get the current sequence number.
    pub async fn current_seq(&self) -> u64 {
        self.inner.read().await.seq
    }

    /// Retained events after `from_seq` whose key starts with `prefix`.
    pub async fn events_since(&self, from_seq: u64, prefix: &str) -> Vec<WatchEvent> {
        let inner = self.inner.read().await;
        inner
            .events
            .iter()
            .filter(|e| e.seq > from_seq && e.key.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Subscribe to receive new events as they are emitted.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.sender.subscribe()
    }
}
