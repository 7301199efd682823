use async_trait::async_trait;
use chrono::Utc;
use pkg_state::client::StateStore;
use pkg_types::event::Event;
use tracing::{info, warn};
use uuid::Uuid;

use crate::collaborators::EventRecorder;

use super::event_key;

/// Persists events under `/registry/events/{namespace}/{id}`.
#[derive(Clone)]
pub struct StoreEventRecorder {
    store: StateStore,
}

impl StoreEventRecorder {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventRecorder for StoreEventRecorder {
    async fn record(&self, subject: &str, reason: &str, message: &str) {
        info!("Event {} on {}: {}", reason, subject, message);
        let namespace = subject.split_once('/').map_or("default", |(ns, _)| ns);
        let event = Event {
            id: Uuid::new_v4().to_string(),
            namespace: namespace.to_string(),
            subject: subject.to_string(),
            reason: reason.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
        };

        let data = match serde_json::to_vec(&event) {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to encode event for {}: {}", subject, e);
                return;
            }
        };
        if let Err(e) = self
            .store
            .put(&event_key(&event.namespace, &event.id), &data)
            .await
        {
            warn!("Failed to store event for {}: {}", subject, e);
        }
    }
}
