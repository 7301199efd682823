use async_trait::async_trait;
use pkg_constants::state::POLICY_PREFIX;
use pkg_state::client::StateStore;
use pkg_state::watch::EventType;
use pkg_types::policy::GarbageCollectionPolicy;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collaborators::{PolicyEvent, PolicySource};

const POLICY_EVENT_CAPACITY: usize = 256;

/// Reads policies from `/registry/gcpolicies/` and turns store watch events
/// on that prefix into `PolicyEvent`s once `start` is running.
#[derive(Clone)]
pub struct StorePolicySource {
    store: StateStore,
    tx: broadcast::Sender<PolicyEvent>,
}

impl StorePolicySource {
    pub fn new(store: StateStore) -> Self {
        let (tx, _) = broadcast::channel(POLICY_EVENT_CAPACITY);
        Self { store, tx }
    }

    /// Forward store watch events until `cancel` fires.
    pub fn start(&self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let mut watch = self.store.event_log.subscribe();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            info!("PolicyWatcher started (prefix={})", POLICY_PREFIX);
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = watch.recv() => event,
                };
                match event {
                    Ok(event) => {
                        let Some(name) = event.key.strip_prefix(POLICY_PREFIX) else {
                            continue;
                        };
                        let policy_event = match event.event_type {
                            EventType::Put => PolicyEvent::Applied(name.to_string()),
                            EventType::Delete => PolicyEvent::Deleted(name.to_string()),
                        };
                        debug!("Policy watch: {:?}", policy_event);
                        // no subscribers is fine
                        let _ = tx.send(policy_event);
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("PolicyWatcher lagged {} store events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            info!("PolicyWatcher stopped");
        })
    }
}

#[async_trait]
impl PolicySource for StorePolicySource {
    async fn list_policies(&self) -> anyhow::Result<Vec<GarbageCollectionPolicy>> {
        let entries = self.store.list_prefix(POLICY_PREFIX).await?;
        let mut policies = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            match serde_json::from_slice::<GarbageCollectionPolicy>(&value) {
                Ok(policy) => policies.push(policy),
                Err(e) => warn!("Skipping unreadable policy at {}: {}", key, e),
            }
        }
        Ok(policies)
    }

    fn subscribe(&self) -> broadcast::Receiver<PolicyEvent> {
        self.tx.subscribe()
    }
}
