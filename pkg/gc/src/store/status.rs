use async_trait::async_trait;
use pkg_state::client::StateStore;
use pkg_types::policy::{GarbageCollectionPolicy, PolicyStatus};
use tracing::debug;

use crate::collaborators::StatusUpdater;

use super::policy_key;

/// Writes policy status back into the stored policy record. Writing a status
/// equal to the stored one is skipped, as is a policy deleted meanwhile.
#[derive(Clone)]
pub struct StoreStatusUpdater {
    store: StateStore,
}

impl StoreStatusUpdater {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StatusUpdater for StoreStatusUpdater {
    async fn update(
        &self,
        policy: &GarbageCollectionPolicy,
        status: &PolicyStatus,
    ) -> anyhow::Result<()> {
        let key = policy_key(&policy.namespace, &policy.name);
        let Some(raw) = self.store.get(&key).await? else {
            debug!("Policy {} vanished before its status was written", policy.full_name());
            return Ok(());
        };
        let mut stored: GarbageCollectionPolicy = serde_json::from_slice(&raw)?;
        if stored.id != policy.id {
            debug!("Policy {} was recreated, dropping stale status", policy.full_name());
            return Ok(());
        }
        if stored.status == *status {
            return Ok(());
        }

        // Paused is owned by the operator; a concurrent pause wins over our phase.
        let paused = stored.is_paused();
        stored.status = status.clone();
        if paused {
            stored.status.phase = pkg_types::policy::PolicyPhase::Paused;
        }
        self.store.put(&key, &serde_json::to_vec(&stored)?).await
    }
}
