use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::StateStore;

use pkg_constants::state::{
    LEADER_LEASE_KEY, LEADER_LEASE_TTL_SECS, LEADER_RENEW_INTERVAL_DIVISOR,
};

/// A distributed lease for leader election.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lease {
    pub holder_id: String,
    pub acquired_at: DateTime<Utc>,
    pub renew_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl Lease {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let expiry = self.renew_at + chrono::Duration::seconds(self.ttl_seconds as i64);
        now > expiry
    }
}

/// Leader election over a lease record in the state store.
///
/// Only the replica holding the lease runs garbage-collection cycles;
/// the others keep serving the API and wait to take over.
pub struct LeaderElection {
    store: StateStore,
    server_id: String,
    ttl: Duration,
    renew_interval: Duration,
    leader_tx: watch::Sender<bool>,
    leader_rx: watch::Receiver<bool>,
}

impl LeaderElection {
    pub fn new(store: StateStore, server_id: String) -> Self {
        let ttl = Duration::from_secs(LEADER_LEASE_TTL_SECS);
        let renew_interval =
            Duration::from_secs(LEADER_LEASE_TTL_SECS / LEADER_RENEW_INTERVAL_DIVISOR);
        let (leader_tx, leader_rx) = watch::channel(false);

        Self {
            store,
            server_id,
            ttl,
            renew_interval,
            leader_tx,
            leader_rx,
        }
    }

    /// Get a receiver to observe leadership changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.leader_rx.clone()
    }

    /// Check if this instance is currently the leader.
    pub fn is_leader(&self) -> bool {
        *self.leader_rx.borrow()
    }

    fn new_lease(&self, now: DateTime<Utc>) -> Lease {
        Lease {
            holder_id: self.server_id.clone(),
            acquired_at: now,
            renew_at: now,
            ttl_seconds: self.ttl.as_secs(),
        }
    }

    /// Try to acquire or renew the lease. Returns true if we are the leader.
    pub async fn try_acquire_or_renew(&self) -> anyhow::Result<bool> {
        let now = Utc::now();

        let lease = match self.store.get(LEADER_LEASE_KEY).await? {
            Some(data) => {
                let current: Lease = serde_json::from_slice(&data)?;
                if current.holder_id == self.server_id {
                    Lease {
                        renew_at: now,
                        ..current
                    }
                } else if current.is_expired_at(now) {
                    info!(
                        "Lease expired (held by {}), acquiring for {}",
                        current.holder_id, self.server_id
                    );
                    self.new_lease(now)
                } else {
                    return Ok(false);
                }
            }
            None => {
                info!("No existing lease found, acquiring for {}", self.server_id);
                self.new_lease(now)
            }
        };

        let data = serde_json::to_vec(&lease)?;
        self.store.put(LEADER_LEASE_KEY, &data).await?;
        Ok(true)
    }

    /// Drop the lease if we hold it so another replica can take over immediately.
    pub async fn release(&self) -> anyhow::Result<()> {
        if let Some(data) = self.store.get(LEADER_LEASE_KEY).await? {
            let lease: Lease = serde_json::from_slice(&data)?;
            if lease.holder_id == self.server_id {
                self.store.delete(LEADER_LEASE_KEY).await?;
                info!("Released leader lease held by {}", self.server_id);
            }
        }
        let _ = self.leader_tx.send(false);
        Ok(())
    }

    /// Start the leader election loop as a background task. The loop stops and
    /// releases the lease when `cancel` fires.
    pub fn start(
        self,
        cancel: CancellationToken,
    ) -> (tokio::task::JoinHandle<()>, watch::Receiver<bool>) {
        let rx = self.leader_rx.clone();
        let handle = tokio::spawn(async move {
            info!(
                "LeaderElection started (server_id={}, ttl={}s, renew={}s)",
                self.server_id,
                self.ttl.as_secs(),
                self.renew_interval.as_secs()
            );

            let mut interval = tokio::time::interval(self.renew_interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let was_leader = *self.leader_rx.borrow();
                match self.try_acquire_or_renew().await {
                    Ok(is_leader) => {
                        if is_leader && !was_leader {
                            info!("This server is now the LEADER ({})", self.server_id);
                        } else if !is_leader && was_leader {
                            warn!(
                                "Leadership LOST for {}: another server took over",
                                self.server_id
                            );
                        }
                        let _ = self.leader_tx.send(is_leader);
                    }
                    Err(e) => {
                        warn!("Leader election error: {}", e);
                        let _ = self.leader_tx.send(false);
                    }
                }
            }

            if let Err(e) = self.release().await {
                warn!("Failed to release leader lease: {}", e);
            }
        });

        (handle, rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_expiry() {
        let now = Utc::now();
        let lease = Lease {
            holder_id: "a".to_string(),
            acquired_at: now,
            renew_at: now,
            ttl_seconds: 15,
        };
        assert!(!lease.is_expired_at(now + chrono::Duration::seconds(15)));
        assert!(lease.is_expired_at(now + chrono::Duration::seconds(16)));
    }

    #[tokio::test]
    async fn only_one_replica_holds_the_lease() {
        let store = StateStore::in_memory().await.unwrap();
        let a = LeaderElection::new(store.clone(), "replica-a".to_string());
        let b = LeaderElection::new(store.clone(), "replica-b".to_string());

        assert!(a.try_acquire_or_renew().await.unwrap());
        assert!(!b.try_acquire_or_renew().await.unwrap());
        // renewal by the holder keeps it
        assert!(a.try_acquire_or_renew().await.unwrap());

        a.release().await.unwrap();
        assert!(b.try_acquire_or_renew().await.unwrap());
        assert!(!a.try_acquire_or_renew().await.unwrap());
    }
}
