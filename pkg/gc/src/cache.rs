use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pkg_types::resource::Resource;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::collaborators::{NamespaceScope, ResourceLister};
use crate::gvr::GroupVersionResource;

struct Snapshot {
    taken_at: Instant,
    resources: Vec<Resource>,
}

/// Snapshots of one resource type, keyed by namespace scope. The mutex is
/// held across the underlying list so concurrent misses collapse into one call.
#[derive(Default)]
struct GvrEntry {
    snapshots: Mutex<HashMap<NamespaceScope, Snapshot>>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<GroupVersionResource, Arc<GvrEntry>>,
    /// Policy UIDs referencing each resource type.
    refs: HashMap<GroupVersionResource, HashSet<String>>,
    /// Resource type each policy UID currently references.
    tracked: HashMap<String, GroupVersionResource>,
}

/// Per-resource-type list cache shared by all policies targeting the same
/// type. Entries are created lazily and torn down once no tracked policy
/// references them. A zero TTL disables snapshot reuse.
pub struct ListerCache {
    inner: Arc<dyn ResourceLister>,
    ttl: Duration,
    state: RwLock<CacheState>,
}

impl ListerCache {
    pub fn new(inner: Arc<dyn ResourceLister>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            state: RwLock::new(CacheState::default()),
        }
    }

    /// Record that `policy_uid` targets `gvr`, moving its reference if it
    /// previously targeted another type.
    pub async fn track(&self, policy_uid: &str, gvr: &GroupVersionResource) {
        let mut state = self.state.write().await;
        if state.tracked.get(policy_uid) == Some(gvr) {
            return;
        }
        if let Some(previous) = state.tracked.remove(policy_uid) {
            Self::release(&mut state, policy_uid, &previous);
        }
        state.tracked.insert(policy_uid.to_string(), gvr.clone());
        state
            .refs
            .entry(gvr.clone())
            .or_default()
            .insert(policy_uid.to_string());
    }

    /// Drop the reference held by `policy_uid`. Returns true if it held one.
    pub async fn forget(&self, policy_uid: &str) -> bool {
        let mut state = self.state.write().await;
        match state.tracked.remove(policy_uid) {
            Some(gvr) => {
                Self::release(&mut state, policy_uid, &gvr);
                true
            }
            None => false,
        }
    }

    fn release(state: &mut CacheState, policy_uid: &str, gvr: &GroupVersionResource) {
        let empty = match state.refs.get_mut(gvr) {
            Some(holders) => {
                holders.remove(policy_uid);
                holders.is_empty()
            }
            None => true,
        };
        if empty {
            state.refs.remove(gvr);
            if state.entries.remove(gvr).is_some() {
                debug!("Lister cache entry for {} torn down", gvr);
            }
        }
    }

    /// Number of live per-type entries.
    pub async fn entry_count(&self) -> usize {
        self.state.read().await.entries.len()
    }

    /// Drop every snapshot of `gvr` so the next list reads through. Called
    /// after deletions, which make earlier snapshots stale.
    pub async fn invalidate(&self, gvr: &GroupVersionResource) {
        let entry = self.state.read().await.entries.get(gvr).cloned();
        if let Some(entry) = entry {
            entry.snapshots.lock().await.clear();
            debug!("Lister cache snapshots for {} invalidated", gvr);
        }
    }

    async fn entry(&self, gvr: &GroupVersionResource) -> Arc<GvrEntry> {
        {
            let state = self.state.read().await;
            if let Some(entry) = state.entries.get(gvr) {
                return Arc::clone(entry);
            }
        }
        let mut state = self.state.write().await;
        Arc::clone(state.entries.entry(gvr.clone()).or_insert_with(|| {
            debug!("Lister cache entry for {} created", gvr);
            Arc::new(GvrEntry::default())
        }))
    }
}

#[async_trait]
impl ResourceLister for ListerCache {
    async fn list(
        &self,
        gvr: &GroupVersionResource,
        scope: &NamespaceScope,
    ) -> anyhow::Result<Vec<Resource>> {
        if self.ttl.is_zero() {
            return self.inner.list(gvr, scope).await;
        }

        let entry = self.entry(gvr).await;
        let mut snapshots = entry.snapshots.lock().await;
        if let Some(snapshot) = snapshots.get(scope)
            && snapshot.taken_at.elapsed() < self.ttl
        {
            return Ok(snapshot.resources.clone());
        }

        let resources = self.inner.list(gvr, scope).await?;
        snapshots.insert(
            scope.clone(),
            Snapshot {
                taken_at: Instant::now(),
                resources: resources.clone(),
            },
        );
        Ok(resources)
    }
}
