use async_trait::async_trait;
use chrono::Utc;
use pkg_state::client::StateStore;
use pkg_types::resource::Resource;
use tracing::{info, warn};

use crate::collaborators::{NamespaceScope, ResourceLister};
use crate::gvr::GroupVersionResource;

use super::resource_type_prefix;

/// Lists resources stored under `/registry/resources/`.
///
/// Terminating objects whose grace period has run out and that carry no
/// finalizers are removed from the store while listing and left out of the
/// result. Objects still in grace or held by a finalizer are returned as is.
#[derive(Clone)]
pub struct StoreResourceLister {
    store: StateStore,
}

impl StoreResourceLister {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ResourceLister for StoreResourceLister {
    async fn list(
        &self,
        gvr: &GroupVersionResource,
        scope: &NamespaceScope,
    ) -> anyhow::Result<Vec<Resource>> {
        let mut prefix = resource_type_prefix(gvr);
        if let NamespaceScope::Namespace(ns) = scope {
            prefix.push_str(ns);
            prefix.push('/');
        }

        let entries = self.store.list_prefix(&prefix).await?;
        let now = Utc::now();
        let mut resources = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let parsed = serde_json::from_slice::<serde_json::Value>(&value)
                .map_err(anyhow::Error::from)
                .and_then(Resource::from_value);
            match parsed {
                Ok(resource) => {
                    let grace_over = resource.deletion_timestamp().is_some_and(|at| at <= now);
                    if grace_over && resource.finalizers().is_empty() {
                        self.store.delete(&key).await?;
                        info!("Removed {} after its grace period", key);
                        continue;
                    }
                    resources.push(resource);
                }
                Err(e) => warn!("Skipping unreadable resource at {}: {}", key, e),
            }
        }
        Ok(resources)
    }
}
