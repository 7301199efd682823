use async_trait::async_trait;
use pkg_state::client::StateStore;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::collaborators::Discovery;

use super::api_resource_key;

/// Kinds whose plural the pluralization heuristic gets wrong or that are
/// common enough to deserve an explicit entry.
const BUILTIN_RESOURCES: &[(&str, &str, &str, &str)] = &[
    ("", "v1", "Endpoints", "endpoints"),
    ("", "v1", "ComponentStatus", "componentstatuses"),
    ("networking.k8s.io", "v1", "Ingress", "ingresses"),
    ("networking.k8s.io", "v1", "IngressClass", "ingressclasses"),
    ("networking.k8s.io", "v1", "NetworkPolicy", "networkpolicies"),
    ("policy", "v1", "PodDisruptionBudget", "poddisruptionbudgets"),
    ("storage.k8s.io", "v1", "StorageClass", "storageclasses"),
    ("autoscaling", "v2", "HorizontalPodAutoscaler", "horizontalpodautoscalers"),
];

/// One discovery record at `/registry/apiresources/{group}/{version}/{kind}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiResource {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
    /// Plural resource name.
    pub resource: String,
    #[serde(default = "default_namespaced")]
    pub namespaced: bool,
}

fn default_namespaced() -> bool {
    true
}

/// Discovery backed by API resource records in the state store.
#[derive(Clone)]
pub struct StoreDiscovery {
    store: StateStore,
}

impl StoreDiscovery {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub async fn register(&self, entry: &ApiResource) -> anyhow::Result<()> {
        let key = api_resource_key(&entry.group, &entry.version, &entry.kind);
        self.store.put(&key, &serde_json::to_vec(entry)?).await
    }

    /// Write the built-in records that are not present yet.
    pub async fn seed_builtins(&self) -> anyhow::Result<usize> {
        let mut seeded = 0;
        for (group, version, kind, resource) in BUILTIN_RESOURCES {
            let key = api_resource_key(group, version, kind);
            if self.store.get(&key).await?.is_some() {
                continue;
            }
            self.register(&ApiResource {
                group: group.to_string(),
                version: version.to_string(),
                kind: kind.to_string(),
                resource: resource.to_string(),
                namespaced: *kind != "ComponentStatus" && *kind != "StorageClass" && *kind != "IngressClass",
            })
            .await?;
            seeded += 1;
        }
        if seeded > 0 {
            info!("Seeded {} built-in API resource records", seeded);
        }
        Ok(seeded)
    }
}

#[async_trait]
impl Discovery for StoreDiscovery {
    async fn resource_for(
        &self,
        group: &str,
        version: &str,
        kind: &str,
    ) -> anyhow::Result<Option<String>> {
        let key = api_resource_key(group, version, kind);
        match self.store.get(&key).await? {
            Some(raw) => {
                let entry: ApiResource = serde_json::from_slice(&raw)?;
                Ok(Some(entry.resource))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gvr::{GroupVersionResource, GvrResolver};
    use std::sync::Arc;

    #[tokio::test]
    async fn seeded_records_resolve_irregular_plurals() {
        let store = StateStore::in_memory().await.unwrap();
        let discovery = StoreDiscovery::new(store);
        assert_eq!(discovery.seed_builtins().await.unwrap(), BUILTIN_RESOURCES.len());
        assert_eq!(discovery.seed_builtins().await.unwrap(), 0);

        assert_eq!(
            discovery.resource_for("", "v1", "Endpoints").await.unwrap(),
            Some("endpoints".to_string())
        );
        assert_eq!(discovery.resource_for("", "v1", "Pod").await.unwrap(), None);

        let resolver = GvrResolver::new(Some(Arc::new(discovery)));
        assert_eq!(
            resolver.resolve("v1", "Endpoints").await.unwrap(),
            GroupVersionResource::new("", "v1", "endpoints")
        );
        assert_eq!(resolver.resolve("v1", "Pod").await.unwrap().resource, "pods");
    }

    #[tokio::test]
    async fn registered_crd_wins() {
        let store = StateStore::in_memory().await.unwrap();
        let discovery = StoreDiscovery::new(store);
        discovery
            .register(&ApiResource {
                group: "example.io".to_string(),
                version: "v1".to_string(),
                kind: "Octopus".to_string(),
                resource: "octopi".to_string(),
                namespaced: true,
            })
            .await
            .unwrap();
        assert_eq!(
            discovery.resource_for("example.io", "v1", "Octopus").await.unwrap(),
            Some("octopi".to_string())
        );
    }
}
