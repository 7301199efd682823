//! Capabilities the engine consumes. The engine only talks to these traits;
//! `crate::store` provides implementations backed by the state store.

use async_trait::async_trait;
use pkg_types::policy::{GarbageCollectionPolicy, PolicyStatus, PropagationPolicy};
use pkg_types::resource::Resource;
use tokio::sync::{broadcast, watch};

use crate::gvr::GroupVersionResource;

/// Which namespaces a listing covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NamespaceScope {
    All,
    Namespace(String),
}

impl NamespaceScope {
    pub fn contains(&self, namespace: Option<&str>) -> bool {
        match self {
            NamespaceScope::All => true,
            NamespaceScope::Namespace(ns) => namespace == Some(ns.as_str()),
        }
    }
}

impl std::fmt::Display for NamespaceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NamespaceScope::All => write!(f, "*"),
            NamespaceScope::Namespace(ns) => write!(f, "{}", ns),
        }
    }
}

/// Per-call deletion settings derived from a policy's behavior.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteOptions {
    pub dry_run: bool,
    pub grace_period_seconds: Option<i64>,
    pub propagation_policy: PropagationPolicy,
    /// Finalizer owned by the requesting policy, removed before deleting.
    pub finalizer: Option<String>,
    /// `namespace/name` of the requesting policy.
    pub requested_by: String,
}

impl DeleteOptions {
    pub fn for_policy(policy: &GarbageCollectionPolicy) -> Self {
        let behavior = &policy.spec.behavior;
        Self {
            dry_run: behavior.dry_run,
            grace_period_seconds: behavior.grace_period_seconds,
            propagation_policy: behavior.propagation_policy,
            finalizer: behavior.finalizer.clone(),
            requested_by: policy.full_name(),
        }
    }
}

/// Best-effort snapshot of current resources of one type.
#[async_trait]
pub trait ResourceLister: Send + Sync {
    async fn list(
        &self,
        gvr: &GroupVersionResource,
        scope: &NamespaceScope,
    ) -> anyhow::Result<Vec<Resource>>;
}

/// Deletes one resource. Deleting something that is already gone must succeed.
#[async_trait]
pub trait Deleter: Send + Sync {
    async fn delete(
        &self,
        resource: &Resource,
        gvr: &GroupVersionResource,
        options: &DeleteOptions,
    ) -> anyhow::Result<()>;
}

#[async_trait]
pub trait StatusUpdater: Send + Sync {
    async fn update(
        &self,
        policy: &GarbageCollectionPolicy,
        status: &PolicyStatus,
    ) -> anyhow::Result<()>;
}

/// Sink for human-readable events. `subject` is `namespace/name`.
#[async_trait]
pub trait EventRecorder: Send + Sync {
    async fn record(&self, subject: &str, reason: &str, message: &str);
}

pub trait LeadershipSource: Send + Sync {
    fn is_leader(&self) -> bool;

    /// Receiver that sees every later change of leadership.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Change notification for a policy, keyed by `namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyEvent {
    Applied(String),
    Deleted(String),
}

#[async_trait]
pub trait PolicySource: Send + Sync {
    async fn list_policies(&self) -> anyhow::Result<Vec<GarbageCollectionPolicy>>;

    fn subscribe(&self) -> broadcast::Receiver<PolicyEvent>;
}

/// Maps a group/version/kind to its plural resource name, if known.
#[async_trait]
pub trait Discovery: Send + Sync {
    async fn resource_for(
        &self,
        group: &str,
        version: &str,
        kind: &str,
    ) -> anyhow::Result<Option<String>>;
}
