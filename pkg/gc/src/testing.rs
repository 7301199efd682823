//! In-memory collaborators shared by the engine tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pkg_types::policy::{GarbageCollectionPolicy, PolicySpec, PolicyStatus, TargetResource, TtlSpec};
use pkg_types::resource::Resource;
use serde_json::json;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::collaborators::{
    DeleteOptions, Deleter, EventRecorder, LeadershipSource, NamespaceScope, PolicyEvent,
    PolicySource, ResourceLister, StatusUpdater,
};
use crate::gvr::GroupVersionResource;

pub fn make_resource(name: &str, namespace: &str, created: DateTime<Utc>, labels: &[(&str, &str)]) -> Resource {
    let labels: serde_json::Map<String, serde_json::Value> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect();
    Resource::from_value(json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "uid": format!("uid-{}", name),
            "creationTimestamp": created.to_rfc3339(),
            "labels": labels
        }
    }))
    .unwrap()
}

pub fn make_policy(name: &str, namespace: &str, seconds_after_creation: i64) -> GarbageCollectionPolicy {
    GarbageCollectionPolicy {
        id: format!("policy-{}", name),
        name: name.to_string(),
        namespace: namespace.to_string(),
        spec: PolicySpec {
            target_resource: TargetResource {
                api_version: "v1".to_string(),
                kind: "ConfigMap".to_string(),
                ..Default::default()
            },
            ttl: TtlSpec {
                seconds_after_creation: Some(seconds_after_creation),
                ..Default::default()
            },
            ..Default::default()
        },
        status: PolicyStatus::default(),
        created_at: Utc::now(),
    }
}

#[derive(Default)]
pub struct FakeLister {
    pub resources: Mutex<Vec<Resource>>,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeLister {
    pub fn new(resources: Vec<Resource>) -> Self {
        Self {
            resources: Mutex::new(resources),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ResourceLister for FakeLister {
    async fn list(&self, _gvr: &GroupVersionResource, scope: &NamespaceScope) -> anyhow::Result<Vec<Resource>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("list unavailable");
        }
        Ok(self
            .resources
            .lock()
            .unwrap()
            .iter()
            .filter(|r| scope.contains(r.namespace()))
            .cloned()
            .collect())
    }
}

/// Records deletions; names in `failing` error out. With `cancel_after`, the
/// token is cancelled once that many calls have been made.
#[derive(Default)]
pub struct FakeDeleter {
    pub failing: HashSet<String>,
    pub deleted: Mutex<Vec<String>>,
    pub calls: AtomicUsize,
    pub cancel_after: Option<(usize, CancellationToken)>,
}

#[async_trait]
impl Deleter for FakeDeleter {
    async fn delete(&self, resource: &Resource, _gvr: &GroupVersionResource, _options: &DeleteOptions) -> anyhow::Result<()> {
        let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, token)) = &self.cancel_after
            && calls >= *after
        {
            token.cancel();
        }
        if self.failing.contains(resource.name()) {
            anyhow::bail!("simulated failure for {}", resource.name());
        }
        self.deleted.lock().unwrap().push(resource.name().to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeStatusUpdater {
    pub updates: Mutex<Vec<(String, PolicyStatus)>>,
    pub fail: AtomicBool,
}

impl FakeStatusUpdater {
    pub fn last(&self) -> Option<PolicyStatus> {
        self.updates.lock().unwrap().last().map(|(_, s)| s.clone())
    }
}

#[async_trait]
impl StatusUpdater for FakeStatusUpdater {
    async fn update(&self, policy: &GarbageCollectionPolicy, status: &PolicyStatus) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("status write rejected");
        }
        self.updates
            .lock()
            .unwrap()
            .push((policy.full_name(), status.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeEvents {
    pub events: Mutex<Vec<(String, String, String)>>,
}

impl FakeEvents {
    pub fn reasons(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, reason, _)| reason.clone())
            .collect()
    }
}

#[async_trait]
impl EventRecorder for FakeEvents {
    async fn record(&self, subject: &str, reason: &str, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push((subject.to_string(), reason.to_string(), message.to_string()));
    }
}

pub struct FakeLeadership(watch::Sender<bool>);

impl FakeLeadership {
    pub fn new(leader: bool) -> Self {
        Self(watch::Sender::new(leader))
    }

    pub fn set(&self, leader: bool) {
        self.0.send_replace(leader);
    }
}

impl LeadershipSource for FakeLeadership {
    fn is_leader(&self) -> bool {
        *self.0.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.0.subscribe()
    }
}

pub struct FakePolicySource {
    pub policies: Mutex<Vec<GarbageCollectionPolicy>>,
    pub tx: broadcast::Sender<PolicyEvent>,
}

impl FakePolicySource {
    pub fn new(policies: Vec<GarbageCollectionPolicy>) -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            policies: Mutex::new(policies),
            tx,
        }
    }

    pub fn remove(&self, full_name: &str) {
        self.policies
            .lock()
            .unwrap()
            .retain(|p| p.full_name() != full_name);
        let _ = self.tx.send(PolicyEvent::Deleted(full_name.to_string()));
    }
}

#[async_trait]
impl PolicySource for FakePolicySource {
    async fn list_policies(&self) -> anyhow::Result<Vec<GarbageCollectionPolicy>> {
        Ok(self.policies.lock().unwrap().clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<PolicyEvent> {
        self.tx.subscribe()
    }
}
