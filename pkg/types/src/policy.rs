use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// --- Target ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelectorRequirement {
    pub key: String,
    /// `In`, `NotIn`, `Exists` or `DoesNotExist`. Kept as a string so an unknown
    /// operator survives decoding and simply never matches.
    pub operator: String,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

/// Exact-match field selector evaluated in memory against dotted paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldSelector {
    #[serde(default)]
    pub match_fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TargetResource {
    pub api_version: String,
    pub kind: String,
    /// Unset: the policy's own namespace. `*`: every namespace.
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub label_selector: Option<LabelSelector>,
    #[serde(default)]
    pub field_selector: Option<FieldSelector>,
}

// --- TTL ---

/// Expiry rule. Exactly one mode should be configured:
/// `secondsAfterCreation`, `fieldPath` (optionally with `mappings`/`default`),
/// or `relativeTo` + `secondsAfter`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TtlSpec {
    #[serde(default)]
    pub seconds_after_creation: Option<i64>,
    #[serde(default)]
    pub field_path: Option<String>,
    #[serde(default)]
    pub mappings: Option<BTreeMap<String, i64>>,
    #[serde(default)]
    pub default: Option<i64>,
    #[serde(default)]
    pub relative_to: Option<String>,
    #[serde(default)]
    pub seconds_after: Option<i64>,
}

impl TtlSpec {
    /// Names of the TTL modes that are switched on.
    pub fn configured_modes(&self) -> Vec<&'static str> {
        let mut modes = Vec::new();
        if self.relative_to.is_some() {
            modes.push("relativeTo");
        }
        if self.field_path.is_some() {
            modes.push("fieldPath");
        }
        if self.seconds_after_creation.is_some() {
            modes.push("secondsAfterCreation");
        }
        modes
    }
}

// --- Conditions ---

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum MetadataOperator {
    #[default]
    #[serde(rename = "equals", alias = "Equals")]
    Equals,
    #[serde(rename = "exists", alias = "Exists")]
    Exists,
}

/// Label or annotation presence/equality check.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetadataCondition {
    pub key: String,
    #[serde(default)]
    pub operator: MetadataOperator,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum FieldOperator {
    #[default]
    Equals,
    NotEquals,
    In,
    NotIn,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldCondition {
    pub field_path: String,
    #[serde(default)]
    pub operator: FieldOperator,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConditionsSpec {
    /// Allowed values of `status.phase`.
    #[serde(default)]
    pub phase: Vec<String>,
    #[serde(default)]
    pub has_labels: Vec<MetadataCondition>,
    #[serde(default)]
    pub has_annotations: Vec<MetadataCondition>,
    /// Field comparisons, all of which must hold.
    #[serde(default)]
    pub and: Vec<FieldCondition>,
}

// --- Behavior ---

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum PropagationPolicy {
    #[default]
    Background,
    Foreground,
    Orphan,
}

impl std::fmt::Display for PropagationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropagationPolicy::Background => write!(f, "Background"),
            PropagationPolicy::Foreground => write!(f, "Foreground"),
            PropagationPolicy::Orphan => write!(f, "Orphan"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorSpec {
    #[serde(default)]
    pub max_deletions_per_second: Option<u32>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub dry_run: bool,
    /// Finalizer owned by this policy; stripped from a resource before deleting it.
    #[serde(default)]
    pub finalizer: Option<String>,
    #[serde(default)]
    pub propagation_policy: PropagationPolicy,
    #[serde(default)]
    pub grace_period_seconds: Option<i64>,
    /// Duration string such as `30s`, `5m`, `1h30m`.
    #[serde(default)]
    pub evaluation_interval: Option<String>,
}

// --- Status ---

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum PolicyPhase {
    #[default]
    Pending,
    Active,
    Paused,
    Error,
}

impl std::fmt::Display for PolicyPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyPhase::Pending => write!(f, "Pending"),
            PolicyPhase::Active => write!(f, "Active"),
            PolicyPhase::Paused => write!(f, "Paused"),
            PolicyPhase::Error => write!(f, "Error"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyCondition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: ConditionStatus,
    pub last_transition_time: DateTime<Utc>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyStatus {
    #[serde(default)]
    pub phase: PolicyPhase,
    #[serde(default)]
    pub resources_matched: i64,
    #[serde(default)]
    pub resources_deleted: i64,
    #[serde(default)]
    pub resources_pending: i64,
    #[serde(default)]
    pub resources_failed: i64,
    #[serde(default, rename = "lastGCRun")]
    pub last_gc_run: Option<DateTime<Utc>>,
    #[serde(default, rename = "nextGCRun")]
    pub next_gc_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub conditions: Vec<PolicyCondition>,
}

impl PolicyStatus {
    pub fn condition(&self, condition_type: &str) -> Option<&PolicyCondition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }
}

// --- Policy ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicySpec {
    pub target_resource: TargetResource,
    #[serde(default)]
    pub ttl: TtlSpec,
    #[serde(default)]
    pub conditions: ConditionsSpec,
    #[serde(default)]
    pub behavior: BehaviorSpec,
}

/// A declarative retention rule: which objects to watch, when they expire,
/// extra gating conditions and how aggressively to delete them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GarbageCollectionPolicy {
    #[serde(alias = "uid")]
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub spec: PolicySpec,
    #[serde(default)]
    pub status: PolicyStatus,
    pub created_at: DateTime<Utc>,
}

impl GarbageCollectionPolicy {
    /// `namespace/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Paused is set externally on the status and suspends deletions only.
    pub fn is_paused(&self) -> bool {
        self.status.phase == PolicyPhase::Paused
    }
}

/// What a client submits to create or replace a policy. The server assigns the
/// id and creation time and owns the status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyManifest {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub spec: PolicySpec,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl PolicyManifest {
    /// Build the stored policy. `existing` keeps id, status and creation time
    /// when a policy is re-applied.
    pub fn into_policy(
        self,
        existing: Option<GarbageCollectionPolicy>,
        new_id: impl FnOnce() -> String,
        now: DateTime<Utc>,
    ) -> GarbageCollectionPolicy {
        match existing {
            Some(current) => GarbageCollectionPolicy {
                name: self.name,
                namespace: self.namespace,
                spec: self.spec,
                ..current
            },
            None => GarbageCollectionPolicy {
                id: new_id(),
                name: self.name,
                namespace: self.namespace,
                spec: self.spec,
                status: PolicyStatus::default(),
                created_at: now,
            },
        }
    }
}
