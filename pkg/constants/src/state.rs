//! State store / leader election constants.

/// etcd-style key for the controller leader lease.
pub const LEADER_LEASE_KEY: &str = "/registry/leases/ttlgc-leader";

/// How long a leader lease is valid, in seconds.
pub const LEADER_LEASE_TTL_SECS: u64 = 15;

/// The lease is renewed every `TTL / LEADER_RENEW_INTERVAL_DIVISOR` seconds.
pub const LEADER_RENEW_INTERVAL_DIVISOR: u64 = 3;

/// Capacity of the in-memory watch event ring buffer.
pub const WATCH_EVENT_LOG_CAPACITY: usize = 4096;

// ─── Registry prefixes ────────────────────────────────────────────────────

/// Garbage-collection policies: `/registry/gcpolicies/{namespace}/{name}`.
pub const POLICY_PREFIX: &str = "/registry/gcpolicies/";

/// Generic resources: `/registry/resources/{group}/{version}/{resource}/{namespace}/{name}`.
pub const RESOURCE_PREFIX: &str = "/registry/resources/";

/// API resource discovery: `/registry/apiresources/{group}/{version}/{kind}`.
pub const API_RESOURCE_PREFIX: &str = "/registry/apiresources/";

/// Recorded events: `/registry/events/{namespace}/{id}`.
pub const EVENT_PREFIX: &str = "/registry/events/";

/// Path segment used in keys for the core (empty) API group.
pub const CORE_GROUP_SEGMENT: &str = "core";

/// Namespace segment used in keys for cluster-scoped resources.
pub const CLUSTER_SCOPE_SEGMENT: &str = "_cluster";
