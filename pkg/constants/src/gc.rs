//! Garbage-collection engine defaults and well-known names.

/// Deletions per second allowed for a policy that does not configure its own rate.
pub const DEFAULT_MAX_DELETIONS_PER_SECOND: u32 = 10;

/// Number of resources processed per deletion chunk when a policy sets no batch size.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Evaluation interval applied to policies without `behavior.evaluationInterval`.
pub const DEFAULT_EVALUATION_INTERVAL_SECS: u64 = 300;

/// Size of the bounded evaluation worker pool.
pub const DEFAULT_MAX_CONCURRENT_EVALUATIONS: usize = 5;

/// How often the scheduler wakes up to look for due policies.
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 1;

/// How long a per-resource-type list snapshot may be reused. `0` disables the cache.
pub const DEFAULT_LISTER_CACHE_TTL_SECS: u64 = 0;

/// Cancellation is re-checked every this many items of a deletion run, in addition to every
/// chunk boundary. With batch sizes below this value the chunk boundaries are the tighter check.
pub const CANCELLATION_CHECK_INTERVAL: usize = 100;

/// Namespace value in `targetResource.namespace` that selects every namespace.
pub const ALL_NAMESPACES: &str = "*";

// ─── Evaluation reasons ───────────────────────────────────────────────────

pub const REASON_SELECTOR_MISMATCH: &str = "selector_mismatch";
pub const REASON_CONDITION_NOT_MET: &str = "condition_not_met";
pub const REASON_NOT_EXPIRED: &str = "not_expired";
pub const REASON_NO_TTL: &str = "no_ttl";
pub const REASON_EXPIRED: &str = "expired";
pub const REASON_TERMINATING: &str = "terminating";
pub const REASON_DELETED: &str = "deleted";
pub const REASON_DRY_RUN: &str = "dry_run";

// ─── Status conditions ────────────────────────────────────────────────────

pub const CONDITION_READY: &str = "Ready";
pub const CONDITION_ERROR: &str = "Error";

// ─── Events ───────────────────────────────────────────────────────────────

pub const EVENT_GC_COMPLETED: &str = "GarbageCollectionCompleted";
pub const EVENT_GC_FAILED: &str = "GarbageCollectionFailed";
pub const EVENT_DELETION_FAILED: &str = "DeletionFailed";

// ─── Annotations ──────────────────────────────────────────────────────────

/// Propagation mode recorded on objects that are left terminating.
pub const ANNOTATION_PROPAGATION_POLICY: &str = "ttlgc.io/propagation-policy";

/// Policy that requested the deletion of a terminating object.
pub const ANNOTATION_DELETED_BY: &str = "ttlgc.io/deleted-by";
