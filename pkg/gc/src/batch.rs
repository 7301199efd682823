use std::collections::BTreeMap;

use pkg_constants::gc::{CANCELLATION_CHECK_INTERVAL, REASON_DELETED, REASON_DRY_RUN};
use pkg_types::policy::GarbageCollectionPolicy;
use pkg_types::resource::Resource;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collaborators::{DeleteOptions, Deleter};
use crate::error::GcError;
use crate::gvr::GroupVersionResource;
use crate::ratelimit::PolicyRateLimiter;

/// Counts from one batch run. `deleted` excludes dry-run deletions.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub attempted: usize,
    pub deleted: usize,
    pub dry_run: usize,
    pub errors: Vec<GcError>,
    pub cancelled: bool,
}

/// Delete `resources` in chunks, one at a time, each gated by a limiter token.
///
/// A failed deletion is recorded in `errors` and in `reasons` under the
/// resource id, and the run moves on. Cancellation is honoured at chunk
/// boundaries, every `CANCELLATION_CHECK_INTERVAL` items and while waiting for
/// a token; the partial outcome is returned as is.
#[allow(clippy::too_many_arguments)]
pub async fn delete_batch(
    cancel: &CancellationToken,
    deleter: &dyn Deleter,
    gvr: &GroupVersionResource,
    resources: &[Resource],
    policy: &GarbageCollectionPolicy,
    limiter: &PolicyRateLimiter,
    default_batch_size: usize,
    reasons: &mut BTreeMap<String, String>,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    if resources.is_empty() {
        return outcome;
    }

    let options = DeleteOptions::for_policy(policy);
    let batch_size = policy
        .spec
        .behavior
        .batch_size
        .unwrap_or(default_batch_size)
        .max(1);
    let policy_name = policy.full_name();
    let mut processed = 0usize;

    for (chunk_index, chunk) in resources.chunks(batch_size).enumerate() {
        if cancel.is_cancelled() {
            outcome.cancelled = true;
            break;
        }
        debug!(
            "Policy {}: deletion chunk {} ({} resources)",
            policy_name,
            chunk_index,
            chunk.len()
        );

        for resource in chunk {
            // counted across the whole run, not per chunk
            if processed > 0 && processed % CANCELLATION_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }
            processed += 1;
            if !limiter.acquire(cancel).await {
                outcome.cancelled = true;
                break;
            }

            outcome.attempted += 1;
            let id = resource.id();

            if options.dry_run {
                info!(
                    "[dry-run] Policy {} would delete {} {}",
                    policy_name,
                    gvr,
                    resource.qualified_name()
                );
                outcome.dry_run += 1;
                reasons.insert(id, REASON_DRY_RUN.to_string());
                continue;
            }

            match deleter.delete(resource, gvr, &options).await {
                Ok(()) => {
                    debug!("Policy {} deleted {} {}", policy_name, gvr, resource.qualified_name());
                    outcome.deleted += 1;
                    reasons.insert(id, REASON_DELETED.to_string());
                }
                Err(e) => {
                    warn!(
                        "Policy {} failed to delete {} {}: {}",
                        policy_name,
                        gvr,
                        resource.qualified_name(),
                        e
                    );
                    let err = GcError::DeletionFailed {
                        resource: resource.qualified_name(),
                        source: e,
                    };
                    reasons.insert(id, err.to_string());
                    outcome.errors.push(err);
                }
            }
        }

        if outcome.cancelled {
            break;
        }
    }

    if outcome.cancelled {
        info!(
            "Policy {}: deletion cancelled after {} of {} resources",
            policy_name,
            outcome.attempted,
            resources.len()
        );
    }
    outcome
}
