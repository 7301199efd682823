use std::time::Duration;

use chrono::{DateTime, Utc};
use pkg_constants::gc::{CONDITION_ERROR, CONDITION_READY};
use pkg_types::policy::{
    ConditionStatus, GarbageCollectionPolicy, PolicyCondition, PolicyPhase, PolicyStatus,
};

use crate::error::GcError;
use crate::evaluator::EvaluationResult;

const REASON_EVALUATION_SUCCEEDED: &str = "EvaluationSucceeded";
const REASON_EVALUATION_FAILED: &str = "EvaluationFailed";

/// Build the status to persist after a cycle.
///
/// `error` is the policy-level failure, if any; `result` the cycle's counts.
/// Counters of a failed cycle are carried over from the previous status.
/// A `Paused` phase set by the operator survives successful cycles.
pub fn reconcile(
    policy: &GarbageCollectionPolicy,
    result: Option<&EvaluationResult>,
    error: Option<&GcError>,
    now: DateTime<Utc>,
    interval: Duration,
) -> PolicyStatus {
    let previous = &policy.status;
    let mut status = previous.clone();

    status.phase = match (error, previous.phase) {
        (Some(_), _) => PolicyPhase::Error,
        (None, PolicyPhase::Paused) => PolicyPhase::Paused,
        (None, _) => PolicyPhase::Active,
    };

    if let Some(result) = result {
        status.resources_matched = result.matched as i64;
        status.resources_deleted = result.deleted as i64;
        status.resources_pending = result.pending as i64;
        status.resources_failed = result.failed as i64;
    }

    status.last_gc_run = Some(now);
    status.next_gc_run = chrono::Duration::from_std(interval)
        .ok()
        .and_then(|d| now.checked_add_signed(d));

    let (ready, failure) = match error {
        Some(err) => (
            condition(CONDITION_READY, ConditionStatus::False, REASON_EVALUATION_FAILED, err.to_string()),
            condition(CONDITION_ERROR, ConditionStatus::True, REASON_EVALUATION_FAILED, err.to_string()),
        ),
        None => {
            let summary = result.map(summarize).unwrap_or_default();
            (
                condition(CONDITION_READY, ConditionStatus::True, REASON_EVALUATION_SUCCEEDED, summary),
                condition(CONDITION_ERROR, ConditionStatus::False, REASON_EVALUATION_SUCCEEDED, String::new()),
            )
        }
    };
    set_condition(&mut status.conditions, ready, now);
    set_condition(&mut status.conditions, failure, now);

    status
}

/// Human summary of a cycle's counts.
pub fn summarize(result: &EvaluationResult) -> String {
    let mut summary = format!(
        "matched {}, deleted {}, pending {}, failed {}",
        result.matched, result.deleted, result.pending, result.failed
    );
    if result.dry_run > 0 {
        summary.push_str(&format!(", dry-run {}", result.dry_run));
    }
    if result.cancelled {
        summary.push_str(" (cancelled)");
    }
    summary
}

/// A condition with a placeholder transition time; `set_condition` fixes it up.
fn condition(condition_type: &str, status: ConditionStatus, reason: &str, message: String) -> PolicyCondition {
    PolicyCondition {
        condition_type: condition_type.to_string(),
        status,
        last_transition_time: DateTime::<Utc>::default(),
        reason: reason.to_string(),
        message,
    }
}

/// Insert or update a condition. `lastTransitionTime` moves to `now` only when
/// the condition is new or its status flips.
pub fn set_condition(conditions: &mut Vec<PolicyCondition>, mut incoming: PolicyCondition, now: DateTime<Utc>) {
    match conditions
        .iter_mut()
        .find(|c| c.condition_type == incoming.condition_type)
    {
        Some(existing) => {
            incoming.last_transition_time = if existing.status == incoming.status {
                existing.last_transition_time
            } else {
                now
            };
            *existing = incoming;
        }
        None => {
            incoming.last_transition_time = now;
            conditions.push(incoming);
        }
    }
}
