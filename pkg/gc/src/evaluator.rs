use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pkg_constants::gc::{
    ALL_NAMESPACES, DEFAULT_BATCH_SIZE, DEFAULT_EVALUATION_INTERVAL_SECS,
    DEFAULT_LISTER_CACHE_TTL_SECS, DEFAULT_MAX_DELETIONS_PER_SECOND, EVENT_DELETION_FAILED,
    EVENT_GC_COMPLETED, EVENT_GC_FAILED, REASON_CONDITION_NOT_MET, REASON_EXPIRED, REASON_NO_TTL,
    REASON_NOT_EXPIRED, REASON_SELECTOR_MISMATCH, REASON_TERMINATING,
};
use pkg_metrics::{
    DELETION_ERRORS_TOTAL, DRY_RUN_DELETIONS_TOTAL, EVALUATION_ERRORS_TOTAL, EVALUATIONS_TOTAL,
    MetricsRegistry, RESOURCES_DELETED_TOTAL, RESOURCES_MATCHED_TOTAL,
};
use pkg_types::policy::GarbageCollectionPolicy;
use pkg_types::resource::Resource;
use pkg_types::validate::{parse_duration, validate_policy};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::batch::delete_batch;
use crate::cache::ListerCache;
use crate::collaborators::{
    Deleter, Discovery, EventRecorder, NamespaceScope, ResourceLister, StatusUpdater,
};
use crate::conditions::meets_conditions;
use crate::error::{GcError, TtlError};
use crate::gvr::GvrResolver;
use crate::ratelimit::RateLimiterRegistry;
use crate::selector::matches_selectors;
use crate::status::{reconcile, summarize};
use crate::ttl::is_expired;

/// Process-wide defaults for policies that leave a setting unset.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub default_max_deletions_per_second: u32,
    pub default_batch_size: usize,
    pub default_evaluation_interval: Duration,
    pub lister_cache_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_max_deletions_per_second: DEFAULT_MAX_DELETIONS_PER_SECOND,
            default_batch_size: DEFAULT_BATCH_SIZE,
            default_evaluation_interval: Duration::from_secs(DEFAULT_EVALUATION_INTERVAL_SECS),
            lister_cache_ttl: Duration::from_secs(DEFAULT_LISTER_CACHE_TTL_SECS),
        }
    }
}

impl EngineConfig {
    /// The policy's own `evaluationInterval`, or the default when unset,
    /// unparsable or zero.
    pub fn interval_for(&self, policy: &GarbageCollectionPolicy) -> Duration {
        match policy.spec.behavior.evaluation_interval.as_deref() {
            Some(raw) => match parse_duration(raw) {
                Ok(d) if !d.is_zero() => d,
                _ => self.default_evaluation_interval,
            },
            None => self.default_evaluation_interval,
        }
    }
}

/// Collaborators the evaluator drives.
pub struct EngineDeps {
    pub lister: Arc<dyn ResourceLister>,
    pub deleter: Arc<dyn Deleter>,
    pub status_updater: Arc<dyn StatusUpdater>,
    pub events: Arc<dyn EventRecorder>,
    pub discovery: Option<Arc<dyn Discovery>>,
    pub metrics: Arc<MetricsRegistry>,
}

/// Outcome of one cycle for one policy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationResult {
    /// Resources that passed the selectors.
    pub matched: usize,
    /// Successful, non-dry-run deletions.
    pub deleted: usize,
    /// `matched - deleted`
    pub pending: usize,
    pub failed: usize,
    pub dry_run: usize,
    pub cancelled: bool,
    /// Resource id → reason it was skipped, deleted or failed.
    pub reasons: BTreeMap<String, String>,
}

/// Runs list → filter → delete → summarize for one policy at a time.
pub struct PolicyEvaluator {
    config: EngineConfig,
    resolver: GvrResolver,
    lister: Arc<ListerCache>,
    deleter: Arc<dyn Deleter>,
    status_updater: Arc<dyn StatusUpdater>,
    events: Arc<dyn EventRecorder>,
    limiters: RateLimiterRegistry,
    metrics: Arc<MetricsRegistry>,
}

impl PolicyEvaluator {
    pub fn new(config: EngineConfig, deps: EngineDeps) -> Self {
        let lister = Arc::new(ListerCache::new(deps.lister, config.lister_cache_ttl));
        let limiters = RateLimiterRegistry::new(config.default_max_deletions_per_second);
        Self {
            resolver: GvrResolver::new(deps.discovery),
            lister,
            deleter: deps.deleter,
            status_updater: deps.status_updater,
            events: deps.events,
            limiters,
            metrics: deps.metrics,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn limiters(&self) -> &RateLimiterRegistry {
        &self.limiters
    }

    pub fn lister_cache(&self) -> &ListerCache {
        &self.lister
    }

    /// Run one full cycle for `policy` now and persist its status.
    pub async fn evaluate_policy(
        &self,
        cancel: &CancellationToken,
        policy: &GarbageCollectionPolicy,
    ) -> Result<(), GcError> {
        self.run_cycle(cancel, policy, Utc::now()).await.map(|_| ())
    }

    /// Evaluate at `now`, reconcile and write status, emit events and metrics.
    pub async fn run_cycle(
        &self,
        cancel: &CancellationToken,
        policy: &GarbageCollectionPolicy,
        now: DateTime<Utc>,
    ) -> Result<EvaluationResult, GcError> {
        let policy_name = policy.full_name();
        let labels = [("policy", policy_name.as_str())];
        self.metrics.counter_add(EVALUATIONS_TOTAL, &labels, 1);

        let outcome = self.evaluate_at(cancel, policy, now).await;
        let interval = self.config.interval_for(policy);

        let status = match &outcome {
            Ok(result) => {
                self.record_result_metrics(&policy_name, result);
                info!(
                    "Policy {} evaluated: {}",
                    policy_name,
                    summarize(result)
                );
                self.events
                    .record(&policy_name, EVENT_GC_COMPLETED, &summarize(result))
                    .await;
                if result.failed > 0 {
                    let message = format!("{} deletion(s) failed", result.failed);
                    self.events
                        .record(&policy_name, EVENT_DELETION_FAILED, &message)
                        .await;
                }
                reconcile(policy, Some(result), None, now, interval)
            }
            Err(e) => {
                warn!("Policy {} evaluation failed: {}", policy_name, e);
                self.metrics.counter_add(EVALUATION_ERRORS_TOTAL, &labels, 1);
                self.events
                    .record(&policy_name, EVENT_GC_FAILED, &e.to_string())
                    .await;
                reconcile(policy, None, Some(e), now, interval)
            }
        };

        if let Err(e) = self.status_updater.update(policy, &status).await {
            let err = GcError::StatusUpdateFailed {
                policy: policy_name.clone(),
                source: e,
            };
            warn!("{}", err);
        }

        outcome
    }

    /// The pure part of a cycle: resolve, list, filter and delete. No status
    /// write, no events.
    pub async fn evaluate_at(
        &self,
        cancel: &CancellationToken,
        policy: &GarbageCollectionPolicy,
        now: DateTime<Utc>,
    ) -> Result<EvaluationResult, GcError> {
        validate_policy(policy).map_err(|e| GcError::InvalidPolicy(e.to_string()))?;

        let target = &policy.spec.target_resource;
        let gvr = self.resolver.resolve(&target.api_version, &target.kind).await?;
        self.lister.track(&policy.id, &gvr).await;

        let scope = namespace_scope(policy);
        let candidates = self
            .lister
            .list(&gvr, &scope)
            .await
            .map_err(|e| GcError::ListFailed {
                resource: format!("{} in {}", gvr, scope),
                source: e,
            })?;
        debug!(
            "Policy {}: {} candidate {} in {}",
            policy.full_name(),
            candidates.len(),
            gvr,
            scope
        );

        let mut result = EvaluationResult::default();
        let mut eligible: Vec<Resource> = Vec::new();

        for resource in candidates {
            let id = resource.id();
            if !matches_selectors(&resource, target) {
                result.reasons.insert(id, REASON_SELECTOR_MISMATCH.to_string());
                continue;
            }
            result.matched += 1;

            if resource.deletion_timestamp().is_some() {
                result.reasons.insert(id, REASON_TERMINATING.to_string());
                continue;
            }
            if !meets_conditions(&resource, &policy.spec.conditions) {
                result.reasons.insert(id, REASON_CONDITION_NOT_MET.to_string());
                continue;
            }
            match is_expired(&resource, &policy.spec.ttl, now) {
                Ok(expiry) if expiry.expired => {
                    result.reasons.insert(id, REASON_EXPIRED.to_string());
                    eligible.push(resource);
                }
                Ok(_) => {
                    result.reasons.insert(id, REASON_NOT_EXPIRED.to_string());
                }
                Err(TtlError::NoTtlConfigured) => {
                    result.reasons.insert(id, REASON_NO_TTL.to_string());
                }
                Err(e) => {
                    debug!(
                        "Policy {}: skipping {}: {}",
                        policy.full_name(),
                        resource.qualified_name(),
                        e
                    );
                    result.reasons.insert(id, e.to_string());
                }
            }
        }

        if !eligible.is_empty() {
            let limiter = self
                .limiters
                .get_or_create(&policy.id, policy.spec.behavior.max_deletions_per_second)
                .await;
            let outcome = delete_batch(
                cancel,
                self.deleter.as_ref(),
                &gvr,
                &eligible,
                policy,
                &limiter,
                self.config.default_batch_size,
                &mut result.reasons,
            )
            .await;
            result.deleted = outcome.deleted;
            result.dry_run = outcome.dry_run;
            result.failed = outcome.errors.len();
            result.cancelled = outcome.cancelled;
            if outcome.deleted > 0 {
                self.lister.invalidate(&gvr).await;
            }
        }

        result.pending = result.matched.saturating_sub(result.deleted);
        Ok(result)
    }

    /// Release everything held for a policy that no longer exists.
    pub async fn forget_policy(&self, policy_uid: &str, full_name: &str) {
        self.limiters.remove(policy_uid).await;
        self.lister.forget(policy_uid).await;
        self.metrics.remove_series("policy", full_name);
        debug!("Released engine state for policy {}", full_name);
    }

    fn record_result_metrics(&self, policy_name: &str, result: &EvaluationResult) {
        let labels = [("policy", policy_name)];
        self.metrics
            .counter_add(RESOURCES_MATCHED_TOTAL, &labels, result.matched as u64);
        self.metrics
            .counter_add(RESOURCES_DELETED_TOTAL, &labels, result.deleted as u64);
        self.metrics
            .counter_add(DELETION_ERRORS_TOTAL, &labels, result.failed as u64);
        self.metrics
            .counter_add(DRY_RUN_DELETIONS_TOTAL, &labels, result.dry_run as u64);
    }
}

/// Unset targets the policy's own namespace; `*` or empty targets all.
pub fn namespace_scope(policy: &GarbageCollectionPolicy) -> NamespaceScope {
    match policy.spec.target_resource.namespace.as_deref() {
        None => NamespaceScope::Namespace(policy.namespace.clone()),
        Some(ns) if ns.is_empty() || ns == ALL_NAMESPACES => NamespaceScope::All,
        Some(ns) => NamespaceScope::Namespace(ns.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        FakeDeleter, FakeEvents, FakeLister, FakeStatusUpdater, make_policy, make_resource,
    };
    use chrono::Duration as ChronoDuration;
    use pkg_constants::gc::{CONDITION_READY, REASON_DELETED};
    use pkg_types::policy::{ConditionStatus, MetadataCondition, MetadataOperator, PolicyPhase};
    use std::sync::atomic::Ordering;

    struct Harness {
        lister: Arc<FakeLister>,
        deleter: Arc<FakeDeleter>,
        status: Arc<FakeStatusUpdater>,
        events: Arc<FakeEvents>,
        metrics: Arc<MetricsRegistry>,
        evaluator: PolicyEvaluator,
    }

    fn make_harness(resources: Vec<Resource>, deleter: FakeDeleter) -> Harness {
        let lister = Arc::new(FakeLister::new(resources));
        let deleter = Arc::new(deleter);
        let status = Arc::new(FakeStatusUpdater::default());
        let events = Arc::new(FakeEvents::default());
        let metrics = Arc::new(MetricsRegistry::with_gc_metrics());
        let evaluator = PolicyEvaluator::new(
            EngineConfig {
                default_max_deletions_per_second: 10_000,
                ..Default::default()
            },
            EngineDeps {
                lister: lister.clone(),
                deleter: deleter.clone(),
                status_updater: status.clone(),
                events: events.clone(),
                discovery: None,
                metrics: metrics.clone(),
            },
        );
        Harness {
            lister,
            deleter,
            status,
            events,
            metrics,
            evaluator,
        }
    }

    #[tokio::test]
    async fn expired_resource_is_deleted() {
        let now = Utc::now();
        let h = make_harness(
            vec![make_resource("old", "default", now - ChronoDuration::hours(2), &[])],
            FakeDeleter::default(),
        );
        let policy = make_policy("ttl-1h", "default", 3600);

        let result = h
            .evaluator
            .run_cycle(&CancellationToken::new(), &policy, now)
            .await
            .unwrap();

        assert_eq!(result.matched, 1);
        assert_eq!(result.deleted, 1);
        assert_eq!(result.pending, 0);
        assert_eq!(*h.deleter.deleted.lock().unwrap(), vec!["old".to_string()]);
        assert_eq!(result.reasons["uid-old"], REASON_DELETED);

        let status = h.status.last().unwrap();
        assert_eq!(status.phase, PolicyPhase::Active);
        assert_eq!(status.resources_deleted, 1);
        assert_eq!(
            status.condition(CONDITION_READY).unwrap().status,
            ConditionStatus::True
        );
        assert_eq!(h.events.reasons(), vec![EVENT_GC_COMPLETED.to_string()]);
        assert_eq!(
            h.metrics
                .counter_value(RESOURCES_DELETED_TOTAL, &[("policy", "default/ttl-1h")]),
            Some(1)
        );
    }

    #[tokio::test]
    async fn fresh_resource_stays_pending() {
        let now = Utc::now();
        let h = make_harness(
            vec![make_resource("young", "default", now - ChronoDuration::minutes(30), &[])],
            FakeDeleter::default(),
        );
        let policy = make_policy("ttl-1h", "default", 3600);

        let result = h
            .evaluator
            .evaluate_at(&CancellationToken::new(), &policy, now)
            .await
            .unwrap();
        assert_eq!(result.matched, 1);
        assert_eq!(result.deleted, 0);
        assert_eq!(result.pending, 1);
        assert_eq!(result.reasons["uid-young"], REASON_NOT_EXPIRED);
        assert_eq!(h.deleter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unmet_condition_keeps_resource() {
        let now = Utc::now();
        let h = make_harness(
            vec![make_resource("cm", "default", now - ChronoDuration::hours(2), &[("app", "prod")])],
            FakeDeleter::default(),
        );
        let mut policy = make_policy("needs-label", "default", 3600);
        policy.spec.conditions.has_labels = vec![MetadataCondition {
            key: "app".to_string(),
            operator: MetadataOperator::Equals,
            value: Some("test".to_string()),
        }];

        let result = h
            .evaluator
            .evaluate_at(&CancellationToken::new(), &policy, now)
            .await
            .unwrap();
        assert_eq!(result.matched, 1);
        assert_eq!(result.deleted, 0);
        assert_eq!(result.pending, 1);
        assert_eq!(result.reasons["uid-cm"], REASON_CONDITION_NOT_MET);
    }

    #[tokio::test]
    async fn dry_run_leaves_resources_alone() {
        let now = Utc::now();
        let h = make_harness(
            vec![
                make_resource("a", "default", now - ChronoDuration::hours(2), &[]),
                make_resource("b", "default", now - ChronoDuration::hours(3), &[]),
            ],
            FakeDeleter::default(),
        );
        let mut policy = make_policy("dry", "default", 3600);
        policy.spec.behavior.dry_run = true;

        let result = h
            .evaluator
            .run_cycle(&CancellationToken::new(), &policy, now)
            .await
            .unwrap();
        assert_eq!(h.deleter.calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.deleted, 0);
        assert_eq!(result.dry_run, 2);
        assert_eq!(result.pending, 2);
        assert_eq!(
            h.metrics
                .counter_value(DRY_RUN_DELETIONS_TOTAL, &[("policy", "default/dry")]),
            Some(2)
        );
    }

    #[tokio::test]
    async fn cancellation_mid_cycle_returns_partial_result() {
        let now = Utc::now();
        let resources = (0..150)
            .map(|i| make_resource(&format!("cm-{}", i), "default", now - ChronoDuration::hours(2), &[]))
            .collect();
        let cancel = CancellationToken::new();
        let h = make_harness(
            resources,
            FakeDeleter {
                cancel_after: Some((10, cancel.clone())),
                ..Default::default()
            },
        );
        let mut policy = make_policy("bulk", "default", 3600);
        policy.spec.behavior.batch_size = Some(25);

        let result = h.evaluator.evaluate_at(&cancel, &policy, now).await.unwrap();
        assert!(result.cancelled);
        assert_eq!(result.matched, 150);
        assert!(result.deleted < 150);
        assert_eq!(result.pending, 150 - result.deleted);
    }

    #[tokio::test]
    async fn partial_failures_are_counted() {
        let now = Utc::now();
        let resources = (0..5)
            .map(|i| make_resource(&format!("cm-{}", i), "default", now - ChronoDuration::hours(2), &[]))
            .collect();
        let h = make_harness(
            resources,
            FakeDeleter {
                failing: ["cm-1".to_string(), "cm-3".to_string()].into_iter().collect(),
                ..Default::default()
            },
        );
        let policy = make_policy("flaky", "default", 3600);

        let result = h
            .evaluator
            .run_cycle(&CancellationToken::new(), &policy, now)
            .await
            .unwrap();
        assert_eq!(h.deleter.calls.load(Ordering::SeqCst), 5);
        assert_eq!(result.deleted, 3);
        assert_eq!(result.failed, 2);
        assert_eq!(h.status.last().unwrap().resources_failed, 2);
        assert!(h.events.reasons().contains(&EVENT_DELETION_FAILED.to_string()));
    }

    #[tokio::test]
    async fn selector_and_namespace_filtering() {
        let now = Utc::now();
        let old = now - ChronoDuration::hours(2);
        let h = make_harness(
            vec![
                make_resource("match", "default", old, &[("tier", "cache")]),
                make_resource("other-label", "default", old, &[("tier", "db")]),
                make_resource("other-ns", "kube-system", old, &[("tier", "cache")]),
            ],
            FakeDeleter::default(),
        );
        let mut policy = make_policy("cache", "default", 3600);
        let mut match_labels = BTreeMap::new();
        match_labels.insert("tier".to_string(), "cache".to_string());
        policy.spec.target_resource.label_selector = Some(pkg_types::policy::LabelSelector {
            match_labels,
            match_expressions: vec![],
        });

        let result = h
            .evaluator
            .evaluate_at(&CancellationToken::new(), &policy, now)
            .await
            .unwrap();
        assert_eq!(result.matched, 1);
        assert_eq!(result.deleted, 1);
        assert_eq!(result.reasons["uid-other-label"], REASON_SELECTOR_MISMATCH);
        assert!(!result.reasons.contains_key("uid-other-ns"));

        policy.spec.target_resource.namespace = Some("*".to_string());
        let result = h
            .evaluator
            .evaluate_at(&CancellationToken::new(), &policy, now)
            .await
            .unwrap();
        assert!(result.reasons.contains_key("uid-other-ns"));
    }

    #[tokio::test]
    async fn terminating_resources_are_skipped() {
        let now = Utc::now();
        let mut resource = make_resource("going", "default", now - ChronoDuration::hours(2), &[]);
        resource.set_deletion_timestamp(now);
        let h = make_harness(vec![resource], FakeDeleter::default());
        let policy = make_policy("p", "default", 60);

        let result = h
            .evaluator
            .evaluate_at(&CancellationToken::new(), &policy, now)
            .await
            .unwrap();
        assert_eq!(result.matched, 1);
        assert_eq!(result.deleted, 0);
        assert_eq!(result.reasons["uid-going"], REASON_TERMINATING);
    }

    #[tokio::test]
    async fn list_failure_marks_policy_error() {
        let h = make_harness(vec![], FakeDeleter::default());
        h.lister.fail.store(true, Ordering::SeqCst);
        let policy = make_policy("p", "default", 60);

        let err = h
            .evaluator
            .evaluate_policy(&CancellationToken::new(), &policy)
            .await
            .unwrap_err();
        assert!(matches!(err, GcError::ListFailed { .. }));

        let status = h.status.last().unwrap();
        assert_eq!(status.phase, PolicyPhase::Error);
        assert_eq!(h.events.reasons(), vec![EVENT_GC_FAILED.to_string()]);
        assert_eq!(
            h.metrics
                .counter_value(EVALUATION_ERRORS_TOTAL, &[("policy", "default/p")]),
            Some(1)
        );
    }

    #[tokio::test]
    async fn invalid_policy_is_rejected_before_listing() {
        let h = make_harness(vec![], FakeDeleter::default());
        let mut policy = make_policy("p", "default", 60);
        policy.spec.ttl.relative_to = Some("status.completionTime".to_string());

        let err = h
            .evaluator
            .evaluate_policy(&CancellationToken::new(), &policy)
            .await
            .unwrap_err();
        assert!(matches!(err, GcError::InvalidPolicy(_)));
        assert_eq!(h.lister.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn status_write_failure_does_not_fail_cycle() {
        let h = make_harness(vec![], FakeDeleter::default());
        h.status.fail.store(true, Ordering::SeqCst);
        let policy = make_policy("p", "default", 60);
        assert!(
            h.evaluator
                .evaluate_policy(&CancellationToken::new(), &policy)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn forget_policy_releases_limiter() {
        let now = Utc::now();
        let h = make_harness(
            vec![make_resource("old", "default", now - ChronoDuration::hours(2), &[])],
            FakeDeleter::default(),
        );
        let policy = make_policy("p", "default", 60);
        h.evaluator
            .evaluate_at(&CancellationToken::new(), &policy, now)
            .await
            .unwrap();
        assert_eq!(h.evaluator.limiters().len().await, 1);

        h.evaluator.forget_policy(&policy.id, &policy.full_name()).await;
        assert!(h.evaluator.limiters().is_empty().await);
    }

    #[test]
    fn interval_falls_back_to_default() {
        let config = EngineConfig::default();
        let mut policy = make_policy("p", "default", 60);
        assert_eq!(config.interval_for(&policy), config.default_evaluation_interval);
        policy.spec.behavior.evaluation_interval = Some("90s".to_string());
        assert_eq!(config.interval_for(&policy), Duration::from_secs(90));
        policy.spec.behavior.evaluation_interval = Some("soon".to_string());
        assert_eq!(config.interval_for(&policy), config.default_evaluation_interval);
    }

    #[tokio::test]
    async fn deleted_objects_are_not_counted_again_from_cache() {
        use crate::gvr::GroupVersionResource;
        use crate::store::{StoreDeleter, StoreResourceLister, resource_key};
        use pkg_state::client::StateStore;

        let store = StateStore::in_memory().await.unwrap();
        let now = Utc::now();
        let resource = make_resource("old", "default", now - ChronoDuration::hours(2), &[]);
        let key = resource_key(
            &GroupVersionResource::new("", "v1", "configmaps"),
            Some("default"),
            "old",
        );
        store
            .put(&key, &serde_json::to_vec(&resource).unwrap())
            .await
            .unwrap();

        let evaluator = PolicyEvaluator::new(
            EngineConfig {
                default_max_deletions_per_second: 10_000,
                lister_cache_ttl: Duration::from_secs(600),
                ..Default::default()
            },
            EngineDeps {
                lister: Arc::new(StoreResourceLister::new(store.clone())),
                deleter: Arc::new(StoreDeleter::new(store.clone())),
                status_updater: Arc::new(FakeStatusUpdater::default()),
                events: Arc::new(FakeEvents::default()),
                discovery: None,
                metrics: Arc::new(MetricsRegistry::with_gc_metrics()),
            },
        );
        let policy = make_policy("p", "default", 60);
        let cancel = CancellationToken::new();

        let first = evaluator.evaluate_at(&cancel, &policy, now).await.unwrap();
        assert_eq!(first.deleted, 1);
        assert!(store.get(&key).await.unwrap().is_none());

        let second = evaluator.evaluate_at(&cancel, &policy, now).await.unwrap();
        assert_eq!(second.matched, 0);
        assert_eq!(second.deleted, 0);
    }
}
