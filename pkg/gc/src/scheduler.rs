use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use pkg_constants::gc::DEFAULT_TICK_INTERVAL_SECS;
use pkg_metrics::{IS_LEADER, MetricsRegistry, POLICIES};
use pkg_types::policy::GarbageCollectionPolicy;
use tokio::sync::{broadcast, watch};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collaborators::{LeadershipSource, PolicyEvent, PolicySource};
use crate::evaluator::PolicyEvaluator;

/// How many policies may be evaluated at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingMode {
    Sequential,
    /// Fixed pool of workers, each evaluating one policy at a time.
    Concurrent { workers: usize },
}

impl SchedulingMode {
    pub fn from_max_concurrent(max: usize) -> Self {
        if max <= 1 {
            SchedulingMode::Sequential
        } else {
            SchedulingMode::Concurrent { workers: max }
        }
    }

    fn workers(&self) -> usize {
        match self {
            SchedulingMode::Sequential => 1,
            SchedulingMode::Concurrent { workers } => (*workers).max(1),
        }
    }
}

#[derive(Default)]
struct Schedule {
    /// Policy UID → earliest instant the next cycle may start.
    next_due: HashMap<String, Instant>,
    /// Policy UID → `namespace/name`, for policies seen on the last sync.
    names: HashMap<String, String>,
    /// Policy UIDs with a cycle running right now.
    in_flight: HashSet<String>,
}

/// Evaluations started by the scheduler. `term` is cancelled when leadership
/// is lost, which stops every in-flight batch; a fresh token replaces it.
struct WorkerPool {
    tasks: JoinSet<bool>,
    term: CancellationToken,
}

impl WorkerPool {
    fn new(term: CancellationToken) -> Self {
        Self {
            tasks: JoinSet::new(),
            term,
        }
    }

    /// Returns true if the joined worker ran a cycle.
    fn finished(joined: Result<bool, JoinError>) -> bool {
        match joined {
            Ok(ran) => ran,
            Err(e) => {
                warn!("Evaluation worker failed: {}", e);
                false
            }
        }
    }
}

/// Marks a policy in flight for as long as its worker lives, panics included.
struct Claim {
    scheduler: Arc<EvaluationScheduler>,
    policy_uid: String,
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.scheduler
            .schedule
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_flight
            .remove(&self.policy_uid);
    }
}

/// Drives the evaluator over every known policy. A long-lived worker pool is
/// topped up on every tick and whenever a worker finishes, so a slow policy
/// only ever occupies its own worker.
pub struct EvaluationScheduler {
    evaluator: Arc<PolicyEvaluator>,
    policies: Arc<dyn PolicySource>,
    leadership: Arc<dyn LeadershipSource>,
    metrics: Arc<MetricsRegistry>,
    mode: SchedulingMode,
    tick: Duration,
    schedule: Mutex<Schedule>,
}

impl EvaluationScheduler {
    pub fn new(
        evaluator: Arc<PolicyEvaluator>,
        policies: Arc<dyn PolicySource>,
        leadership: Arc<dyn LeadershipSource>,
        metrics: Arc<MetricsRegistry>,
        mode: SchedulingMode,
    ) -> Self {
        Self {
            evaluator,
            policies,
            leadership,
            metrics,
            mode,
            tick: Duration::from_secs(DEFAULT_TICK_INTERVAL_SECS),
            schedule: Mutex::new(Schedule::default()),
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "EvaluationScheduler started (tick={}ms, mode={:?})",
                self.tick.as_millis(),
                self.mode
            );
            let mut interval = tokio::time::interval(self.tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut events = Some(self.policies.subscribe());
            let mut leadership = Some(self.leadership.subscribe());
            let mut pool = WorkerPool::new(cancel.child_token());

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        self.dispatch(&mut pool).await;
                    }
                    Some(joined) = pool.tasks.join_next(), if !pool.tasks.is_empty() => {
                        WorkerPool::finished(joined);
                        self.dispatch(&mut pool).await;
                    }
                    change = next_leadership(&mut leadership) => {
                        match change {
                            Some(true) => {
                                info!("Leadership acquired");
                                self.metrics.gauge_set(IS_LEADER, 1);
                                self.dispatch(&mut pool).await;
                            }
                            Some(false) => {
                                self.metrics.gauge_set(IS_LEADER, 0);
                                info!(
                                    "Leadership lost, cancelling {} in-flight evaluation(s)",
                                    pool.tasks.len()
                                );
                                pool.term.cancel();
                                pool.term = cancel.child_token();
                            }
                            None => {
                                debug!("Leadership stream closed");
                                leadership = None;
                            }
                        }
                    }
                    event = next_event(&mut events) => {
                        match event {
                            Ok(event) => self.handle_event(event).await,
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!("Scheduler lagged {} policy events, relying on resync", n);
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                debug!("Policy event stream closed");
                                events = None;
                            }
                        }
                    }
                }
            }

            // `term` is a child of `cancel`, so running batches are already stopping
            while pool.tasks.join_next().await.is_some() {}
            info!("EvaluationScheduler stopped");
        })
    }

    /// Run every due policy once and wait for all of them. Returns the number
    /// of cycles that ran.
    pub async fn run_once(self: &Arc<Self>, cancel: &CancellationToken) -> usize {
        let mut pool = WorkerPool::new(cancel.child_token());
        let mut ran = 0;
        loop {
            self.dispatch(&mut pool).await;
            match pool.tasks.join_next().await {
                Some(joined) => ran += usize::from(WorkerPool::finished(joined)),
                None => break,
            }
        }
        ran
    }

    /// Sync the policy set, then hand due policies that are not already
    /// running to free workers, oldest due first. Returns how many started.
    async fn dispatch(self: &Arc<Self>, pool: &mut WorkerPool) -> usize {
        let leader = self.leadership.is_leader();
        self.metrics.gauge_set(IS_LEADER, i64::from(leader));
        if !leader || pool.term.is_cancelled() {
            return 0;
        }

        let policies = match self.policies.list_policies().await {
            Ok(policies) => policies,
            Err(e) => {
                warn!("Scheduler failed to list policies: {}", e);
                return 0;
            }
        };
        self.sync(&policies).await;

        let free = self.mode.workers().saturating_sub(pool.tasks.len());
        if free == 0 {
            return 0;
        }

        let now = Instant::now();
        let mut due = Vec::new();
        {
            let schedule = self.schedule.lock().unwrap_or_else(PoisonError::into_inner);
            for policy in policies {
                if schedule.in_flight.contains(&policy.id) {
                    continue;
                }
                let next = schedule.next_due.get(&policy.id).copied();
                if next.is_some_and(|at| at > now) {
                    continue;
                }
                due.push((next, policy));
            }
        }
        // never-run policies (None) sort first
        due.sort_by_key(|(next, _)| *next);

        let mut started = 0;
        for (_, policy) in due {
            if started == free {
                break;
            }
            if policy.is_paused() {
                debug!("Policy {} is paused, skipping cycle", policy.full_name());
                self.reschedule(&policy, now);
                continue;
            }

            self.schedule
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .in_flight
                .insert(policy.id.clone());
            let claim = Claim {
                scheduler: Arc::clone(self),
                policy_uid: policy.id.clone(),
            };
            let token = pool.term.clone();
            pool.tasks.spawn(async move {
                let ran = claim.scheduler.evaluate_one(&token, &policy).await;
                drop(claim);
                ran
            });
            started += 1;
        }
        if started > 0 {
            debug!("Started {} evaluation(s), {} running", started, pool.tasks.len());
        }
        started
    }

    /// Run one cycle unless shutdown or leadership loss says otherwise.
    /// Returns false when the cycle did not start.
    async fn evaluate_one(&self, cancel: &CancellationToken, policy: &GarbageCollectionPolicy) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        if !self.leadership.is_leader() {
            debug!("Not leader, skipping cycle for {}", policy.full_name());
            return false;
        }
        if let Err(e) = self.evaluator.evaluate_policy(cancel, policy).await {
            debug!("Policy {} cycle ended with error: {}", policy.full_name(), e);
        }
        self.reschedule(policy, Instant::now());
        true
    }

    fn reschedule(&self, policy: &GarbageCollectionPolicy, finished: Instant) {
        let interval = self.evaluator.config().interval_for(policy);
        let mut schedule = self.schedule.lock().unwrap_or_else(PoisonError::into_inner);
        schedule
            .next_due
            .insert(policy.id.clone(), finished + interval);
    }

    /// Forget policies that disappeared since the last pass.
    async fn sync(&self, policies: &[GarbageCollectionPolicy]) {
        let gone: Vec<(String, String)> = {
            let mut schedule = self.schedule.lock().unwrap_or_else(PoisonError::into_inner);
            let current: HashSet<&str> = policies.iter().map(|p| p.id.as_str()).collect();
            let gone = schedule
                .names
                .iter()
                .filter(|(uid, _)| !current.contains(uid.as_str()))
                .map(|(uid, name)| (uid.clone(), name.clone()))
                .collect::<Vec<_>>();
            for (uid, _) in &gone {
                schedule.names.remove(uid);
                schedule.next_due.remove(uid);
            }
            for policy in policies {
                schedule
                    .names
                    .insert(policy.id.clone(), policy.full_name());
            }
            gone
        };

        for (uid, name) in gone {
            info!("Policy {} removed, releasing its state", name);
            self.evaluator.forget_policy(&uid, &name).await;
        }
        self.metrics.gauge_set(POLICIES, policies.len() as i64);
    }

    async fn handle_event(&self, event: PolicyEvent) {
        match event {
            PolicyEvent::Applied(name) => {
                debug!("Policy {} applied, picked up on next pass", name);
            }
            PolicyEvent::Deleted(name) => {
                let uid = {
                    let mut schedule = self.schedule.lock().unwrap_or_else(PoisonError::into_inner);
                    let uid = schedule
                        .names
                        .iter()
                        .find(|(_, n)| **n == name)
                        .map(|(uid, _)| uid.clone());
                    if let Some(uid) = &uid {
                        schedule.names.remove(uid);
                        schedule.next_due.remove(uid);
                    }
                    uid
                };
                if let Some(uid) = uid {
                    info!("Policy {} deleted, releasing its state", name);
                    self.evaluator.forget_policy(&uid, &name).await;
                }
            }
        }
    }
}

async fn next_leadership(changes: &mut Option<watch::Receiver<bool>>) -> Option<bool> {
    match changes {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(*rx.borrow_and_update()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}

async fn next_event(
    events: &mut Option<broadcast::Receiver<PolicyEvent>>,
) -> Result<PolicyEvent, broadcast::error::RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
