//! Thread-safe counters and gauges rendered in Prometheus text exposition format.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

pub const EVALUATIONS_TOTAL: &str = "ttlgc_evaluations_total";
pub const EVALUATION_ERRORS_TOTAL: &str = "ttlgc_evaluation_errors_total";
pub const RESOURCES_MATCHED_TOTAL: &str = "ttlgc_resources_matched_total";
pub const RESOURCES_DELETED_TOTAL: &str = "ttlgc_resources_deleted_total";
pub const DELETION_ERRORS_TOTAL: &str = "ttlgc_deletion_errors_total";
pub const DRY_RUN_DELETIONS_TOTAL: &str = "ttlgc_dry_run_deletions_total";
pub const POLICIES: &str = "ttlgc_policies";
pub const IS_LEADER: &str = "ttlgc_is_leader";

/// Label set rendered as `{k="v",...}`; the empty string means "no labels".
type LabelKey = String;

struct Family<V> {
    help: String,
    series: BTreeMap<LabelKey, V>,
}

/// A lightweight metrics registry. Series are created on first use within a
/// registered family; unregistered names are ignored.
pub struct MetricsRegistry {
    counters: RwLock<BTreeMap<String, Family<AtomicU64>>>,
    gauges: RwLock<BTreeMap<String, Family<AtomicI64>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(BTreeMap::new()),
            gauges: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registry pre-populated with every family the engine reports.
    pub fn with_gc_metrics() -> Self {
        let registry = Self::new();
        registry.register_counter(EVALUATIONS_TOTAL, "Policy evaluation cycles started");
        registry.register_counter(
            EVALUATION_ERRORS_TOTAL,
            "Policy evaluation cycles aborted by a policy-level error",
        );
        registry.register_counter(
            RESOURCES_MATCHED_TOTAL,
            "Resources that passed a policy's selectors",
        );
        registry.register_counter(RESOURCES_DELETED_TOTAL, "Resources deleted");
        registry.register_counter(DELETION_ERRORS_TOTAL, "Failed deletion attempts");
        registry.register_counter(
            DRY_RUN_DELETIONS_TOTAL,
            "Deletions skipped because the policy is in dry-run mode",
        );
        registry.register_gauge(POLICIES, "Policies known to the scheduler");
        registry.register_gauge(IS_LEADER, "1 when this replica holds leadership");
        registry
    }

    /// Register a counter family. If it already exists, this is a no-op.
    pub fn register_counter(&self, name: &str, help: &str) {
        let mut counters = self.counters.write().unwrap_or_else(PoisonError::into_inner);
        counters.entry(name.to_string()).or_insert_with(|| Family {
            help: help.to_string(),
            series: BTreeMap::new(),
        });
    }

    /// Register a gauge family. If it already exists, this is a no-op.
    pub fn register_gauge(&self, name: &str, help: &str) {
        let mut gauges = self.gauges.write().unwrap_or_else(PoisonError::into_inner);
        gauges.entry(name.to_string()).or_insert_with(|| Family {
            help: help.to_string(),
            series: BTreeMap::new(),
        });
    }

    /// Increment an unlabelled counter by 1.
    pub fn counter_inc(&self, name: &str) {
        self.counter_add(name, &[], 1);
    }

    /// Add `val` to the counter series identified by `labels`.
    pub fn counter_add(&self, name: &str, labels: &[(&str, &str)], val: u64) {
        let key = label_key(labels);
        {
            let counters = self.counters.read().unwrap_or_else(PoisonError::into_inner);
            match counters.get(name) {
                None => return,
                Some(family) => {
                    if let Some(series) = family.series.get(&key) {
                        series.fetch_add(val, Ordering::Relaxed);
                        return;
                    }
                }
            }
        }
        let mut counters = self.counters.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(family) = counters.get_mut(name) {
            family
                .series
                .entry(key)
                .or_insert_with(|| AtomicU64::new(0))
                .fetch_add(val, Ordering::Relaxed);
        }
    }

    /// Current value of a counter series, if it exists.
    pub fn counter_value(&self, name: &str, labels: &[(&str, &str)]) -> Option<u64> {
        let counters = self.counters.read().unwrap_or_else(PoisonError::into_inner);
        counters
            .get(name)
            .and_then(|family| family.series.get(&label_key(labels)))
            .map(|v| v.load(Ordering::Relaxed))
    }

    /// Set an unlabelled gauge to a specific value.
    pub fn gauge_set(&self, name: &str, val: i64) {
        let mut gauges = self.gauges.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(family) = gauges.get_mut(name) {
            family
                .series
                .entry(String::new())
                .or_insert_with(|| AtomicI64::new(0))
                .store(val, Ordering::Relaxed);
        }
    }

    /// Drop every labelled series mentioning `label=value`, e.g. when a policy is deleted.
    pub fn remove_series(&self, label: &str, value: &str) {
        let needle = format!("{}=\"{}\"", label, escape(value));
        let mut counters = self.counters.write().unwrap_or_else(PoisonError::into_inner);
        for family in counters.values_mut() {
            family.series.retain(|key, _| !key.contains(&needle));
        }
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut output = String::new();

        let counters = self.counters.read().unwrap_or_else(PoisonError::into_inner);
        for (name, family) in counters.iter() {
            output.push_str(&format!("# HELP {} {}\n", name, family.help));
            output.push_str(&format!("# TYPE {} counter\n", name));
            for (labels, value) in &family.series {
                output.push_str(&format!(
                    "{}{} {}\n",
                    name,
                    labels,
                    value.load(Ordering::Relaxed)
                ));
            }
        }

        let gauges = self.gauges.read().unwrap_or_else(PoisonError::into_inner);
        for (name, family) in gauges.iter() {
            output.push_str(&format!("# HELP {} {}\n", name, family.help));
            output.push_str(&format!("# TYPE {} gauge\n", name));
            for (labels, value) in &family.series {
                output.push_str(&format!(
                    "{}{} {}\n",
                    name,
                    labels,
                    value.load(Ordering::Relaxed)
                ));
            }
        }

        output
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    if labels.is_empty() {
        return String::new();
    }
    let mut sorted: Vec<_> = labels.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let inner: Vec<String> = sorted
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape(v)))
        .collect();
    format!("{{{}}}", inner.join(","))
}
