//! TTL garbage-collection engine: policy evaluation, rate-limited deletion and
//! scheduling, plus store-backed implementations of its collaborators.

pub mod batch;
pub mod cache;
pub mod collaborators;
pub mod conditions;
pub mod error;
pub mod evaluator;
pub mod gvr;
pub mod ratelimit;
pub mod scheduler;
pub mod selector;
pub mod status;
pub mod store;
pub mod ttl;

#[cfg(test)]
mod testing;

pub use error::{GcError, TtlError};
pub use evaluator::{EngineConfig, EngineDeps, EvaluationResult, PolicyEvaluator};
pub use gvr::GroupVersionResource;
pub use scheduler::{EvaluationScheduler, SchedulingMode};
