use thiserror::Error;

/// Why an expiry could not be computed for one resource. Never fails a cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TtlError {
    #[error("no TTL configured")]
    NoTtlConfigured,

    #[error("field '{0}' not found")]
    FieldNotFound(String),

    #[error("field '{0}' is not a valid RFC 3339 timestamp")]
    InvalidTimestamp(String),

    #[error("field '{0}' is not a valid TTL value")]
    InvalidTtlValue(String),

    #[error("no TTL mapping for value '{0}' and no default")]
    NoMatchingMapping(String),
}

/// Engine errors. `ResolutionFailed`, `ListFailed` and `InvalidPolicy` abort one
/// policy's cycle; the rest are scoped to a single resource or write.
#[derive(Error, Debug)]
pub enum GcError {
    #[error("cannot resolve resource type for {api_version}/{kind}: {reason}")]
    ResolutionFailed {
        api_version: String,
        kind: String,
        reason: String,
    },

    #[error("listing {resource} failed: {source}")]
    ListFailed {
        resource: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    #[error(transparent)]
    Ttl(#[from] TtlError),

    #[error("deleting {resource} failed: {source}")]
    DeletionFailed {
        resource: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("updating status of {policy} failed: {source}")]
    StatusUpdateFailed {
        policy: String,
        #[source]
        source: anyhow::Error,
    },
}

impl GcError {
    /// True for errors that mean the policy could not be evaluated at all.
    pub fn is_policy_fatal(&self) -> bool {
        matches!(
            self,
            GcError::ResolutionFailed { .. } | GcError::ListFailed { .. } | GcError::InvalidPolicy(_)
        )
    }
}

pub type Result<T, E = GcError> = std::result::Result<T, E>;
