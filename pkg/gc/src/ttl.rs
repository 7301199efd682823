//! Expiry computation. Pure: the result depends only on the resource, the
//! TTL spec and the supplied `now`.

use chrono::{DateTime, Duration, Utc};
use pkg_types::policy::TtlSpec;
use pkg_types::resource::{FieldValue, Resource};

use crate::error::TtlError;

const CREATION_TIMESTAMP: &str = "metadata.creationTimestamp";

/// Result of a successful TTL computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry {
    pub expired: bool,
    /// TTL in seconds that was applied.
    pub ttl_seconds: i64,
    /// `None` when the expiry instant is beyond the representable range.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Decide whether `resource` has expired at `now`.
///
/// Mode precedence: `relativeTo`, then `fieldPath` with `mappings`, then
/// `fieldPath` alone, then `secondsAfterCreation`. The boundary instant counts
/// as expired.
pub fn is_expired(resource: &Resource, ttl: &TtlSpec, now: DateTime<Utc>) -> Result<Expiry, TtlError> {
    let (base, ttl_seconds) = if let Some(path) = &ttl.relative_to {
        let base = timestamp_at(resource, path)?;
        (base, ttl.seconds_after.unwrap_or(0))
    } else if let Some(path) = &ttl.field_path {
        let seconds = match &ttl.mappings {
            Some(mappings) => mapped_ttl(resource, path, mappings, ttl.default)?,
            None => field_ttl(resource, path, ttl.default)?,
        };
        (timestamp_at(resource, CREATION_TIMESTAMP)?, seconds)
    } else if let Some(seconds) = ttl.seconds_after_creation {
        (timestamp_at(resource, CREATION_TIMESTAMP)?, seconds)
    } else {
        return Err(TtlError::NoTtlConfigured);
    };

    let expires_at = Duration::try_seconds(ttl_seconds).and_then(|d| base.checked_add_signed(d));
    Ok(Expiry {
        expired: expires_at.is_some_and(|at| now >= at),
        ttl_seconds,
        expires_at,
    })
}

fn timestamp_at(resource: &Resource, path: &str) -> Result<DateTime<Utc>, TtlError> {
    match resource.nested_timestamp(path) {
        FieldValue::Found(ts) => Ok(ts),
        FieldValue::NotFound => Err(TtlError::FieldNotFound(path.to_string())),
        FieldValue::TypeMismatch => Err(TtlError::InvalidTimestamp(path.to_string())),
    }
}

fn mapped_ttl(
    resource: &Resource,
    path: &str,
    mappings: &std::collections::BTreeMap<String, i64>,
    default: Option<i64>,
) -> Result<i64, TtlError> {
    match resource.nested_string(path) {
        FieldValue::Found(value) => match mappings.get(&value) {
            Some(seconds) => Ok(*seconds),
            None => default.ok_or(TtlError::NoMatchingMapping(value)),
        },
        FieldValue::NotFound => default.ok_or_else(|| TtlError::FieldNotFound(path.to_string())),
        FieldValue::TypeMismatch => Err(TtlError::InvalidTtlValue(path.to_string())),
    }
}

fn field_ttl(resource: &Resource, path: &str, default: Option<i64>) -> Result<i64, TtlError> {
    match resource.nested_i64(path) {
        FieldValue::Found(seconds) if seconds >= 0 => Ok(seconds),
        FieldValue::Found(_) | FieldValue::TypeMismatch => {
            Err(TtlError::InvalidTtlValue(path.to_string()))
        }
        FieldValue::NotFound => default.ok_or_else(|| TtlError::FieldNotFound(path.to_string())),
    }
}
