use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recorded occurrence on a policy (completed cycle, failed deletion, ...).
/// Stored at `/registry/events/<namespace>/<id>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub namespace: String,
    /// `namespace/name` of the object the event is about
    pub subject: String,
    pub reason: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}
