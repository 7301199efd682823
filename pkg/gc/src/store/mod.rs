//! Collaborator implementations backed by the SlateDB state store.

pub mod deleter;
pub mod discovery;
pub mod events;
pub mod leadership;
pub mod lister;
pub mod policies;
pub mod status;

pub use deleter::StoreDeleter;
pub use discovery::StoreDiscovery;
pub use events::StoreEventRecorder;
pub use leadership::{ElectionLeadership, StaticLeadership};
pub use lister::StoreResourceLister;
pub use policies::StorePolicySource;
pub use status::StoreStatusUpdater;

use pkg_constants::state::{
    API_RESOURCE_PREFIX, CLUSTER_SCOPE_SEGMENT, CORE_GROUP_SEGMENT, EVENT_PREFIX, POLICY_PREFIX,
    RESOURCE_PREFIX,
};

use crate::gvr::GroupVersionResource;

fn group_segment(group: &str) -> &str {
    if group.is_empty() {
        CORE_GROUP_SEGMENT
    } else {
        group
    }
}

pub fn policy_key(namespace: &str, name: &str) -> String {
    format!("{}{}/{}", POLICY_PREFIX, namespace, name)
}

/// Prefix holding every object of one resource type.
pub fn resource_type_prefix(gvr: &GroupVersionResource) -> String {
    format!(
        "{}{}/{}/{}/",
        RESOURCE_PREFIX,
        group_segment(&gvr.group),
        gvr.version,
        gvr.resource
    )
}

pub fn resource_key(gvr: &GroupVersionResource, namespace: Option<&str>, name: &str) -> String {
    format!(
        "{}{}/{}",
        resource_type_prefix(gvr),
        namespace.unwrap_or(CLUSTER_SCOPE_SEGMENT),
        name
    )
}

pub fn api_resource_key(group: &str, version: &str, kind: &str) -> String {
    format!(
        "{}{}/{}/{}",
        API_RESOURCE_PREFIX,
        group_segment(group),
        version,
        kind
    )
}

pub fn event_key(namespace: &str, id: &str) -> String {
    format!("{}{}/{}", EVENT_PREFIX, namespace, id)
}
