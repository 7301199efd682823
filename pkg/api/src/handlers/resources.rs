use axum::{
    Json,
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use pkg_constants::state::CORE_GROUP_SEGMENT;
use pkg_gc::collaborators::{NamespaceScope, ResourceLister};
use pkg_gc::gvr::GroupVersionResource;
use pkg_gc::store::discovery::ApiResource;
use pkg_gc::store::resource_key;
use pkg_types::resource::Resource;
use tracing::{info, warn};
use uuid::Uuid;

use super::policies::ListQuery;
use crate::AppState;

/// Store a resource under its resolved type. Missing uid and creation
/// timestamp are filled in; an existing object keeps its own.
pub async fn apply_resource(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    let mut resource = match Resource::from_value(body) {
        Ok(r) => r,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    let gvr = match state
        .resolver
        .resolve(resource.api_version(), resource.kind())
        .await
    {
        Ok(gvr) => gvr,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    let key = resource_key(&gvr, resource.namespace(), resource.name());
    let existing = match state.store.get(&key).await {
        Ok(Some(data)) => serde_json::from_slice::<serde_json::Value>(&data)
            .ok()
            .and_then(|v| Resource::from_value(v).ok()),
        Ok(None) => None,
        Err(e) => {
            warn!("Failed to read {}: {}", key, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read resource".to_string())
                .into_response();
        }
    };

    if resource.uid().is_none() {
        let uid = existing
            .as_ref()
            .and_then(|r| r.uid().map(str::to_string))
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        resource.set_uid(&uid);
    }
    if !resource.creation_timestamp().is_found() {
        let created = existing
            .as_ref()
            .and_then(|r| r.creation_timestamp().found())
            .unwrap_or_else(Utc::now);
        resource.set_creation_timestamp(created);
    }

    match serde_json::to_vec(&resource) {
        Ok(data) => {
            if let Err(e) = state.store.put(&key, &data).await {
                warn!("Failed to store {}: {}", key, e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to store resource".to_string())
                    .into_response();
            }
            info!("Applied {} {}", gvr, resource.qualified_name());
            let code = if existing.is_some() {
                StatusCode::OK
            } else {
                StatusCode::CREATED
            };
            (code, Json(resource)).into_response()
        }
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Serialization failed".to_string())
            .into_response(),
    }
}

pub async fn list_resources(
    State(state): State<AppState>,
    AxumPath((group, version, resource)): AxumPath<(String, String, String)>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let group = if group == CORE_GROUP_SEGMENT {
        String::new()
    } else {
        group
    };
    let gvr = GroupVersionResource {
        group,
        version,
        resource,
    };
    let scope = match query.namespace {
        Some(ns) => NamespaceScope::Namespace(ns),
        None => NamespaceScope::All,
    };
    match state.lister.list(&gvr, &scope).await {
        Ok(resources) => (StatusCode::OK, Json(resources)).into_response(),
        Err(e) => {
            warn!("Failed to list {}: {}", gvr, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Register the plural resource name of a kind for discovery.
pub async fn register_api_resource(
    State(state): State<AppState>,
    Json(entry): Json<ApiResource>,
) -> impl IntoResponse {
    if entry.version.is_empty() || entry.kind.is_empty() || entry.resource.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            "version, kind and resource are required".to_string(),
        )
            .into_response();
    }
    match state.discovery.register(&entry).await {
        Ok(()) => {
            info!(
                "Registered API resource {} → {}",
                entry.kind, entry.resource
            );
            (StatusCode::CREATED, Json(entry)).into_response()
        }
        Err(e) => {
            warn!("Failed to register API resource {}: {}", entry.kind, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
