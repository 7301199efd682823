use axum::{
    Json,
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use pkg_constants::state::POLICY_PREFIX;
use pkg_gc::store::policy_key;
use pkg_types::policy::{GarbageCollectionPolicy, PolicyManifest, PolicyPhase};
use pkg_types::validate::validate_policy;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::AppState;

/// Query parameters for listing policies.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Create or replace a policy. Re-applying keeps its id and status.
pub async fn apply_policy(
    State(state): State<AppState>,
    Json(manifest): Json<PolicyManifest>,
) -> impl IntoResponse {
    let key = policy_key(&manifest.namespace, &manifest.name);
    let existing = match state.store.get(&key).await {
        Ok(Some(data)) => serde_json::from_slice::<GarbageCollectionPolicy>(&data).ok(),
        Ok(None) => None,
        Err(e) => {
            warn!("Failed to read policy {}: {}", key, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read policy".to_string())
                .into_response();
        }
    };
    let created = existing.is_none();
    let policy = manifest.into_policy(existing, || Uuid::new_v4().to_string(), Utc::now());

    if let Err(e) = validate_policy(&policy) {
        return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
    }

    match serde_json::to_vec(&policy) {
        Ok(data) => {
            if let Err(e) = state.store.put(&key, &data).await {
                warn!("Failed to store policy {}: {}", policy.full_name(), e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to store policy".to_string())
                    .into_response();
            }
            info!(
                "{} policy {} (id={})",
                if created { "Created" } else { "Updated" },
                policy.full_name(),
                policy.id
            );
            let code = if created { StatusCode::CREATED } else { StatusCode::OK };
            (code, Json(policy)).into_response()
        }
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Serialization failed".to_string())
            .into_response(),
    }
}

pub async fn list_policies(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let prefix = match &query.namespace {
        Some(ns) => format!("{}{}/", POLICY_PREFIX, ns),
        None => POLICY_PREFIX.to_string(),
    };
    let entries = state.store.list_prefix(&prefix).await.unwrap_or_default();
    let policies: Vec<GarbageCollectionPolicy> = entries
        .into_iter()
        .filter_map(|(_, v)| serde_json::from_slice(&v).ok())
        .collect();
    (StatusCode::OK, Json(policies)).into_response()
}

pub async fn get_policy(
    State(state): State<AppState>,
    AxumPath((ns, name)): AxumPath<(String, String)>,
) -> impl IntoResponse {
    match state.store.get(&policy_key(&ns, &name)).await {
        Ok(Some(data)) => match serde_json::from_slice::<GarbageCollectionPolicy>(&data) {
            Ok(policy) => (StatusCode::OK, Json(policy)).into_response(),
            Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        },
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

pub async fn delete_policy(
    State(state): State<AppState>,
    AxumPath((ns, name)): AxumPath<(String, String)>,
) -> impl IntoResponse {
    let key = policy_key(&ns, &name);
    match state.store.get(&key).await {
        Ok(Some(_)) => {}
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
    match state.store.delete(&key).await {
        Ok(()) => {
            info!("Deleted policy {}/{}", ns, name);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            warn!("Failed to delete policy {}/{}: {}", ns, name, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn pause_policy(
    State(state): State<AppState>,
    AxumPath((ns, name)): AxumPath<(String, String)>,
) -> impl IntoResponse {
    set_paused(&state, &ns, &name, true).await
}

pub async fn resume_policy(
    State(state): State<AppState>,
    AxumPath((ns, name)): AxumPath<(String, String)>,
) -> impl IntoResponse {
    set_paused(&state, &ns, &name, false).await
}

/// Pausing suspends deletions until resumed. Resuming returns the policy to
/// Active, or to Pending if it has never run. Repeating either is a no-op.
async fn set_paused(state: &AppState, ns: &str, name: &str, paused: bool) -> axum::response::Response {
    let key = policy_key(ns, name);
    let mut policy = match state.store.get(&key).await {
        Ok(Some(data)) => match serde_json::from_slice::<GarbageCollectionPolicy>(&data) {
            Ok(policy) => policy,
            Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        },
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    if policy.is_paused() == paused {
        return (StatusCode::OK, Json(policy)).into_response();
    }
    policy.status.phase = match (paused, policy.status.last_gc_run) {
        (true, _) => PolicyPhase::Paused,
        (false, Some(_)) => PolicyPhase::Active,
        (false, None) => PolicyPhase::Pending,
    };

    match serde_json::to_vec(&policy) {
        Ok(data) => {
            if let Err(e) = state.store.put(&key, &data).await {
                warn!("Failed to store policy {}: {}", policy.full_name(), e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to store policy".to_string())
                    .into_response();
            }
            info!(
                "{} policy {}",
                if paused { "Paused" } else { "Resumed" },
                policy.full_name()
            );
            (StatusCode::OK, Json(policy)).into_response()
        }
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Serialization failed".to_string())
            .into_response(),
    }
}
