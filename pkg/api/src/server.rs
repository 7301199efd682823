use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::AppState;
use crate::handlers::{health, policies, resources};
use crate::request_id::request_id_middleware;

/// Server configuration passed from the binary's CLI.
pub struct ServerConfig {
    pub addr: SocketAddr,
}

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        // policies
        .route(
            "/apis/gc/v1/policies",
            get(policies::list_policies).post(policies::apply_policy),
        )
        .route(
            "/apis/gc/v1/namespaces/{ns}/policies/{name}",
            get(policies::get_policy).delete(policies::delete_policy),
        )
        .route(
            "/apis/gc/v1/namespaces/{ns}/policies/{name}/pause",
            post(policies::pause_policy),
        )
        .route(
            "/apis/gc/v1/namespaces/{ns}/policies/{name}/resume",
            post(policies::resume_policy),
        )
        // resources
        .route("/apis/gc/v1/resources", post(resources::apply_resource))
        .route(
            "/apis/gc/v1/resources/{group}/{version}/{resource}",
            get(resources::list_resources),
        )
        .route(
            "/apis/gc/v1/apiresources",
            post(resources::register_api_resource),
        )
        .route_layer(middleware::from_fn(request_id_middleware));

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .merge(api_routes)
        .with_state(state)
}

/// Serve on an already bound listener until `cancel` fires.
pub async fn serve(listener: TcpListener, state: AppState, cancel: CancellationToken) -> anyhow::Result<()> {
    let app = router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    info!("API server stopped");
    Ok(())
}

pub async fn start_server(config: ServerConfig, state: AppState, cancel: CancellationToken) -> anyhow::Result<()> {
    info!("Starting API server on {}", config.addr);
    let listener = TcpListener::bind(config.addr).await?;
    serve(listener, state, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_metrics::MetricsRegistry;
    use pkg_state::client::StateStore;
    use serde_json::json;
    use std::sync::Arc;

    async fn spawn_server() -> (String, AppState, CancellationToken) {
        let store = StateStore::in_memory().await.unwrap();
        let state = AppState::new(
            store,
            Arc::new(MetricsRegistry::with_gc_metrics()),
            CancellationToken::new(),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let cancel = CancellationToken::new();
        tokio::spawn(serve(listener, state.clone(), cancel.clone()));
        (base, state, cancel)
    }

    #[tokio::test]
    async fn health_and_readiness() {
        let (base, state, cancel) = spawn_server().await;
        let client = reqwest::Client::new();

        let health = client.get(format!("{}/healthz", base)).send().await.unwrap();
        assert_eq!(health.status(), 200);

        let not_ready = client.get(format!("{}/readyz", base)).send().await.unwrap();
        assert_eq!(not_ready.status(), 503);
        state.ready.cancel();
        let ready = client.get(format!("{}/readyz", base)).send().await.unwrap();
        assert_eq!(ready.status(), 200);

        let metrics = client.get(format!("{}/metrics", base)).send().await.unwrap();
        assert!(metrics.text().await.unwrap().contains("ttlgc_policies"));
        cancel.cancel();
    }

    #[tokio::test]
    async fn policy_lifecycle() {
        let (base, _state, cancel) = spawn_server().await;
        let client = reqwest::Client::new();
        let manifest = json!({
            "name": "old-jobs",
            "namespace": "batch",
            "spec": {
                "targetResource": {"apiVersion": "batch/v1", "kind": "Job"},
                "ttl": {"secondsAfterCreation": 3600}
            }
        });

        let created = client
            .post(format!("{}/apis/gc/v1/policies", base))
            .json(&manifest)
            .send()
            .await
            .unwrap();
        assert_eq!(created.status(), 201);
        let created: serde_json::Value = created.json().await.unwrap();

        let reapplied = client
            .post(format!("{}/apis/gc/v1/policies", base))
            .json(&manifest)
            .send()
            .await
            .unwrap();
        assert_eq!(reapplied.status(), 200);
        let reapplied: serde_json::Value = reapplied.json().await.unwrap();
        assert_eq!(created["id"], reapplied["id"]);

        let listed: Vec<serde_json::Value> = client
            .get(format!("{}/apis/gc/v1/policies?namespace=batch", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);

        let url = format!("{}/apis/gc/v1/namespaces/batch/policies/old-jobs", base);
        assert_eq!(client.get(&url).send().await.unwrap().status(), 200);
        assert_eq!(client.delete(&url).send().await.unwrap().status(), 204);
        assert_eq!(client.get(&url).send().await.unwrap().status(), 404);
        cancel.cancel();
    }

    #[tokio::test]
    async fn pause_and_resume() {
        let (base, _state, cancel) = spawn_server().await;
        let client = reqwest::Client::new();
        let created = client
            .post(format!("{}/apis/gc/v1/policies", base))
            .json(&json!({
                "name": "old-jobs",
                "namespace": "batch",
                "spec": {
                    "targetResource": {"apiVersion": "batch/v1", "kind": "Job"},
                    "ttl": {"secondsAfterCreation": 3600}
                }
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(created.status(), 201);

        let url = format!("{}/apis/gc/v1/namespaces/batch/policies/old-jobs", base);
        let paused: serde_json::Value = client
            .post(format!("{}/pause", url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(paused["status"]["phase"], "Paused");

        let stored: serde_json::Value = client.get(&url).send().await.unwrap().json().await.unwrap();
        assert_eq!(stored["status"]["phase"], "Paused");

        let resumed = client.post(format!("{}/resume", url)).send().await.unwrap();
        assert_eq!(resumed.status(), 200);
        let resumed: serde_json::Value = resumed.json().await.unwrap();
        assert_eq!(resumed["status"]["phase"], "Pending");

        let missing = client
            .post(format!("{}/apis/gc/v1/namespaces/batch/policies/nope/pause", base))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), 404);
        cancel.cancel();
    }

    #[tokio::test]
    async fn invalid_policy_is_rejected() {
        let (base, _state, cancel) = spawn_server().await;
        let response = reqwest::Client::new()
            .post(format!("{}/apis/gc/v1/policies", base))
            .json(&json!({
                "name": "two-modes",
                "spec": {
                    "targetResource": {"apiVersion": "v1", "kind": "Pod"},
                    "ttl": {"secondsAfterCreation": 60, "relativeTo": "status.startTime"}
                }
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        assert!(response.text().await.unwrap().contains("mutually exclusive"));
        cancel.cancel();
    }

    #[tokio::test]
    async fn resources_are_stored_under_resolved_type() {
        let (base, _state, cancel) = spawn_server().await;
        let client = reqwest::Client::new();

        let registered = client
            .post(format!("{}/apis/gc/v1/apiresources", base))
            .json(&json!({"group": "example.io", "version": "v1", "kind": "Octopus", "resource": "octopi"}))
            .send()
            .await
            .unwrap();
        assert_eq!(registered.status(), 201);

        let applied = client
            .post(format!("{}/apis/gc/v1/resources", base))
            .json(&json!({
                "apiVersion": "example.io/v1",
                "kind": "Octopus",
                "metadata": {"name": "inky", "namespace": "sea"}
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(applied.status(), 201);
        let body: serde_json::Value = applied.json().await.unwrap();
        assert!(body["metadata"]["uid"].is_string());
        assert!(body["metadata"]["creationTimestamp"].is_string());

        let listed: Vec<serde_json::Value> = client
            .get(format!("{}/apis/gc/v1/resources/example.io/v1/octopi?namespace=sea", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["metadata"]["name"], "inky");

        let bad = client
            .post(format!("{}/apis/gc/v1/resources", base))
            .json(&json!({"kind": "Pod", "metadata": {"name": "x"}}))
            .send()
            .await
            .unwrap();
        assert_eq!(bad.status(), 400);
        cancel.cancel();
    }
}
