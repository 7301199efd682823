pub mod handlers;
pub mod request_id;
pub mod server;

use std::sync::Arc;

use pkg_gc::gvr::GvrResolver;
use pkg_gc::store::{StoreDiscovery, StoreResourceLister};
use pkg_metrics::MetricsRegistry;
use pkg_state::client::StateStore;
use tokio_util::sync::CancellationToken;

/// Shared application state injected into all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: StateStore,
    pub metrics: Arc<MetricsRegistry>,
    pub discovery: StoreDiscovery,
    pub lister: StoreResourceLister,
    pub resolver: Arc<GvrResolver>,
    /// Cancelled once the engine is up; `/readyz` reports ready from then on.
    pub ready: CancellationToken,
}

impl AppState {
    pub fn new(store: StateStore, metrics: Arc<MetricsRegistry>, ready: CancellationToken) -> Self {
        let discovery = StoreDiscovery::new(store.clone());
        let resolver = Arc::new(GvrResolver::new(Some(Arc::new(discovery.clone()))));
        Self {
            lister: StoreResourceLister::new(store.clone()),
            store,
            metrics,
            discovery,
            resolver,
            ready,
        }
    }
}
