use async_trait::async_trait;
use chrono::Utc;
use pkg_constants::gc::{ANNOTATION_DELETED_BY, ANNOTATION_PROPAGATION_POLICY};
use pkg_state::client::StateStore;
use pkg_types::resource::Resource;
use tracing::{debug, info};

use crate::collaborators::{DeleteOptions, Deleter};
use crate::gvr::GroupVersionResource;

use super::resource_key;

/// Deletes stored resources.
///
/// An object with a positive grace period or with finalizers other than the
/// policy's own is marked terminating (`metadata.deletionTimestamp`) instead of
/// being removed outright. A terminating object whose grace period has run out
/// and that has no finalizers left is removed.
#[derive(Clone)]
pub struct StoreDeleter {
    store: StateStore,
}

impl StoreDeleter {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Deleter for StoreDeleter {
    async fn delete(
        &self,
        resource: &Resource,
        gvr: &GroupVersionResource,
        options: &DeleteOptions,
    ) -> anyhow::Result<()> {
        let key = resource_key(gvr, resource.namespace(), resource.name());
        if options.dry_run {
            debug!("[dry-run] skipping delete of {}", key);
            return Ok(());
        }

        let Some(raw) = self.store.get(&key).await? else {
            debug!("{} already gone", key);
            return Ok(());
        };
        let mut current = Resource::from_value(serde_json::from_slice(&raw)?)?;

        // A different uid means the object was recreated since it was listed.
        if let (Some(listed), Some(stored)) = (resource.uid(), current.uid())
            && listed != stored
        {
            debug!("{} was replaced (uid {} → {}), leaving it", key, listed, stored);
            return Ok(());
        }

        if let Some(finalizer) = &options.finalizer {
            current.remove_finalizer(finalizer);
        }

        let grace = options.grace_period_seconds.unwrap_or(0);
        let lapsed = current.deletion_timestamp().is_some_and(|at| at <= Utc::now());
        if !current.finalizers().is_empty() || (grace > 0 && !lapsed) {
            if current.deletion_timestamp().is_none() {
                let at = Utc::now() + chrono::Duration::seconds(grace.max(0));
                current.set_deletion_timestamp(at);
            }
            current.set_annotation(
                ANNOTATION_PROPAGATION_POLICY,
                &options.propagation_policy.to_string(),
            );
            current.set_annotation(ANNOTATION_DELETED_BY, &options.requested_by);
            self.store.put(&key, &serde_json::to_vec(&current)?).await?;
            info!("Marked {} for deletion (grace={}s)", key, grace);
        } else {
            self.store.delete(&key).await?;
            info!("Deleted {}", key);
        }
        Ok(())
    }
}
