use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::collaborators::Discovery;
use crate::error::{GcError, Result};

/// Group / version / plural resource name identifying a listable resource type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupVersionResource {
    /// Empty for the core group.
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl GroupVersionResource {
    pub fn new(group: &str, version: &str, resource: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            resource: resource.to_string(),
        }
    }
}

impl std::fmt::Display for GroupVersionResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.resource)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.resource)
        }
    }
}

/// Split `apps/v1` into `("apps", "v1")` and `v1` into `("", "v1")`.
pub fn parse_api_version(api_version: &str) -> std::result::Result<(String, String), String> {
    let api_version = api_version.trim();
    if api_version.is_empty() {
        return Err("apiVersion is empty".to_string());
    }
    let parts: Vec<&str> = api_version.split('/').collect();
    match parts.as_slice() {
        [version] => Ok((String::new(), version.to_string())),
        [group, version] if !group.is_empty() && !version.is_empty() => {
            Ok((group.to_string(), version.to_string()))
        }
        _ => Err(format!("malformed apiVersion '{}'", api_version)),
    }
}

/// Naive English pluralization of a kind, used when discovery has no answer.
/// Irregular plurals (`Endpoints`) need discovery to be right.
pub fn pluralize(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        return format!("{}es", lower);
    }
    if let Some(stem) = lower.strip_suffix('y') {
        let before_y = stem.chars().last();
        if before_y.is_some_and(|c| !"aeiou".contains(c)) {
            return format!("{}ies", stem);
        }
    }
    format!("{}s", lower)
}

/// Resolves apiVersion/kind pairs to resource types. Discovery is consulted
/// first; the pluralization heuristic covers the rest. Only results discovery
/// confirmed are cached, so a failed or empty lookup is retried on the next call.
/// Without a discovery source the heuristic result is final and cached.
pub struct GvrResolver {
    discovery: Option<Arc<dyn Discovery>>,
    cache: RwLock<HashMap<(String, String), GroupVersionResource>>,
}

impl GvrResolver {
    pub fn new(discovery: Option<Arc<dyn Discovery>>) -> Self {
        Self {
            discovery,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn resolve(&self, api_version: &str, kind: &str) -> Result<GroupVersionResource> {
        let cache_key = (api_version.to_string(), kind.to_string());
        if let Some(hit) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&cache_key)
        {
            return Ok(hit.clone());
        }

        let fail = |reason: String| GcError::ResolutionFailed {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            reason,
        };

        let (group, version) = parse_api_version(api_version).map_err(fail)?;
        if kind.is_empty() || !kind.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(fail(format!("invalid kind '{}'", kind)));
        }

        let discovered = match &self.discovery {
            Some(discovery) => match discovery.resource_for(&group, &version, kind).await {
                Ok(found) => found,
                Err(e) => {
                    warn!(
                        "Discovery failed for {}/{}, falling back to pluralization: {}",
                        api_version, kind, e
                    );
                    None
                }
            },
            None => None,
        };

        let cacheable = discovered.is_some() || self.discovery.is_none();
        let resource = match discovered {
            Some(resource) => resource,
            None => {
                let plural = pluralize(kind);
                debug!("Resolved {} {} by pluralization → {}", api_version, kind, plural);
                plural
            }
        };

        let gvr = GroupVersionResource {
            group,
            version,
            resource,
        };
        if cacheable {
            self.cache
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(cache_key, gvr.clone());
        }
        Ok(gvr)
    }
}
