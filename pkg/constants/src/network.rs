//! Network-related constants.

/// Default port for the controller HTTP API (health, metrics, policies).
pub const DEFAULT_API_PORT: u16 = 8080;

/// Default API server address used by `ttlgcctl`.
pub const DEFAULT_API_ADDR: &str = "http://127.0.0.1:8080";
