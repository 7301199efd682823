//! Filesystem path constants.

/// Default config file path for the controller.
pub const DEFAULT_CONTROLLER_CONFIG: &str = "/etc/ttlgc/config.yaml";

/// Default data directory for the controller state store.
pub const DEFAULT_CONTROLLER_DATA_DIR: &str = "/tmp/ttlgc-data";
