use serde::{Deserialize, Serialize};

/// Controller configuration file (YAML).
///
/// Example `config.yaml`:
/// ```yaml
/// port: 8080
/// data-dir: /var/lib/ttlgc/data
/// server-id: ttlgc-0
/// leader-election: true
/// max-concurrent-evaluations: 5
/// default-evaluation-interval-seconds: 300
/// default-max-deletions-per-second: 10
/// default-batch-size: 50
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerConfigFile {
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default, alias = "data-dir")]
    pub data_dir: Option<String>,
    #[serde(default, alias = "server-id")]
    pub server_id: Option<String>,
    #[serde(default, alias = "leader-election")]
    pub leader_election: Option<bool>,
    #[serde(default, alias = "max-concurrent-evaluations")]
    pub max_concurrent_evaluations: Option<usize>,
    #[serde(default, alias = "default-evaluation-interval-seconds")]
    pub default_evaluation_interval_seconds: Option<u64>,
    #[serde(default, alias = "default-max-deletions-per-second")]
    pub default_max_deletions_per_second: Option<u32>,
    #[serde(default, alias = "default-batch-size")]
    pub default_batch_size: Option<usize>,
    #[serde(default, alias = "lister-cache-ttl-seconds")]
    pub lister_cache_ttl_seconds: Option<u64>,
    #[serde(default, alias = "tick-interval-seconds")]
    pub tick_interval_seconds: Option<u64>,
    #[serde(default, alias = "log-format")]
    pub log_format: Option<String>,
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config: T = serde_yaml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let cfg: ControllerConfigFile =
            load_config_file("/nonexistent/ttlgc/config.yaml").unwrap();
        assert!(cfg.port.is_none());
        assert!(cfg.leader_election.is_none());
    }

    #[test]
    fn kebab_case_keys_are_accepted() {
        let cfg: ControllerConfigFile = serde_yaml::from_str(
            "port: 9090\nmax-concurrent-evaluations: 3\ndefault-batch-size: 25\nleader-election: false\n",
        )
        .unwrap();
        assert_eq!(cfg.port, Some(9090));
        assert_eq!(cfg.max_concurrent_evaluations, Some(3));
        assert_eq!(cfg.default_batch_size, Some(25));
        assert_eq!(cfg.leader_election, Some(false));
    }
}
