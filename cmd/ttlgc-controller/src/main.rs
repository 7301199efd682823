use clap::Parser;
use pkg_api::AppState;
use pkg_api::server::{ServerConfig, start_server};
use pkg_constants::gc::{
    DEFAULT_BATCH_SIZE, DEFAULT_EVALUATION_INTERVAL_SECS, DEFAULT_LISTER_CACHE_TTL_SECS,
    DEFAULT_MAX_CONCURRENT_EVALUATIONS, DEFAULT_MAX_DELETIONS_PER_SECOND,
    DEFAULT_TICK_INTERVAL_SECS,
};
use pkg_constants::network::DEFAULT_API_PORT;
use pkg_constants::paths::{DEFAULT_CONTROLLER_CONFIG, DEFAULT_CONTROLLER_DATA_DIR};
use pkg_gc::collaborators::LeadershipSource;
use pkg_gc::store::{
    ElectionLeadership, StaticLeadership, StoreDeleter, StoreDiscovery, StoreEventRecorder,
    StorePolicySource, StoreResourceLister, StoreStatusUpdater,
};
use pkg_gc::{EngineConfig, EngineDeps, EvaluationScheduler, PolicyEvaluator, SchedulingMode};
use pkg_metrics::MetricsRegistry;
use pkg_state::client::StateStore;
use pkg_state::leader::LeaderElection;
use pkg_types::config::{ControllerConfigFile, load_config_file};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Default)]
#[command(name = "ttlgc-controller", about = "TTL-based garbage collection controller")]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, default_value = DEFAULT_CONTROLLER_CONFIG)]
    config: String,

    /// Port for the HTTP API (health, metrics, policies)
    #[arg(long)]
    port: Option<u16>,

    /// Directory for SlateDB state storage
    #[arg(long)]
    data_dir: Option<String>,

    /// Identity used for the leader lease
    #[arg(long)]
    server_id: Option<String>,

    /// Compete for the leader lease instead of always acting as leader
    #[arg(long)]
    leader_election: Option<bool>,

    /// Worker pool size; 1 evaluates policies one at a time
    #[arg(long)]
    max_concurrent_evaluations: Option<usize>,

    #[arg(long)]
    default_evaluation_interval_seconds: Option<u64>,

    #[arg(long)]
    default_max_deletions_per_second: Option<u32>,

    #[arg(long)]
    default_batch_size: Option<usize>,

    /// How long list snapshots are reused (0 disables)
    #[arg(long)]
    lister_cache_ttl_seconds: Option<u64>,

    #[arg(long)]
    tick_interval_seconds: Option<u64>,

    /// `text` or `json`
    #[arg(long)]
    log_format: Option<String>,
}

/// Effective settings after merging CLI args, config file and defaults.
#[derive(Debug, Clone, PartialEq)]
struct Settings {
    port: u16,
    data_dir: String,
    server_id: String,
    leader_election: bool,
    max_concurrent_evaluations: usize,
    engine_interval_secs: u64,
    max_deletions_per_second: u32,
    batch_size: usize,
    lister_cache_ttl_secs: u64,
    tick_interval_secs: u64,
    log_format: String,
}

impl Settings {
    // CLI args > config file > defaults
    fn merge(cli: Cli, file: ControllerConfigFile) -> Self {
        Self {
            port: cli.port.or(file.port).unwrap_or(DEFAULT_API_PORT),
            data_dir: cli
                .data_dir
                .or(file.data_dir)
                .unwrap_or_else(|| DEFAULT_CONTROLLER_DATA_DIR.to_string()),
            server_id: cli
                .server_id
                .or(file.server_id)
                .unwrap_or_else(|| format!("ttlgc-{}", std::process::id())),
            leader_election: cli.leader_election.or(file.leader_election).unwrap_or(true),
            max_concurrent_evaluations: cli
                .max_concurrent_evaluations
                .or(file.max_concurrent_evaluations)
                .unwrap_or(DEFAULT_MAX_CONCURRENT_EVALUATIONS),
            engine_interval_secs: cli
                .default_evaluation_interval_seconds
                .or(file.default_evaluation_interval_seconds)
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_EVALUATION_INTERVAL_SECS),
            max_deletions_per_second: cli
                .default_max_deletions_per_second
                .or(file.default_max_deletions_per_second)
                .filter(|r| *r > 0)
                .unwrap_or(DEFAULT_MAX_DELETIONS_PER_SECOND),
            batch_size: cli
                .default_batch_size
                .or(file.default_batch_size)
                .filter(|b| *b > 0)
                .unwrap_or(DEFAULT_BATCH_SIZE),
            lister_cache_ttl_secs: cli
                .lister_cache_ttl_seconds
                .or(file.lister_cache_ttl_seconds)
                .unwrap_or(DEFAULT_LISTER_CACHE_TTL_SECS),
            tick_interval_secs: cli
                .tick_interval_seconds
                .or(file.tick_interval_seconds)
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_TICK_INTERVAL_SECS),
            log_format: cli
                .log_format
                .or(file.log_format)
                .unwrap_or_else(|| "text".to_string()),
        }
    }

    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            default_max_deletions_per_second: self.max_deletions_per_second,
            default_batch_size: self.batch_size,
            default_evaluation_interval: Duration::from_secs(self.engine_interval_secs),
            lister_cache_ttl: Duration::from_secs(self.lister_cache_ttl_secs),
        }
    }
}

fn init_tracing(format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config file (returns defaults if file not found)
    let config_path = cli.config.clone();
    let file_cfg: ControllerConfigFile = load_config_file(&config_path)?;
    let settings = Settings::merge(cli, file_cfg);

    init_tracing(&settings.log_format);
    info!("Config file: {}", config_path);
    info!("Starting ttlgc-controller");
    info!("  Port:             {}", settings.port);
    info!("  Data dir:         {}", settings.data_dir);
    info!("  Server id:        {}", settings.server_id);
    info!("  Leader election:  {}", settings.leader_election);
    info!("  Max concurrent:   {}", settings.max_concurrent_evaluations);

    let store = StateStore::new(&settings.data_dir).await?;
    let discovery = StoreDiscovery::new(store.clone());
    let seeded = discovery.seed_builtins().await?;
    info!("Seeded {} built-in API resources", seeded);

    let cancel = CancellationToken::new();
    let metrics = Arc::new(MetricsRegistry::with_gc_metrics());

    let evaluator = Arc::new(PolicyEvaluator::new(
        settings.engine_config(),
        EngineDeps {
            lister: Arc::new(StoreResourceLister::new(store.clone())),
            deleter: Arc::new(StoreDeleter::new(store.clone())),
            status_updater: Arc::new(StoreStatusUpdater::new(store.clone())),
            events: Arc::new(StoreEventRecorder::new(store.clone())),
            discovery: Some(Arc::new(discovery)),
            metrics: metrics.clone(),
        },
    ));

    let policies = StorePolicySource::new(store.clone());
    let watcher_handle = policies.start(cancel.clone());

    let mut handles = vec![watcher_handle];
    let leadership: Arc<dyn LeadershipSource> = if settings.leader_election {
        let election = LeaderElection::new(store.clone(), settings.server_id.clone());
        let (handle, rx) = election.start(cancel.clone());
        handles.push(handle);
        Arc::new(ElectionLeadership::new(rx))
    } else {
        info!("Leader election disabled, acting as leader");
        Arc::new(StaticLeadership::new(true))
    };

    let scheduler = Arc::new(
        EvaluationScheduler::new(
            evaluator,
            Arc::new(policies),
            leadership,
            metrics.clone(),
            SchedulingMode::from_max_concurrent(settings.max_concurrent_evaluations),
        )
        .with_tick(Duration::from_secs(settings.tick_interval_secs)),
    );
    handles.push(scheduler.start(cancel.clone()));

    let ready = CancellationToken::new();
    let state = AppState::new(store.clone(), metrics, ready.clone());
    let server_config = ServerConfig {
        addr: SocketAddr::from(([0, 0, 0, 0], settings.port)),
    };
    let server_cancel = cancel.clone();
    let server_handle =
        tokio::spawn(async move { start_server(server_config, state, server_cancel).await });
    ready.cancel();

    // Block until Ctrl-C
    info!("Controller is running. Press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down controller");
    cancel.cancel();

    for handle in handles {
        if let Err(e) = handle.await {
            warn!("Background task ended abnormally: {}", e);
        }
    }
    match server_handle.await {
        Ok(Err(e)) => warn!("API server error: {}", e),
        Err(e) => warn!("API server task ended abnormally: {}", e),
        Ok(Ok(())) => {}
    }

    store.close().await?;
    Ok(())
}
