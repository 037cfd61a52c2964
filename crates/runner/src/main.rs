use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clipcast_core::{
    load_config, validate_config, Config, DriveClient, GraphApiClient, HttpProbe,
    PublicationPipeline, PublishPlatform, ReachabilityProbe, RemoteCollection, RunOutcome,
    SanitizedConfig,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Config file used when `CLIPCAST_CONFIG` is not set.
const DEFAULT_CONFIG_PATH: &str = "clipcast.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn from_env_value(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging(LogFormat::from_env_value(
        std::env::var("CLIPCAST_LOG_FORMAT").ok().as_deref(),
    ));

    let config_path = std::env::var("CLIPCAST_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    info!(version = VERSION, "Loading configuration from {:?}", config_path);
    let config = load(&config_path)?;

    let fingerprint = config_fingerprint(&config);
    info!(
        source = %config.source.collection_id,
        mode = ?config.stager.mode,
        completion = ?config.source.completion,
        fingerprint = %fingerprint,
        "Configuration loaded successfully"
    );
    match serde_json::to_string(&SanitizedConfig::from(&config)) {
        Ok(json) => debug!(config = %json, "Effective configuration"),
        Err(e) => warn!("Failed to serialise configuration: {}", e),
    }

    let collection: Arc<dyn RemoteCollection> = Arc::new(
        DriveClient::new(config.source.drive.clone()).context("Failed to create Drive client")?,
    );
    let probe: Arc<dyn ReachabilityProbe> = Arc::new(
        HttpProbe::new(Duration::from_secs(config.stager.timeout_secs as u64))
            .context("Failed to create reachability probe")?,
    );
    let platform: Arc<dyn PublishPlatform> = Arc::new(
        GraphApiClient::new(config.publisher.clone())
            .context("Failed to create Graph API client")?,
    );

    let pipeline = PublicationPipeline::from_config(&config, collection, probe, platform)
        .context("Failed to build publication pipeline")?
        .with_fingerprint(fingerprint);

    match pipeline.run_once().await {
        Ok(RunOutcome::NothingToPublish) => {
            info!("No eligible item in the source collection, nothing to do");
            Ok(())
        }
        Ok(RunOutcome::Published(report)) => {
            info!(
                item = %report.item_name,
                published_id = %report.published_id,
                duration_ms = report.duration_ms,
                "Published"
            );
            Ok(())
        }
        Err(failure) => {
            if failure.is_transient() {
                warn!("Failure looks transient; the next scheduled run should retry");
            }
            if failure.published_but_not_consumed() {
                warn!(
                    item_id = ?failure.item.as_ref().map(|i| i.id.as_str()),
                    "Published item was not marked consumed and will be selected again"
                );
            }
            Err(failure.into())
        }
    }
}

fn init_logging(format: LogFormat) {
    let registry = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
    );

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Load and validate the configuration file.
fn load(path: &Path) -> Result<Config> {
    let config =
        load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?;
    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

/// Short hash of the effective configuration, secrets excluded.
fn config_fingerprint(config: &Config) -> String {
    let json = serde_json::to_string(&SanitizedConfig::from(config)).unwrap_or_default();
    let hash = format!("{:x}", Sha256::digest(json.as_bytes()));
    hash[..16].to_string()
}
