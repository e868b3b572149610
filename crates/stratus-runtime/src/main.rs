//! Stratus — multi-cloud price catalog.
//! Entry point: config, sources, and the ingestion loop.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stratus_common::config::StratusConfig;
use stratus_common::http::PacedClient;
use stratus_db::{FileStatus, MemoryStore, PriceStore, StatusSink};
use stratus_ingestion::sources::{AwsSource, AzureSource, GcpSource};
use stratus_ingestion::{run_ingestion, PricingSource};

const CONFIG_PATH: &str = "stratus.toml";

fn build_sources(config: &StratusConfig) -> anyhow::Result<Vec<Arc<dyn PricingSource>>> {
    // One paced client per provider: the rate-limit clock is per endpoint.
    Ok(vec![
        Arc::new(AwsSource::new(
            PacedClient::new(&config.http)?,
            config.aws.clone(),
        )),
        Arc::new(AzureSource::new(
            PacedClient::new(&config.http)?,
            config.azure.clone(),
        )),
        Arc::new(GcpSource::new(
            PacedClient::new(&config.http)?,
            config.gcp.clone(),
        )),
    ])
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("stratus=debug,info")),
        )
        .init();

    info!("Stratus starting up");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = StratusConfig::load(Path::new(CONFIG_PATH))?;
    info!(
        refresh_interval_secs = config.runtime.refresh_interval_secs,
        "Configuration loaded"
    );

    let store: Arc<dyn PriceStore> = Arc::new(MemoryStore::new());
    let status: Arc<dyn StatusSink> = Arc::new(FileStatus::new(&config.runtime.status_path));

    loop {
        let report = run_ingestion(build_sources(&config)?, store.clone(), status.clone()).await;

        for outcome in &report.outcomes {
            match &outcome.error {
                None => info!(
                    provider = outcome.provider.as_str(),
                    count = outcome.count,
                    duration_ms = outcome.duration_ms,
                    "provider ingested"
                ),
                Some(error) => warn!(
                    provider = outcome.provider.as_str(),
                    count = outcome.count,
                    %error,
                    "provider finished with errors"
                ),
            }
        }
        info!(
            run_id = %report.run_id,
            total = report.total_upserted,
            duration_ms = report.duration_ms,
            "catalog refresh complete"
        );

        if config.runtime.refresh_interval_secs == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_secs(config.runtime.refresh_interval_secs)).await;
    }

    Ok(())
}
