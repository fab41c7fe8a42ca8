use tracing_subscriber::EnvFilter;

use rollout_monitor::config::MonitorConfig;
use rollout_monitor::monitor;
use rollout_monitor::poll_loop::TokioSleeper;
use rollout_monitor::report::VariableExporter;
use rollout_monitor::status_client::{GraphqlStatusClient, TransportRetry};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rollout_monitor=info")),
        )
        .init();

    let config = MonitorConfig::from_env(|key| std::env::var(key).ok())?;
    tracing::debug!("settings: {:?}", config.settings);

    let client = GraphqlStatusClient::new(&config.settings.backend.url, &config.api_key)?
        .with_retry(TransportRetry {
            retries: config.settings.backend.retries,
            ..TransportRetry::default()
        });
    let exporter = VariableExporter::new(config.ci.as_ref(), &config.settings.export);

    let outcome = monitor::run(&config, &client, &TokioSleeper, &exporter).await?;
    tracing::info!("rollout {} finished: {}", config.target.rollout, outcome.phase);
    Ok(())
}
