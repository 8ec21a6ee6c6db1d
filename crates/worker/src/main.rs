use anyhow::Context;
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sdrelay_worker::config::WorkerConfig;
use sdrelay_worker::dispatcher::Dispatcher;
use sdrelay_worker::{host, panic, DEFAULT_LOG_FILTER};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // stdout carries result documents, so logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    panic::install_hook();

    let config = WorkerConfig::from_env().map_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        e
    })?;

    let client = reqwest::Client::builder()
        .build()
        .context("building HTTP client")?;
    let dispatcher =
        Dispatcher::from_config(&config, client).context("loading schemas and allow-list")?;

    tracing::info!(
        base_uri = %config.a1111_base_uri,
        endpoints = dispatcher.catalog().endpoints().len(),
        "Worker starting"
    );

    let handled = host::serve(
        &dispatcher,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
    .context("job stream failed")?;

    tracing::info!(handled, "Input closed, worker exiting");
    Ok(())
}
