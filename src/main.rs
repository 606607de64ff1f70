//! docsbot - HTTP server entry point.

use docsbot::{api, Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real deployments use the process environment.
    let _ = dotenvy::dotenv();

    // Telemetry is initialized exactly once, before any request is accepted.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docsbot=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(
        "Loaded configuration: docs_model={}, browser_model={}",
        config.docs_model, config.browser_model
    );

    info!("Starting server on {}", config.bind_addr());
    api::serve(config).await?;

    Ok(())
}
