//! Runs the docs-agent evaluation dataset against the live configuration.
//!
//! Requires the same environment as the server (TAVILY_API_KEY,
//! OPENROUTER_API_KEY). Prints the aggregated report to stdout.

use std::sync::Arc;

use docsbot::config::Config;
use docsbot::evals::docs_agent_dataset;
use docsbot::llm::{LlmClient, OpenRouterClient};
use docsbot::service::DocsAgentService;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const JUDGE_MODEL: &str = "openai/gpt-4o-mini";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docsbot=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let llm: Arc<dyn LlmClient> =
        Arc::new(OpenRouterClient::new(config.openrouter_api_key.clone()));
    let service = DocsAgentService::new(&config, Arc::clone(&llm));

    let dataset = docs_agent_dataset(Arc::clone(&llm), JUDGE_MODEL);

    tracing::info!("Running docs agent evaluation ({} cases)", dataset.cases.len());
    let report = dataset.evaluate(|question| service.ask(question)).await;

    print!("{}", report.render());

    Ok(())
}
