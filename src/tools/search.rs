//! Web search tool backed by the Tavily API.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::Tool;

const TAVILY_API_URL: &str = "https://api.tavily.com/search";

/// Search the web via Tavily.
///
/// The API key is provisioned at startup (missing key is a startup error,
/// handled in config); per-call HTTP or quota failures surface as tool
/// errors the agent can recover from.
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: String,
}

impl TavilySearch {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl Tool for TavilySearch {
    fn name(&self) -> &str {
        "tavily_search"
    }

    fn description(&self) -> &str {
        "Search the web for information. Returns ranked results with titles, snippets, and URLs. Use for finding documentation, examples, or current information."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default: 5)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let query = args["query"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'query' argument"))?;
        let max_results = args["max_results"].as_u64().unwrap_or(5);

        let request = json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": max_results,
        });

        let response = self.client.post(TAVILY_API_URL).json(&request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Tavily HTTP {}: {}", status, body));
        }

        let parsed: TavilyResponse = response.json().await?;
        Ok(render_results(query, &parsed.results))
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

fn render_results(query: &str, results: &[TavilyResult]) -> String {
    if results.is_empty() {
        return format!("No results found for: {}", query);
    }

    results
        .iter()
        .map(|r| format!("**{}**\n{}\nURL: {}", r.title, r.content, r.url))
        .collect::<Vec<_>>()
        .join("\n\n")
}
