//! Query services: thin façades over the agent runtime.
//!
//! Each service owns its agent configuration and maps runtime failures onto
//! a small closed set of caller-facing categories. No retries happen here;
//! every `ask` is at-most-once.

use std::sync::Arc;

use thiserror::Error;

use crate::agent::{AgentError, AgentRuntime, AgentSpec};
use crate::config::Config;
use crate::llm::LlmClient;
use crate::mcp::{McpError, McpServer, McpTool};
use crate::schema::{BotResponse, BrowsingResponse};
use crate::tools::{TavilySearch, Tool};

const DOCS_SYSTEM_PROMPT: &str = "\
You're an all-knowing expert in the PydanticAI agent framework.
You will receive questions from users of PydanticAI about how to use the framework effectively.

Where necessary, use the search tool to look up PydanticAI information. The documentation can be found here: https://ai.pydantic.dev/
The LLM txt can be found here: https://ai.pydantic.dev/llms.txt

For any given answer, where possible provide references to the documentation or other relevant resources.
Give a confidence percentage for your answer, from 0 to 100.";

const BROWSER_SYSTEM_PROMPT: &str = "\
You're a helpful AI assistant with access to browser automation capabilities through Playwright.
You can navigate to websites, interact with web pages, take screenshots, and extract information.

When working with web pages:
- Be thorough in your web navigation and information extraction
- Take screenshots when helpful for verification
- Extract relevant information clearly and accurately
- Explain what you're doing with the browser
- Be mindful of website terms of service and respectful browsing practices

Give a confidence percentage for your answer, from 0 to 100.
List any websites you accessed in the websites_accessed field.";

/// Caller-facing failure categories for agent queries.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The agent produced output that failed schema validation.
    #[error("malformed answer: {0}")]
    MalformedAnswer(String),
    /// The model provider call failed.
    #[error("model call failed: {0}")]
    ModelFailure(String),
    /// The agent hit its reasoning-round bound.
    #[error("reasoning exhausted: {0}")]
    ReasoningExhausted(String),
    /// A tool or its backing service failed unrecoverably.
    #[error("tool failure: {0}")]
    ToolFailure(String),
    /// The browser-automation subprocess could not be started or spoken to.
    #[error("browser automation unavailable: {0}")]
    BrowserUnavailable(String),
}

impl From<AgentError> for QueryError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Validation(e) => QueryError::MalformedAnswer(e.to_string()),
            AgentError::Model(e) => QueryError::ModelFailure(e.to_string()),
            AgentError::ReasoningExhausted { .. } => {
                QueryError::ReasoningExhausted(err.to_string())
            }
            AgentError::ToolsFailed { .. } => QueryError::ToolFailure(err.to_string()),
            AgentError::EmptyCompletion => QueryError::ModelFailure(err.to_string()),
        }
    }
}

/// Documentation-answering agent backed by web search.
///
/// The search tool and LLM client are shared across calls; each call gets a
/// fresh conversation.
pub struct DocsAgentService {
    runtime: AgentRuntime,
}

impl DocsAgentService {
    pub fn new(config: &Config, llm: Arc<dyn LlmClient>) -> Self {
        let spec = AgentSpec {
            model: config.docs_model.clone(),
            system_prompt: DOCS_SYSTEM_PROMPT.to_string(),
            max_tool_rounds: config.max_tool_rounds,
        };
        let tools: Vec<Arc<dyn Tool>> =
            vec![Arc::new(TavilySearch::new(config.tavily_api_key.clone()))];
        Self {
            runtime: AgentRuntime::new(spec, llm, tools),
        }
    }

    /// Ask the docs agent a question.
    pub async fn ask(&self, question: &str) -> Result<BotResponse, QueryError> {
        let run = self.runtime.run::<BotResponse>(question).await?;
        tracing::info!(
            tool_calls = run.invocations.len(),
            confidence = run.output.confidence_percentage,
            "docs agent answered"
        );
        Ok(run.output)
    }
}

/// Browser-automation agent backed by an MCP subprocess.
///
/// The subprocess lifecycle is scoped to each call: started on entry, shut
/// down on exit, including when the query itself fails.
pub struct BrowserAgentService {
    config: Config,
    llm: Arc<dyn LlmClient>,
}

impl BrowserAgentService {
    pub fn new(config: Config, llm: Arc<dyn LlmClient>) -> Self {
        Self { config, llm }
    }

    /// Ask the browser agent a question.
    pub async fn ask(&self, question: &str) -> Result<BrowsingResponse, QueryError> {
        let server = Arc::new(
            McpServer::spawn(&self.config.mcp_command, &self.config.mcp_args)
                .await
                .map_err(browser_error)?,
        );

        let result = self.run_with_server(&server, question).await;

        // Guaranteed teardown regardless of the query outcome. If callers
        // still hold clones of the Arc, kill_on_drop reaps the child later.
        match Arc::try_unwrap(server) {
            Ok(server) => {
                if let Err(e) = server.shutdown().await {
                    tracing::warn!("MCP server shutdown failed: {}", e);
                }
            }
            Err(_) => tracing::warn!("MCP server handle still shared at teardown"),
        }

        result
    }

    async fn run_with_server(
        &self,
        server: &Arc<McpServer>,
        question: &str,
    ) -> Result<BrowsingResponse, QueryError> {
        let tools: Vec<Arc<dyn Tool>> = McpTool::discover(server)
            .await
            .map_err(browser_error)?
            .into_iter()
            .map(|t| Arc::new(t) as Arc<dyn Tool>)
            .collect();

        tracing::info!(tools = tools.len(), "browser agent tools discovered");

        let spec = AgentSpec {
            model: self.config.browser_model.clone(),
            system_prompt: BROWSER_SYSTEM_PROMPT.to_string(),
            max_tool_rounds: self.config.max_tool_rounds,
        };
        let runtime = AgentRuntime::new(spec, Arc::clone(&self.llm), tools);

        let run = runtime.run::<BrowsingResponse>(question).await?;
        tracing::info!(
            tool_calls = run.invocations.len(),
            websites = run.output.websites_accessed.len(),
            "browser agent answered"
        );
        Ok(run.output)
    }
}

fn browser_error(err: McpError) -> QueryError {
    QueryError::BrowserUnavailable(err.to_string())
}
