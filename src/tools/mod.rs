//! Tool abstractions for agent capabilities.
//!
//! A tool wraps an external capability as a callable the agent runtime may
//! invoke mid-reasoning. Execution failures are recoverable from the
//! runtime's point of view: the error text is fed back to the model, which
//! may retry, rephrase, or answer without the tool.

mod search;

pub use search::TavilySearch;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::ToolDefinition;

/// Trait for tools the agent can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name exposed to the LLM.
    fn name(&self) -> &str;

    /// Description exposed to the LLM.
    fn description(&self) -> &str;

    /// JSON schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value) -> anyhow::Result<String>;
}

/// Render a tool as a function definition for a chat completion request.
pub fn to_definition(tool: &dyn Tool) -> ToolDefinition {
    ToolDefinition::function(tool.name(), tool.description(), tool.parameters_schema())
}
