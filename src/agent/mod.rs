//! Agent runtime: the orchestration loop between a language model, a set of
//! tools, and a structured-output contract.
//!
//! Each query walks an explicit state machine:
//!
//! ```text
//! Idle -> Reasoning -> (ToolCall <-> Reasoning)* -> Validating -> Done | Failed
//! ```
//!
//! The number of reasoning rounds is bounded; exceeding the bound fails the
//! query instead of looping forever. Tool failures are recoverable: the
//! error text goes back into the conversation and the model decides whether
//! to retry, rephrase, or answer without the tool. Nothing is retried by the
//! runtime itself.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::llm::{ChatMessage, LlmClient, LlmError, ResponseFormat, Role, ToolCall, ToolDefinition};
use crate::schema::{SchemaError, StructuredOutput};
use crate::tools::{to_definition, Tool};

/// Immutable configuration for an agent runtime.
///
/// Built once per runtime instantiation and never mutated.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    /// Model identifier passed to the LLM provider.
    pub model: String,
    /// System prompt prepended to every conversation.
    pub system_prompt: String,
    /// Upper bound on reasoning/tool-call rounds per query.
    pub max_tool_rounds: u32,
}

/// Why an agent query failed.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model call itself failed (network, auth, rate limit, ...).
    #[error("model call failed: {0}")]
    Model(#[from] LlmError),
    /// The final draft did not satisfy the output schema.
    #[error("malformed answer: {0}")]
    Validation(#[from] SchemaError),
    /// The model produced neither content nor tool calls.
    #[error("model returned an empty completion")]
    EmptyCompletion,
    /// The round bound was hit before the model produced a final answer.
    #[error("reasoning exhausted after {rounds} tool-call rounds")]
    ReasoningExhausted { rounds: u32 },
    /// The round bound was hit and every tool call along the way failed.
    #[error("all {attempts} tool calls failed, no answer after {rounds} rounds")]
    ToolsFailed { rounds: u32, attempts: usize },
}

/// Transient record of one tool call made during reasoning.
///
/// Not persisted; surfaced on the run result for telemetry.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub tool: String,
    pub arguments: Value,
    pub result: String,
    pub is_error: bool,
}

/// A completed agent run: the validated output plus its tool-call trace.
#[derive(Debug)]
pub struct AgentRun<T> {
    pub output: T,
    pub invocations: Vec<ToolInvocation>,
}

/// The agent runtime for one output shape.
pub struct AgentRuntime {
    spec: AgentSpec,
    llm: Arc<dyn LlmClient>,
    tools: Vec<Arc<dyn Tool>>,
    tool_map: HashMap<String, Arc<dyn Tool>>,
}

impl AgentRuntime {
    pub fn new(spec: AgentSpec, llm: Arc<dyn LlmClient>, tools: Vec<Arc<dyn Tool>>) -> Self {
        let tool_map = tools
            .iter()
            .map(|t| (t.name().to_string(), Arc::clone(t)))
            .collect();
        Self {
            spec,
            llm,
            tools,
            tool_map,
        }
    }

    /// Run one query to completion.
    ///
    /// Responses are not reproducible across identical questions; the
    /// underlying model is stochastic.
    pub async fn run<T: StructuredOutput>(&self, question: &str) -> Result<AgentRun<T>, AgentError> {
        let response_format = ResponseFormat {
            name: T::NAME.to_string(),
            schema: T::json_schema(),
        };

        let mut messages = vec![
            ChatMessage::new(Role::System, self.spec.system_prompt.clone()),
            ChatMessage::new(Role::User, question),
        ];

        let definitions: Vec<ToolDefinition> =
            self.tools.iter().map(|t| to_definition(t.as_ref())).collect();
        let definitions = if definitions.is_empty() {
            None
        } else {
            Some(definitions)
        };

        let mut invocations = Vec::new();

        for round in 0..self.spec.max_tool_rounds {
            let response = self
                .llm
                .chat_completion(
                    &self.spec.model,
                    &messages,
                    definitions.as_deref(),
                    Some(&response_format),
                )
                .await?;

            let tool_calls = response.tool_calls.clone().unwrap_or_default();
            if !tool_calls.is_empty() {
                tracing::debug!(round, calls = tool_calls.len(), "model requested tool calls");
                messages.push(ChatMessage::assistant_tool_calls(
                    response.content.clone(),
                    tool_calls.clone(),
                ));

                for call in &tool_calls {
                    let invocation = self.execute_tool_call(call).await;
                    messages.push(ChatMessage::tool_result(
                        call.id.clone(),
                        invocation.result.clone(),
                    ));
                    invocations.push(invocation);
                }
                continue;
            }

            // Validating: the draft either satisfies the schema or the whole
            // query fails; a partial response is never returned.
            let draft = response.content.ok_or(AgentError::EmptyCompletion)?;
            let output = T::from_draft(&draft)?;
            return Ok(AgentRun {
                output,
                invocations,
            });
        }

        // Distinguish "the model kept asking for tools" from "every tool it
        // asked for was broken" so callers see a tool-error category.
        if !invocations.is_empty() && invocations.iter().all(|i| i.is_error) {
            return Err(AgentError::ToolsFailed {
                rounds: self.spec.max_tool_rounds,
                attempts: invocations.len(),
            });
        }

        Err(AgentError::ReasoningExhausted {
            rounds: self.spec.max_tool_rounds,
        })
    }

    async fn execute_tool_call(&self, call: &ToolCall) -> ToolInvocation {
        let name = &call.function.name;

        let arguments: Value = if call.function.arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            match serde_json::from_str(&call.function.arguments) {
                Ok(v) => v,
                Err(e) => {
                    return ToolInvocation {
                        tool: name.clone(),
                        arguments: Value::Null,
                        result: format!("Invalid tool arguments: {}", e),
                        is_error: true,
                    }
                }
            }
        };

        let Some(tool) = self.tool_map.get(name) else {
            return ToolInvocation {
                tool: name.clone(),
                arguments,
                result: format!("Unknown tool: {}", name),
                is_error: true,
            };
        };

        tracing::info!(tool = %name, "executing tool call");
        match tool.execute(arguments.clone()).await {
            Ok(result) => ToolInvocation {
                tool: name.clone(),
                arguments,
                result,
                is_error: false,
            },
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "tool call failed");
                ToolInvocation {
                    tool: name.clone(),
                    arguments,
                    result: format!("Tool error: {}", e),
                    is_error: true,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests;
