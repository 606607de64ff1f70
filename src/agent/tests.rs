use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::*;
use crate::llm::{ChatResponse, FunctionCall};
use crate::schema::BotResponse;

#[derive(Default)]
struct MockLlm {
    responses: Mutex<VecDeque<Result<ChatResponse, LlmError>>>,
}

impl MockLlm {
    fn with_responses(responses: Vec<Result<ChatResponse, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from(responses)),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn chat_completion(
        &self,
        _model: &str,
        _messages: &[ChatMessage],
        _tools: Option<&[ToolDefinition]>,
        _response_format: Option<&ResponseFormat>,
    ) -> Result<ChatResponse, LlmError> {
        let mut guard = self.responses.lock().expect("lock poisoned");
        guard
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::parse("no more mock responses")))
    }
}

fn text_response(content: &str) -> ChatResponse {
    ChatResponse {
        content: Some(content.to_string()),
        tool_calls: None,
        finish_reason: Some("stop".to_string()),
        usage: None,
        model: None,
    }
}

fn tool_call_response(id: &str, name: &str, arguments: Value) -> ChatResponse {
    ChatResponse {
        content: None,
        tool_calls: Some(vec![ToolCall {
            id: id.to_string(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }]),
        finish_reason: Some("tool_calls".to_string()),
        usage: None,
        model: None,
    }
}

struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }
    fn description(&self) -> &str {
        "Echo the input back"
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {"text": {"type": "string"}}})
    }
    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        Ok(args["text"].as_str().unwrap_or_default().to_string())
    }
}

struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "search"
    }
    fn description(&self) -> &str {
        "Always fails"
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }
    async fn execute(&self, _args: Value) -> anyhow::Result<String> {
        Err(anyhow::anyhow!("quota exceeded"))
    }
}

fn spec(max_tool_rounds: u32) -> AgentSpec {
    AgentSpec {
        model: "test/model".to_string(),
        system_prompt: "You are a test agent.".to_string(),
        max_tool_rounds,
    }
}

const VALID_DRAFT: &str = r#"{
    "answer": "Use the builder.",
    "reasoning": "Checked the docs.",
    "reference": null,
    "confidence_percentage": 85
}"#;

#[tokio::test]
async fn query_without_tool_calls_reaches_done() {
    let llm = Arc::new(MockLlm::with_responses(vec![Ok(text_response(
        VALID_DRAFT,
    ))]));
    let runtime = AgentRuntime::new(spec(8), llm, vec![]);

    let run = runtime.run::<BotResponse>("how do I build an agent?").await.unwrap();
    assert_eq!(run.output.confidence_percentage, 85);
    assert!(run.invocations.is_empty());
}

#[tokio::test]
async fn tool_call_then_final_answer() {
    let llm = Arc::new(MockLlm::with_responses(vec![
        Ok(tool_call_response("call_1", "echo", json!({"text": "hello"}))),
        Ok(text_response(VALID_DRAFT)),
    ]));
    let runtime = AgentRuntime::new(spec(8), llm, vec![Arc::new(EchoTool)]);

    let run = runtime.run::<BotResponse>("say hello").await.unwrap();
    assert_eq!(run.invocations.len(), 1);
    assert_eq!(run.invocations[0].tool, "echo");
    assert_eq!(run.invocations[0].result, "hello");
    assert!(!run.invocations[0].is_error);
}

#[tokio::test]
async fn failing_tool_is_recoverable() {
    // Every tool call fails; the model still answers from its own knowledge.
    let llm = Arc::new(MockLlm::with_responses(vec![
        Ok(tool_call_response("call_1", "search", json!({}))),
        Ok(tool_call_response("call_2", "search", json!({}))),
        Ok(text_response(VALID_DRAFT)),
    ]));
    let runtime = AgentRuntime::new(spec(8), llm, vec![Arc::new(FailingTool)]);

    let run = runtime.run::<BotResponse>("anything").await.unwrap();
    assert_eq!(run.invocations.len(), 2);
    assert!(run.invocations.iter().all(|i| i.is_error));
    assert!(run.invocations[0].result.contains("quota exceeded"));
    assert_eq!(run.output.answer, "Use the builder.");
}

#[tokio::test]
async fn unknown_tool_is_reported_to_the_model() {
    let llm = Arc::new(MockLlm::with_responses(vec![
        Ok(tool_call_response("call_1", "missing", json!({}))),
        Ok(text_response(VALID_DRAFT)),
    ]));
    let runtime = AgentRuntime::new(spec(8), llm, vec![Arc::new(EchoTool)]);

    let run = runtime.run::<BotResponse>("anything").await.unwrap();
    assert!(run.invocations[0].is_error);
    assert!(run.invocations[0].result.contains("Unknown tool"));
}

#[tokio::test]
async fn malformed_draft_is_a_validation_failure() {
    let llm = Arc::new(MockLlm::with_responses(vec![Ok(text_response(
        r#"{"answer": "a", "reasoning": "r", "confidence_percentage": 150}"#,
    ))]));
    let runtime = AgentRuntime::new(spec(8), llm, vec![]);

    let err = runtime
        .run::<BotResponse>("anything")
        .await
        .err()
        .expect("validation should fail");
    assert!(matches!(
        err,
        AgentError::Validation(SchemaError::OutOfRange(150))
    ));
}

#[tokio::test]
async fn round_bound_is_enforced() {
    let llm = Arc::new(MockLlm::with_responses(vec![
        Ok(tool_call_response("call_1", "echo", json!({"text": "a"}))),
        Ok(tool_call_response("call_2", "echo", json!({"text": "b"}))),
        Ok(tool_call_response("call_3", "echo", json!({"text": "c"}))),
    ]));
    let runtime = AgentRuntime::new(spec(2), llm, vec![Arc::new(EchoTool)]);

    let err = runtime
        .run::<BotResponse>("loop forever")
        .await
        .err()
        .expect("bound should trip");
    assert!(matches!(
        err,
        AgentError::ReasoningExhausted { rounds: 2 }
    ));
}

#[tokio::test]
async fn all_tools_failing_with_no_answer_is_a_tool_failure() {
    let llm = Arc::new(MockLlm::with_responses(vec![
        Ok(tool_call_response("call_1", "search", json!({}))),
        Ok(tool_call_response("call_2", "search", json!({}))),
    ]));
    let runtime = AgentRuntime::new(spec(2), llm, vec![Arc::new(FailingTool)]);

    let err = runtime
        .run::<BotResponse>("anything")
        .await
        .err()
        .expect("should fail with tool-error category");
    assert!(matches!(
        err,
        AgentError::ToolsFailed { rounds: 2, attempts: 2 }
    ));
}

#[tokio::test]
async fn model_failure_passes_through() {
    let llm = Arc::new(MockLlm::with_responses(vec![Err(LlmError::from_status(
        429,
        "rate limited",
    ))]));
    let runtime = AgentRuntime::new(spec(8), llm, vec![]);

    let err = runtime
        .run::<BotResponse>("anything")
        .await
        .err()
        .expect("model error should surface");
    assert!(matches!(err, AgentError::Model(_)));
}

#[tokio::test]
async fn empty_completion_is_an_error() {
    let llm = Arc::new(MockLlm::with_responses(vec![Ok(ChatResponse {
        content: None,
        tool_calls: None,
        finish_reason: None,
        usage: None,
        model: None,
    })]));
    let runtime = AgentRuntime::new(spec(8), llm, vec![]);

    let err = runtime
        .run::<BotResponse>("anything")
        .await
        .err()
        .expect("empty completion should fail");
    assert!(matches!(err, AgentError::EmptyCompletion));
}
