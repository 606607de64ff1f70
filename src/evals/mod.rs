//! Offline evaluation harness for the docs agent.
//!
//! Runs a fixed set of named cases through the query service, scores each
//! output with pluggable evaluators, and aggregates a report. Evaluators are
//! pure with respect to shared state; cases are independent and run
//! concurrently.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;

use crate::llm::{ChatMessage, LlmClient, LlmError, Role};
use crate::schema::BotResponse;
use crate::service::QueryError;

/// Metadata attached to an evaluation case.
#[derive(Debug, Clone)]
pub struct CaseMetadata {
    pub difficulty: &'static str,
    pub topic: &'static str,
    pub expected_keywords: Vec<&'static str>,
}

/// A named evaluation case.
pub struct Case {
    pub name: &'static str,
    pub question: &'static str,
    pub metadata: CaseMetadata,
    pub evaluators: Vec<Arc<dyn Evaluator>>,
}

/// Everything an evaluator may look at for one case.
pub struct EvalContext<'a> {
    pub question: &'a str,
    pub response: &'a BotResponse,
    pub metadata: &'a CaseMetadata,
}

/// A scoring function applied to an agent's output.
///
/// Scores are in [0, 1]. Evaluators must not mutate shared state.
#[async_trait]
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &str;

    async fn evaluate(&self, ctx: &EvalContext<'_>) -> f64;
}

/// Scores 1.0 when the agent's self-reported confidence meets the threshold,
/// otherwise scales the confidence down to [0, 1].
pub struct ConfidenceEvaluator {
    pub min_confidence: u8,
}

#[async_trait]
impl Evaluator for ConfidenceEvaluator {
    fn name(&self) -> &str {
        "confidence"
    }

    async fn evaluate(&self, ctx: &EvalContext<'_>) -> f64 {
        if ctx.response.confidence_percentage >= self.min_confidence {
            1.0
        } else {
            f64::from(ctx.response.confidence_percentage) / 100.0
        }
    }
}

/// Fraction of expected keywords present in the answer (case-insensitive).
pub struct KeywordPresenceEvaluator;

#[async_trait]
impl Evaluator for KeywordPresenceEvaluator {
    fn name(&self) -> &str {
        "keyword_presence"
    }

    async fn evaluate(&self, ctx: &EvalContext<'_>) -> f64 {
        let keywords = &ctx.metadata.expected_keywords;
        if keywords.is_empty() {
            return 1.0;
        }

        let answer = ctx.response.answer.to_lowercase();
        let found = keywords
            .iter()
            .filter(|k| answer.contains(&k.to_lowercase()))
            .count();
        found as f64 / keywords.len() as f64
    }
}

/// Boolean judgment delegated to a secondary model call.
///
/// The judge model answers PASS or FAIL against a rubric; the score is 1 or
/// 0. A failed judge call scores 0 rather than aborting the run.
pub struct LlmJudge {
    pub rubric: String,
    pub model: String,
    pub llm: Arc<dyn LlmClient>,
}

impl LlmJudge {
    async fn judge(&self, ctx: &EvalContext<'_>) -> Result<bool, LlmError> {
        let prompt = format!(
            "You are grading an AI assistant's answer.\n\n\
             Rubric: {}\n\n\
             Question: {}\n\n\
             Answer: {}\n\n\
             Reasoning: {}\n\n\
             Reply with exactly PASS or FAIL.",
            self.rubric, ctx.question, ctx.response.answer, ctx.response.reasoning
        );
        let messages = [ChatMessage::new(Role::User, prompt)];
        let response = self
            .llm
            .chat_completion(&self.model, &messages, None, None)
            .await?;
        let verdict = response.content.unwrap_or_default();
        Ok(verdict.trim().to_uppercase().starts_with("PASS"))
    }
}

#[async_trait]
impl Evaluator for LlmJudge {
    fn name(&self) -> &str {
        "llm_judge"
    }

    async fn evaluate(&self, ctx: &EvalContext<'_>) -> f64 {
        match self.judge(ctx).await {
            Ok(true) => 1.0,
            Ok(false) => 0.0,
            Err(e) => {
                tracing::warn!("LLM judge call failed: {}", e);
                0.0
            }
        }
    }
}

/// Score for one evaluator on one case.
#[derive(Debug, Clone)]
pub struct Score {
    pub evaluator: String,
    pub value: f64,
}

/// Result of running one case.
#[derive(Debug)]
pub struct CaseReport {
    pub name: &'static str,
    pub scores: Vec<Score>,
    pub duration: Duration,
    pub error: Option<String>,
}

impl CaseReport {
    /// Mean score across this case's evaluators; 0 when the case failed.
    pub fn average(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().map(|s| s.value).sum::<f64>() / self.scores.len() as f64
    }
}

/// Aggregated report across all cases.
#[derive(Debug)]
pub struct EvalReport {
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub cases: Vec<CaseReport>,
}

impl EvalReport {
    /// Mean of the per-case averages.
    pub fn overall_average(&self) -> f64 {
        if self.cases.is_empty() {
            return 0.0;
        }
        self.cases.iter().map(|c| c.average()).sum::<f64>() / self.cases.len() as f64
    }

    /// Render the report as a plain-text table.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "evaluation run started {}\n",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        out.push_str(&format!(
            "{:<32} {:>8} {:>10}  scores\n",
            "case", "avg", "duration"
        ));
        for case in &self.cases {
            let scores = match &case.error {
                Some(error) => format!("error: {}", error),
                None => case
                    .scores
                    .iter()
                    .map(|s| format!("{}={:.2}", s.evaluator, s.value))
                    .collect::<Vec<_>>()
                    .join(" "),
            };
            out.push_str(&format!(
                "{:<32} {:>8.2} {:>9.1}s  {}\n",
                case.name,
                case.average(),
                case.duration.as_secs_f64(),
                scores
            ));
        }
        out.push_str(&format!("overall average: {:.2}\n", self.overall_average()));
        out
    }
}

/// A fixed ordered list of cases plus dataset-level evaluators applied to
/// every case.
pub struct Dataset {
    pub cases: Vec<Case>,
    pub evaluators: Vec<Arc<dyn Evaluator>>,
}

impl Dataset {
    /// Run every case through `task` concurrently and score the outputs.
    ///
    /// A failed case scores 0 and carries the error; other cases are
    /// unaffected.
    pub async fn evaluate<F, Fut>(&self, task: F) -> EvalReport
    where
        F: Fn(&'static str) -> Fut,
        Fut: std::future::Future<Output = Result<BotResponse, QueryError>>,
    {
        let runs = self.cases.iter().map(|case| {
            let fut = task(case.question);
            async move {
                let start = Instant::now();
                let outcome = fut.await;
                let duration = start.elapsed();

                match outcome {
                    Ok(response) => {
                        let ctx = EvalContext {
                            question: case.question,
                            response: &response,
                            metadata: &case.metadata,
                        };
                        let mut scores = Vec::new();
                        for evaluator in case.evaluators.iter().chain(self.evaluators.iter()) {
                            scores.push(Score {
                                evaluator: evaluator.name().to_string(),
                                value: evaluator.evaluate(&ctx).await,
                            });
                        }
                        CaseReport {
                            name: case.name,
                            scores,
                            duration,
                            error: None,
                        }
                    }
                    Err(e) => CaseReport {
                        name: case.name,
                        scores: Vec::new(),
                        duration,
                        error: Some(e.to_string()),
                    },
                }
            }
        });

        EvalReport {
            started_at: chrono::Utc::now(),
            cases: join_all(runs).await,
        }
    }
}

/// The fixed docs-agent evaluation dataset.
pub fn docs_agent_dataset(llm: Arc<dyn LlmClient>, judge_model: &str) -> Dataset {
    let judge = |rubric: &str| -> Arc<dyn Evaluator> {
        Arc::new(LlmJudge {
            rubric: rubric.to_string(),
            model: judge_model.to_string(),
            llm: Arc::clone(&llm),
        })
    };

    Dataset {
        cases: vec![
            Case {
                name: "basic_agent_creation",
                question: "How do I create a basic PydanticAI agent?",
                metadata: CaseMetadata {
                    difficulty: "easy",
                    topic: "agent_creation",
                    expected_keywords: vec!["Agent", "model", "system_prompt", "pydantic_ai"],
                },
                evaluators: vec![
                    Arc::new(ConfidenceEvaluator { min_confidence: 80 }),
                    Arc::new(KeywordPresenceEvaluator),
                    judge("Response should clearly explain how to create a PydanticAI agent with code examples"),
                ],
            },
            Case {
                name: "user_prompt_modification",
                question: "How do I change the user prompt in PydanticAI?",
                metadata: CaseMetadata {
                    difficulty: "medium",
                    topic: "prompt_handling",
                    expected_keywords: vec!["run", "run_sync", "user_prompt", "agent"],
                },
                evaluators: vec![
                    Arc::new(ConfidenceEvaluator { min_confidence: 75 }),
                    Arc::new(KeywordPresenceEvaluator),
                    judge("Response should explain how to modify user prompts with practical examples"),
                ],
            },
            Case {
                name: "tools_integration",
                question: "How do I add tools to a PydanticAI agent?",
                metadata: CaseMetadata {
                    difficulty: "medium",
                    topic: "tools",
                    expected_keywords: vec!["tools", "function", "decorator", "@tool"],
                },
                evaluators: vec![
                    Arc::new(ConfidenceEvaluator { min_confidence: 70 }),
                    Arc::new(KeywordPresenceEvaluator),
                    judge("Response should explain tools integration with clear examples and best practices"),
                ],
            },
        ],
        evaluators: vec![judge(
            "Response should be helpful, accurate, and well-structured for PydanticAI documentation questions",
        )],
    }
}
