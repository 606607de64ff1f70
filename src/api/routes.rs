//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::{Item, ItemStore, NewItem};
use crate::llm::{LlmClient, OpenRouterClient};
use crate::schema::{BotResponse, BrowsingResponse};
use crate::service::{BrowserAgentService, DocsAgentService, QueryError};

/// Shared application state.
pub struct AppState {
    pub items: ItemStore,
    pub docs_agent: DocsAgentService,
    pub browser_agent: BrowserAgentService,
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let llm: Arc<dyn LlmClient> =
        Arc::new(OpenRouterClient::new(config.openrouter_api_key.clone()));

    let items = ItemStore::open(&config.database_path)?;

    let state = Arc::new(AppState {
        items,
        docs_agent: DocsAgentService::new(&config, Arc::clone(&llm)),
        browser_agent: BrowserAgentService::new(config.clone(), llm),
    });

    let app = router(state);

    let addr = config.bind_addr();
    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/divide/:numerator/:denominator", get(divide))
        .route("/fibonacci/:n", get(fibonacci))
        .route("/items/", post(create_item).get(read_items))
        .route("/items/:id", get(read_item))
        .route("/agent/query", post(query_agent))
        .route("/mcp/query", post(query_mcp_agent))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Request/Response Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct DivideResult {
    pub result: f64,
}

#[derive(Debug, Serialize)]
pub struct FibonacciResult {
    pub result: u128,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    100
}

#[derive(Debug, Deserialize)]
pub struct AgentQuery {
    pub question: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/health - Liveness probe.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// GET /divide/:numerator/:denominator - Divide two floats.
///
/// Division by zero is deliberately not validated; the non-finite result
/// surfaces as a server error (known gap, kept as-is).
async fn divide(
    Path((numerator, denominator)): Path<(f64, f64)>,
) -> Result<Json<DivideResult>, (StatusCode, String)> {
    let result = numerator / denominator;
    if !result.is_finite() {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            "division produced a non-finite result".to_string(),
        ));
    }
    Ok(Json(DivideResult { result }))
}

/// GET /fibonacci/:n - The nth Fibonacci number.
async fn fibonacci(
    Path(n): Path<i64>,
) -> Result<Json<FibonacciResult>, (StatusCode, String)> {
    if n < 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            "Input must be a non-negative integer".to_string(),
        ));
    }

    let result = fib(n as u64).ok_or_else(|| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "result too large".to_string(),
        )
    })?;

    Ok(Json(FibonacciResult { result }))
}

/// Iterative Fibonacci; `None` when the result overflows.
fn fib(n: u64) -> Option<u128> {
    if n <= 1 {
        return Some(n as u128);
    }

    let (mut a, mut b): (u128, u128) = (0, 1);
    for _ in 2..=n {
        let next = a.checked_add(b)?;
        a = b;
        b = next;
    }
    Some(b)
}

/// POST /items/ - Create a new item.
async fn create_item(
    State(state): State<Arc<AppState>>,
    Json(new_item): Json<NewItem>,
) -> Result<Json<Item>, (StatusCode, String)> {
    let item = state
        .items
        .create(new_item)
        .await
        .map_err(internal_error)?;
    Ok(Json(item))
}

/// GET /items/ - List items with pagination.
async fn read_items(
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<Item>>, (StatusCode, String)> {
    let items = state
        .items
        .list(pagination.skip, pagination.limit)
        .await
        .map_err(internal_error)?;
    Ok(Json(items))
}

/// GET /items/:id - Fetch a specific item.
async fn read_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Item>, (StatusCode, String)> {
    state
        .items
        .get(id)
        .await
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Item not found".to_string()))
}

/// POST /agent/query - Ask the documentation agent.
async fn query_agent(
    State(state): State<Arc<AppState>>,
    Json(query): Json<AgentQuery>,
) -> Result<Json<BotResponse>, (StatusCode, String)> {
    tracing::info!("Querying docs agent with question: {}", query.question);
    let response = state
        .docs_agent
        .ask(&query.question)
        .await
        .map_err(query_error_response)?;
    Ok(Json(response))
}

/// POST /mcp/query - Ask the browser-automation agent.
async fn query_mcp_agent(
    State(state): State<Arc<AppState>>,
    Json(query): Json<AgentQuery>,
) -> Result<Json<BrowsingResponse>, (StatusCode, String)> {
    tracing::info!("Querying browser agent with question: {}", query.question);
    let response = state
        .browser_agent
        .ask(&query.question)
        .await
        .map_err(query_error_response)?;
    Ok(Json(response))
}

fn internal_error(err: impl std::fmt::Display) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

/// Map a query failure onto its caller-facing status code.
fn query_error_response(err: QueryError) -> (StatusCode, String) {
    let status = match err {
        QueryError::MalformedAnswer(_) => StatusCode::BAD_GATEWAY,
        QueryError::ModelFailure(_) => StatusCode::BAD_GATEWAY,
        QueryError::ToolFailure(_) => StatusCode::BAD_GATEWAY,
        QueryError::ReasoningExhausted(_) => StatusCode::GATEWAY_TIMEOUT,
        QueryError::BrowserUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> (tempfile::TempDir, Arc<AppState>) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            tavily_api_key: "test-key".to_string(),
            openrouter_api_key: "test-key".to_string(),
            docs_model: "test/model".to_string(),
            browser_model: "test/model".to_string(),
            database_path: dir.path().join("items.db"),
            host: "127.0.0.1".to_string(),
            port: 0,
            max_tool_rounds: 8,
            mcp_command: "true".to_string(),
            mcp_args: vec![],
        };
        let llm: Arc<dyn LlmClient> =
            Arc::new(OpenRouterClient::new(config.openrouter_api_key.clone()));
        let items = ItemStore::open(&config.database_path).unwrap();
        let state = Arc::new(AppState {
            items,
            docs_agent: DocsAgentService::new(&config, Arc::clone(&llm)),
            browser_agent: BrowserAgentService::new(config, llm),
        });
        (dir, state)
    }

    #[test]
    fn fib_known_values() {
        assert_eq!(fib(0), Some(0));
        assert_eq!(fib(1), Some(1));
        assert_eq!(fib(2), Some(1));
        assert_eq!(fib(10), Some(55));
        assert_eq!(fib(20), Some(6765));
    }

    #[tokio::test]
    async fn divide_returns_quotient() {
        let Json(result) = divide(Path((10.0, 2.0))).await.unwrap();
        assert_eq!(result.result, 5.0);
    }

    #[tokio::test]
    async fn divide_by_zero_surfaces_as_server_error() {
        let (status, _) = divide(Path((1.0, 0.0))).await.err().expect("should fail");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn fibonacci_rejects_negative_input() {
        let (status, message) = fibonacci(Path(-1)).await.err().expect("should fail");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "Input must be a non-negative integer");
    }

    #[tokio::test]
    async fn fibonacci_known_values() {
        for (n, expected) in [(0, 0), (1, 1), (10, 55)] {
            let Json(result) = fibonacci(Path(n)).await.unwrap();
            assert_eq!(result.result, expected);
        }
    }

    #[tokio::test]
    async fn item_crud_roundtrip() {
        let (_dir, state) = test_state();

        let Json(created) = create_item(
            State(Arc::clone(&state)),
            Json(NewItem {
                name: "widget".to_string(),
                description: "a widget".to_string(),
            }),
        )
        .await
        .unwrap();

        let Json(fetched) = read_item(State(Arc::clone(&state)), Path(created.id))
            .await
            .unwrap();
        assert_eq!(fetched.name, "widget");
        assert_eq!(fetched.description, "a widget");
    }

    #[tokio::test]
    async fn missing_item_is_404() {
        let (_dir, state) = test_state();
        let (status, message) = read_item(State(state), Path(12345))
            .await
            .err()
            .expect("should be missing");
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(message, "Item not found");
    }

    #[tokio::test]
    async fn list_pagination_bounds() {
        let (_dir, state) = test_state();
        for i in 0..4 {
            create_item(
                State(Arc::clone(&state)),
                Json(NewItem {
                    name: format!("item-{}", i),
                    description: String::new(),
                }),
            )
            .await
            .unwrap();
        }

        let Json(page) = read_items(
            State(Arc::clone(&state)),
            Query(Pagination { skip: 2, limit: 1 }),
        )
        .await
        .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "item-2");
    }

    #[test]
    fn query_errors_map_to_status_codes() {
        let cases = [
            (
                QueryError::MalformedAnswer("m".into()),
                StatusCode::BAD_GATEWAY,
            ),
            (QueryError::ModelFailure("m".into()), StatusCode::BAD_GATEWAY),
            (QueryError::ToolFailure("m".into()), StatusCode::BAD_GATEWAY),
            (
                QueryError::ReasoningExhausted("m".into()),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                QueryError::BrowserUnavailable("m".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, expected) in cases {
            let (status, _) = query_error_response(err);
            assert_eq!(status, expected);
        }
    }
}
