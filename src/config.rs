//! Service configuration loaded from the environment.
//!
//! All values are read once at startup. Optional values fall back to
//! defaults; a missing required credential is a fatal startup error.

use std::path::PathBuf;

use thiserror::Error;

const DEFAULT_DOCS_MODEL: &str = "openai/gpt-4.1";
const DEFAULT_BROWSER_MODEL: &str = "openai/gpt-4o";
const DEFAULT_DATABASE_PATH: &str = "./items.db";
const DEFAULT_MAX_TOOL_ROUNDS: u32 = 8;

/// Configuration errors surfaced at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {var}: {value}")]
    InvalidVar { var: &'static str, value: String },
}

/// Immutable service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Tavily search API key. Required; the docs agent cannot start without it.
    pub tavily_api_key: String,
    /// OpenRouter API key for model calls. Required.
    pub openrouter_api_key: String,
    /// Model used by the documentation-answering agent.
    pub docs_model: String,
    /// Model used by the browser-automation agent.
    pub browser_model: String,
    /// Path to the SQLite file backing the items table.
    pub database_path: PathBuf,
    /// Bind address.
    pub host: String,
    pub port: u16,
    /// Upper bound on reasoning/tool-call rounds per agent query.
    pub max_tool_rounds: u32,
    /// Command used to launch the browser-automation MCP server.
    pub mcp_command: String,
    pub mcp_args: Vec<String>,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let tavily_api_key = std::env::var("TAVILY_API_KEY")
            .map_err(|_| ConfigError::MissingVar("TAVILY_API_KEY"))?;
        let openrouter_api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| ConfigError::MissingVar("OPENROUTER_API_KEY"))?;

        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidVar {
                var: "PORT",
                value: raw,
            })?,
            Err(_) => 8000,
        };

        let max_tool_rounds = match std::env::var("MAX_TOOL_ROUNDS") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidVar {
                var: "MAX_TOOL_ROUNDS",
                value: raw,
            })?,
            Err(_) => DEFAULT_MAX_TOOL_ROUNDS,
        };

        let mcp_args = std::env::var("MCP_ARGS")
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
            .unwrap_or_else(|_| vec!["-y".to_string(), "@playwright/mcp@latest".to_string()]);

        Ok(Self {
            tavily_api_key,
            openrouter_api_key,
            docs_model: std::env::var("DOCS_AGENT_MODEL")
                .unwrap_or_else(|_| DEFAULT_DOCS_MODEL.to_string()),
            browser_model: std::env::var("BROWSER_AGENT_MODEL")
                .unwrap_or_else(|_| DEFAULT_BROWSER_MODEL.to_string()),
            database_path: std::env::var("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATABASE_PATH)),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
            max_tool_rounds,
            mcp_command: std::env::var("MCP_COMMAND").unwrap_or_else(|_| "npx".to_string()),
            mcp_args,
        })
    }

    /// Address string suitable for a TCP listener bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
