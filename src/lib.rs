//! # docsbot
//!
//! An HTTP service combining toy math endpoints, item CRUD, and two LLM
//! agents that return schema-validated structured answers:
//! - a documentation-answering agent backed by Tavily web search
//! - a browser-automation agent backed by a Playwright MCP subprocess
//!
//! ## Query flow
//!
//! ```text
//! caller -> Query Service -> Agent Runtime
//!                                │
//!                 (tool calls: search / browser actions)
//!                                │
//!                     schema validation -> result
//! ```
//!
//! ## Modules
//! - `api`: HTTP routes (axum)
//! - `agent`: tool-calling runtime with bounded reasoning rounds
//! - `schema`: structured response shapes with explicit validation
//! - `tools`: agent tool trait and the Tavily search adapter
//! - `mcp`: JSON-RPC stdio client for the browser-automation subprocess
//! - `service`: query façades mapping runtime errors to caller categories
//! - `db`: SQLite item storage
//! - `evals`: offline evaluation harness for the docs agent

pub mod agent;
pub mod api;
pub mod config;
pub mod db;
pub mod evals;
pub mod llm;
pub mod mcp;
pub mod schema;
pub mod service;
pub mod tools;

pub use config::Config;
