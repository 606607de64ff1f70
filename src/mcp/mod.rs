//! MCP (Model Context Protocol) client for the browser-automation server.
//!
//! Spawns an MCP server subprocess (Playwright by default) and speaks
//! JSON-RPC 2.0 over its stdio, one message per line. The subprocess must be
//! shut down explicitly; `Drop` kills it as a backstop so a failed query
//! cannot leak the process.

mod client;
mod tool;

pub use client::{McpError, McpServer, RemoteToolSpec};
pub use tool::McpTool;
