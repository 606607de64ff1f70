//! Agent-facing wrapper for tools advertised by an MCP server.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::Tool;

use super::client::{McpServer, RemoteToolSpec};

/// A remote MCP tool exposed to the agent runtime.
///
/// Delegates execution to the shared server handle; calls are serialized by
/// the handle itself.
pub struct McpTool {
    spec: RemoteToolSpec,
    server: Arc<McpServer>,
}

impl McpTool {
    pub fn new(spec: RemoteToolSpec, server: Arc<McpServer>) -> Self {
        Self { spec, server }
    }

    /// Wrap every tool the server advertises.
    pub async fn discover(server: &Arc<McpServer>) -> Result<Vec<McpTool>, super::McpError> {
        let specs = server.list_tools().await?;
        Ok(specs
            .into_iter()
            .map(|spec| McpTool::new(spec, Arc::clone(server)))
            .collect())
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn description(&self) -> &str {
        &self.spec.description
    }

    fn parameters_schema(&self) -> Value {
        self.spec.input_schema.clone()
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        self.server
            .call_tool(&self.spec.name, args)
            .await
            .map_err(Into::into)
    }
}
