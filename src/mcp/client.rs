//! JSON-RPC 2.0 stdio client for an MCP server subprocess.

use std::process::Stdio;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

const PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP client failures.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("failed to spawn MCP server '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("MCP server I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("MCP server exited before responding")]
    ServerExited,
    #[error("MCP protocol error: {0}")]
    Protocol(String),
    #[error("MCP server error {code}: {message}")]
    Rpc { code: i32, message: String },
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorBody>,
    /// Present on server-initiated notifications, which we skip.
    #[serde(default)]
    method: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorBody {
    code: i32,
    message: String,
}

/// A tool advertised by the MCP server via `tools/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct ToolsListResult {
    #[serde(default)]
    tools: Vec<RemoteToolSpec>,
}

#[derive(Debug, Deserialize)]
struct ToolCallResult {
    #[serde(default)]
    content: Vec<ToolContent>,
    #[serde(rename = "isError", default)]
    is_error: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

struct McpIo {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
}

/// Handle to a running MCP server subprocess.
///
/// Requests are serialized through an internal mutex: the underlying server
/// does not support concurrent multiplexed sessions.
pub struct McpServer {
    child: Child,
    io: Mutex<McpIo>,
    server_name: String,
}

impl McpServer {
    /// Spawn the server subprocess and perform the initialize handshake.
    ///
    /// The handshake doubles as a health check: a server that fails to
    /// answer `initialize` with a server info block is treated as down.
    pub async fn spawn(command: &str, args: &[String]) -> Result<Self, McpError> {
        tracing::info!("Spawning MCP server: {} {}", command, args.join(" "));

        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| McpError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Protocol("child stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Protocol("child stdout unavailable".to_string()))?;

        let mut server = Self {
            child,
            io: Mutex::new(McpIo {
                stdin,
                stdout: BufReader::new(stdout),
                next_id: 1,
            }),
            server_name: String::new(),
        };

        let init = server
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "clientInfo": {
                        "name": "docsbot",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                    "capabilities": {}
                })),
            )
            .await?;

        let name = init
            .pointer("/serverInfo/name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                McpError::Protocol("initialize response missing serverInfo".to_string())
            })?
            .to_string();
        server.server_name = name;

        server.notify("notifications/initialized").await?;

        tracing::info!("MCP server '{}' initialized", server.server_name);
        Ok(server)
    }

    /// Name reported by the server during initialization.
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// List the tools the server exposes.
    pub async fn list_tools(&self) -> Result<Vec<RemoteToolSpec>, McpError> {
        let result = self.request("tools/list", None).await?;
        let parsed: ToolsListResult = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("bad tools/list result: {}", e)))?;
        Ok(parsed.tools)
    }

    /// Invoke a tool on the server.
    ///
    /// A tool-level failure (`isError`) is returned as `Err` so the agent
    /// runtime can feed it back to the model as a recoverable error.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, McpError> {
        let result = self
            .request(
                "tools/call",
                Some(json!({ "name": name, "arguments": arguments })),
            )
            .await?;

        let parsed: ToolCallResult = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("bad tools/call result: {}", e)))?;

        let text = parsed
            .content
            .into_iter()
            .filter_map(|c| match c {
                ToolContent::Text { text } => Some(text),
                ToolContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if parsed.is_error {
            Err(McpError::Rpc {
                code: 0,
                message: text,
            })
        } else {
            Ok(text)
        }
    }

    /// Terminate the subprocess and reap it.
    pub async fn shutdown(mut self) -> Result<(), McpError> {
        tracing::info!("Shutting down MCP server '{}'", self.server_name);
        self.child.kill().await?;
        Ok(())
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let mut io = self.io.lock().await;

        let id = io.next_id;
        io.next_id += 1;

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: Some(id),
            method,
            params,
        };
        let mut line = serde_json::to_string(&request)
            .map_err(|e| McpError::Protocol(format!("failed to encode request: {}", e)))?;
        line.push('\n');
        io.stdin.write_all(line.as_bytes()).await?;
        io.stdin.flush().await?;

        // Responses arrive in request order; skip server-initiated
        // notifications interleaved on the same stream.
        loop {
            let mut buf = String::new();
            let read = io.stdout.read_line(&mut buf).await?;
            if read == 0 {
                return Err(McpError::ServerExited);
            }
            let trimmed = buf.trim();
            if trimmed.is_empty() {
                continue;
            }

            let response: JsonRpcResponse = serde_json::from_str(trimmed)
                .map_err(|e| McpError::Protocol(format!("bad response line: {}", e)))?;

            if response.method.is_some() {
                continue;
            }

            if response.id.as_u64() != Some(id) {
                return Err(McpError::Protocol(format!(
                    "response id mismatch: expected {}, got {}",
                    id, response.id
                )));
            }

            if let Some(error) = response.error {
                return Err(McpError::Rpc {
                    code: error.code,
                    message: error.message,
                });
            }

            return response
                .result
                .ok_or_else(|| McpError::Protocol("response missing result".to_string()));
        }
    }

    async fn notify(&self, method: &str) -> Result<(), McpError> {
        let mut io = self.io.lock().await;
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: None,
            method,
            params: None,
        };
        let mut line = serde_json::to_string(&request)
            .map_err(|e| McpError::Protocol(format!("failed to encode notification: {}", e)))?;
        line.push('\n');
        io.stdin.write_all(line.as_bytes()).await?;
        io.stdin.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal shell stub that answers initialize, tools/list, and
    /// tools/call in request order.
    const STUB_SERVER: &str = r#"
n=0
while IFS= read -r line; do
  case "$line" in *"notifications/initialized"*) continue;; esac
  n=$((n+1))
  if [ "$n" -eq 1 ]; then
    echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","serverInfo":{"name":"stub","version":"0.0.1"},"capabilities":{"tools":{}}}}'
  elif [ "$n" -eq 2 ]; then
    echo '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"browser_navigate","description":"Navigate to a URL","inputSchema":{"type":"object"}}]}}'
  else
    echo '{"jsonrpc":"2.0","id":'"$n"',"result":{"content":[{"type":"text","text":"navigated"}],"isError":false}}'
  fi
done
"#;

    async fn spawn_stub() -> McpServer {
        McpServer::spawn("sh", &["-c".to_string(), STUB_SERVER.to_string()])
            .await
            .expect("stub server spawns")
    }

    #[tokio::test]
    async fn spawn_failure_is_a_clean_error() {
        let err = McpServer::spawn("docsbot-no-such-binary", &[])
            .await
            .err()
            .expect("spawn should fail");
        assert!(matches!(err, McpError::Spawn { .. }));
    }

    #[tokio::test]
    async fn handshake_reports_server_name() {
        let server = spawn_stub().await;
        assert_eq!(server.server_name(), "stub");
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn lists_and_calls_tools() {
        let server = spawn_stub().await;

        let tools = server.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "browser_navigate");

        let result = server
            .call_tool("browser_navigate", json!({"url": "https://example.com"}))
            .await
            .unwrap();
        assert_eq!(result, "navigated");

        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn request_after_server_exit_fails() {
        let server = McpServer::spawn(
            "sh",
            &[
                "-c".to_string(),
                // Answers initialize, swallows the initialized notification, then exits.
                r#"IFS= read -r line; echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","serverInfo":{"name":"oneshot","version":"0"},"capabilities":{}}}'; IFS= read -r line"#.to_string(),
            ],
        )
        .await
        .expect("oneshot server spawns");

        let err = server.list_tools().await.err().expect("server is gone");
        assert!(matches!(err, McpError::ServerExited | McpError::Io(_)));

        server.shutdown().await.unwrap();
    }

    #[test]
    fn notification_has_no_id() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: None,
            method: "notifications/initialized",
            params: None,
        };
        let encoded = serde_json::to_string(&request).unwrap();
        assert!(!encoded.contains("\"id\""));
        assert!(encoded.contains("notifications/initialized"));
    }
}
