//! MCP client: talks to a tool server over newline-delimited JSON-RPC 2.0.
//!
//! The server is usually a child process speaking on its stdin/stdout
//! (`python search_server.py`), but any pair of byte streams works.
//!
//! Handshake: `initialize` → `notifications/initialized`. After that the
//! client issues `tools/list` and `tools/call`. Responses are matched by id;
//! server notifications and stale responses (from a caller that timed out)
//! are skipped.

use async_trait::async_trait;
use curator_core::error::ToolError;
use curator_core::tool::{ToolArguments, ToolDescriptor, ToolOutput, ToolProvider};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

type Reader = BufReader<Box<dyn AsyncRead + Unpin + Send>>;
type Writer = Box<dyn AsyncWrite + Unpin + Send>;

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
struct JsonRpcMessage {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ListToolsResult {
    #[serde(default)]
    tools: Vec<ToolDescriptor>,
}

#[derive(Debug, Deserialize)]
struct CallToolResult {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default, rename = "isError")]
    is_error: bool,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl CallToolResult {
    /// Concatenate the text blocks; other block types are skipped.
    fn into_output(self) -> ToolOutput {
        let text = self
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("\n");
        ToolOutput {
            content: text,
            is_error: self.is_error,
        }
    }
}

/// The stateful half of the connection; one exchange at a time.
struct Session {
    reader: Reader,
    writer: Writer,
    child: Option<Child>,
    next_id: u64,
}

/// A [`ToolProvider`] backed by an MCP server.
pub struct McpClient {
    name: String,
    session: Mutex<Session>,
    connected: AtomicBool,
}

impl McpClient {
    /// Spawn `command args..` and perform the MCP handshake.
    pub async fn spawn(command: &str, args: &[String]) -> Result<Self, ToolError> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::NotConnected(format!("Failed to start '{command}': {e}")))?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(ToolError::NotConnected(format!(
                "'{command}' did not expose stdio pipes"
            )));
        };

        let client = Self::from_parts(
            format!("mcp:{command}"),
            Box::new(stdout),
            Box::new(stdin),
            Some(child),
        );
        client.initialize().await?;
        Ok(client)
    }

    /// Perform the handshake over an existing pair of streams.
    pub async fn connect<R, W>(
        name: impl Into<String>,
        reader: R,
        writer: W,
    ) -> Result<Self, ToolError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let client = Self::from_parts(name.into(), Box::new(reader), Box::new(writer), None);
        client.initialize().await?;
        Ok(client)
    }

    fn from_parts(
        name: String,
        reader: Box<dyn AsyncRead + Unpin + Send>,
        writer: Writer,
        child: Option<Child>,
    ) -> Self {
        Self {
            name,
            session: Mutex::new(Session {
                reader: BufReader::new(reader),
                writer,
                child,
                next_id: 1,
            }),
            connected: AtomicBool::new(true),
        }
    }

    async fn initialize(&self) -> Result<(), ToolError> {
        let result = self
            .request(
                "initialize",
                serde_json::json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                }),
            )
            .await?;

        let server = result
            .pointer("/serverInfo/name")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let version = result
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(PROTOCOL_VERSION);
        info!(provider = %self.name, server, protocol = version, "MCP session initialized");

        self.notify("notifications/initialized").await
    }

    /// Send a request and wait for the response with the same id.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ToolError> {
        let mut session = self.session.lock().await;
        let id = session.next_id;
        session.next_id += 1;

        let line = encode(&JsonRpcRequest {
            jsonrpc: "2.0",
            id: Some(id),
            method,
            params: Some(params),
        })?;
        self.write_line(&mut session, &line).await?;
        trace!(provider = %self.name, id, method, "MCP request sent");

        loop {
            let mut buf = String::new();
            let read = session.reader.read_line(&mut buf).await.map_err(|e| {
                self.mark_disconnected();
                ToolError::NotConnected(format!("{}: {e}", self.name))
            })?;
            if read == 0 {
                self.mark_disconnected();
                return Err(ToolError::NotConnected(format!(
                    "{} closed the connection",
                    self.name
                )));
            }

            let trimmed = buf.trim();
            if trimmed.is_empty() {
                continue;
            }
            let message: JsonRpcMessage = match serde_json::from_str(trimmed) {
                Ok(m) => m,
                Err(e) => {
                    debug!(provider = %self.name, error = %e, "Skipping non-JSON-RPC line");
                    continue;
                }
            };

            match message.id.as_ref().and_then(Value::as_u64) {
                Some(got) if got == id => {}
                Some(stale) => {
                    debug!(provider = %self.name, id = stale, "Discarding stale response");
                    continue;
                }
                // Server-initiated notification
                None => continue,
            }

            if let Some(err) = message.error {
                return Err(ToolError::Protocol(format!(
                    "{method} failed ({}): {}",
                    err.code, err.message
                )));
            }
            return Ok(message.result.unwrap_or(Value::Null));
        }
    }

    async fn notify(&self, method: &str) -> Result<(), ToolError> {
        let mut session = self.session.lock().await;
        let line = encode(&JsonRpcRequest {
            jsonrpc: "2.0",
            id: None,
            method,
            params: None,
        })?;
        self.write_line(&mut session, &line).await
    }

    async fn write_line(&self, session: &mut Session, line: &str) -> Result<(), ToolError> {
        let result = async {
            session.writer.write_all(line.as_bytes()).await?;
            session.writer.write_all(b"\n").await?;
            session.writer.flush().await
        }
        .await;

        result.map_err(|e| {
            self.mark_disconnected();
            ToolError::NotConnected(format!("{}: {e}", self.name))
        })
    }

    fn mark_disconnected(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            warn!(provider = %self.name, "Tool provider disconnected");
        }
    }

    /// Close stdin and wait briefly for the server to exit, then kill it.
    pub async fn shutdown(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let mut session = self.session.lock().await;
        let _ = session.writer.shutdown().await;

        if let Some(child) = session.child.as_mut() {
            match tokio::time::timeout(Duration::from_secs(2), child.wait()).await {
                Ok(Ok(status)) => debug!(provider = %self.name, %status, "Tool server exited"),
                _ => {
                    let _ = child.start_kill();
                    debug!(provider = %self.name, "Tool server killed");
                }
            }
        }
    }
}

fn encode(request: &JsonRpcRequest<'_>) -> Result<String, ToolError> {
    serde_json::to_string(request).map_err(|e| ToolError::Protocol(e.to_string()))
}

#[async_trait]
impl ToolProvider for McpClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> std::result::Result<Vec<ToolDescriptor>, ToolError> {
        let result = self.request("tools/list", serde_json::json!({})).await?;
        let list: ListToolsResult =
            serde_json::from_value(result).map_err(|e| ToolError::Protocol(e.to_string()))?;
        debug!(provider = %self.name, tools = list.tools.len(), "Listed tools");
        Ok(list.tools)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: ToolArguments,
    ) -> std::result::Result<ToolOutput, ToolError> {
        if !self.is_connected() {
            return Err(ToolError::NotConnected(self.name.clone()));
        }
        let result = self
            .request(
                "tools/call",
                serde_json::json!({ "name": name, "arguments": arguments }),
            )
            .await?;
        let call: CallToolResult =
            serde_json::from_value(result).map_err(|e| ToolError::Protocol(e.to_string()))?;
        Ok(call.into_output())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
