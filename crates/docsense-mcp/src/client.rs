//! Client side of the MCP stdio transport.
//!
//! A tool server is a child process speaking line-delimited JSON-RPC on
//! its stdin/stdout. Calls are strictly sequential per server.

use std::path::Path;
use std::process::Stdio;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use docsense_common::{DocsenseError, Result};

use crate::protocol::{first_text, RpcRequest, RpcResponse, ToolDescriptor, PROTOCOL_VERSION};

/// How to launch a tool server.
#[derive(Debug, Clone)]
pub struct ServerSpec {
    pub command: String,
    pub args: Vec<String>,
}

impl ServerSpec {
    /// Infer the interpreter from the script path: `.py` runs under
    /// `python`, `.js` under `node`, anything else is treated as a native
    /// executable.
    pub fn from_script(script: &Path) -> Self {
        let path = script.to_string_lossy().to_string();
        match script.extension().and_then(|e| e.to_str()) {
            Some("py") => Self {
                command: "python".to_string(),
                args: vec![path],
            },
            Some("js") => Self {
                command: "node".to_string(),
                args: vec![path],
            },
            _ => Self {
                command: path,
                args: Vec::new(),
            },
        }
    }
}

/// Sequential request/response channel over any byte stream pair.
pub struct RpcChannel<R, W> {
    reader: Lines<BufReader<R>>,
    writer: W,
    next_id: i64,
}

impl<R, W> RpcChannel<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader).lines(),
            writer,
            next_id: 0,
        }
    }

    pub async fn request(&mut self, method: &str, params: Value) -> Result<Value> {
        self.next_id += 1;
        let id = self.next_id;
        self.write_line(&RpcRequest::new(id, method, params)).await?;

        loop {
            let line = self
                .reader
                .next_line()
                .await?
                .ok_or_else(|| DocsenseError::ServerUnavailable("server closed stdout".to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            let resp: RpcResponse = serde_json::from_str(&line)?;
            if resp.id != Value::from(id) {
                // Server-initiated notification or stale frame; not ours.
                tracing::debug!(line = %line, "skipping unmatched frame");
                continue;
            }
            if let Some(err) = resp.error {
                return Err(DocsenseError::Rpc {
                    code: err.code,
                    message: err.message,
                });
            }
            return Ok(resp.result.unwrap_or(Value::Null));
        }
    }

    pub async fn notify(&mut self, method: &str, params: Value) -> Result<()> {
        self.write_line(&RpcRequest::notification(method, params)).await
    }

    async fn write_line(&mut self, req: &RpcRequest) -> Result<()> {
        let line = serde_json::to_string(req)?;
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// A connected MCP tool server process.
pub struct StdioClient {
    child: Child,
    channel: RpcChannel<ChildStdout, ChildStdin>,
}

impl StdioClient {
    /// Spawn the server process and run the initialize handshake.
    pub async fn connect(spec: &ServerSpec) -> Result<Self> {
        let mut child = Command::new(&spec.command)
            .args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DocsenseError::ServerUnavailable("no stdin pipe".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DocsenseError::ServerUnavailable("no stdout pipe".to_string()))?;

        let mut channel = RpcChannel::new(stdout, stdin);
        let init = channel
            .request(
                "initialize",
                serde_json::json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "docsense",
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                }),
            )
            .await?;
        tracing::debug!(server_info = %init["serverInfo"], "initialized tool server");
        channel
            .notify("notifications/initialized", Value::Null)
            .await?;

        Ok(Self { child, channel })
    }

    pub async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>> {
        let result = self.channel.request("tools/list", Value::Null).await?;
        Ok(serde_json::from_value(result["tools"].clone())?)
    }

    /// Invoke a tool and return the first text block of its result.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<String> {
        let result = self
            .channel
            .request(
                "tools/call",
                serde_json::json!({ "name": name, "arguments": arguments }),
            )
            .await?;
        Ok(first_text(&result).unwrap_or_default().to_string())
    }

    pub async fn shutdown(&mut self) {
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
    }
}
