//! Server side of the MCP stdio transport.
//!
//! Reads request lines from a byte stream, dispatches `initialize`,
//! `tools/list` and `tools/call` to a [`ToolHandler`], and writes one
//! response line per request. Notifications get no response.

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use docsense_common::Result;

use crate::protocol::{
    text_result, CallToolParams, RpcRequest, RpcResponse, ToolDescriptor, INVALID_PARAMS,
    METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION, TOOL_ERROR,
};

#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn server_name(&self) -> &str;
    async fn list_tools(&self) -> Vec<ToolDescriptor>;
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String>;
}

/// Serve a handler over stdin/stdout until EOF.
pub async fn run_stdio<H: ToolHandler>(handler: &H) -> Result<()> {
    serve(tokio::io::stdin(), tokio::io::stdout(), handler).await
}

pub async fn serve<R, W, H>(reader: R, mut writer: W, handler: &H) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    H: ToolHandler,
{
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let req: RpcRequest = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                write_response(
                    &mut writer,
                    RpcResponse::err(Value::Null, PARSE_ERROR, format!("parse error: {e}")),
                )
                .await?;
                continue;
            }
        };

        if req.is_notification() {
            continue;
        }

        let resp = match req.method.as_str() {
            "initialize" => handle_initialize(handler, &req),
            "tools/list" => handle_list_tools(handler, &req).await,
            "tools/call" => handle_call_tool(handler, &req).await,
            other => RpcResponse::err(
                req.id.clone(),
                METHOD_NOT_FOUND,
                format!("method not found: {other}"),
            ),
        };

        write_response(&mut writer, resp).await?;
    }

    Ok(())
}

fn handle_initialize<H: ToolHandler>(handler: &H, req: &RpcRequest) -> RpcResponse {
    RpcResponse::ok(
        req.id.clone(),
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": handler.server_name(),
                "version": env!("CARGO_PKG_VERSION"),
            }
        }),
    )
}

async fn handle_list_tools<H: ToolHandler>(handler: &H, req: &RpcRequest) -> RpcResponse {
    let tools = handler.list_tools().await;
    RpcResponse::ok(req.id.clone(), serde_json::json!({ "tools": tools }))
}

async fn handle_call_tool<H: ToolHandler>(handler: &H, req: &RpcRequest) -> RpcResponse {
    let params: CallToolParams = match serde_json::from_value(req.params.clone()) {
        Ok(p) => p,
        Err(e) => {
            return RpcResponse::err(req.id.clone(), INVALID_PARAMS, format!("invalid params: {e}"))
        }
    };

    match handler.call_tool(&params.name, params.arguments).await {
        Ok(text) => RpcResponse::ok(req.id.clone(), text_result(&text)),
        Err(e) => RpcResponse::err(req.id.clone(), TOOL_ERROR, e.to_string()),
    }
}

async fn write_response<W: AsyncWrite + Unpin>(writer: &mut W, resp: RpcResponse) -> Result<()> {
    let line = serde_json::to_string(&resp)?;
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsense_common::DocsenseError;

    struct EchoHandler;

    #[async_trait]
    impl ToolHandler for EchoHandler {
        fn server_name(&self) -> &str {
            "echo-server"
        }

        async fn list_tools(&self) -> Vec<ToolDescriptor> {
            vec![ToolDescriptor {
                name: "echo".to_string(),
                description: "echo the message back".to_string(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": { "message": { "type": "string" } },
                    "required": ["message"]
                }),
            }]
        }

        async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
            match name {
                "echo" => Ok(arguments["message"].as_str().unwrap_or("").to_string()),
                other => Err(DocsenseError::ToolNotFound(other.to_string())),
            }
        }
    }

    async fn run_session(input: &str) -> Vec<Value> {
        let reader = input.as_bytes().to_vec();
        let mut out = Vec::new();
        serve(&reader[..], &mut out, &EchoHandler).await.unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn full_session_over_in_memory_pipe() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#, "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#, "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#, "\n",
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"echo","arguments":{"message":"hi"}}}"#, "\n",
        );
        let responses = run_session(input).await;

        // Notification gets no response: three frames for four lines.
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(responses[1]["result"]["tools"][0]["name"], "echo");
        assert_eq!(
            responses[2]["result"]["content"][0]["text"],
            "hi"
        );
    }

    #[tokio::test]
    async fn unknown_method_yields_32601() {
        let responses = run_session("{\"jsonrpc\":\"2.0\",\"id\":9,\"method\":\"resources/list\"}\n").await;
        assert_eq!(responses[0]["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_line_yields_32700() {
        let responses = run_session("this is not json\n").await;
        assert_eq!(responses[0]["error"]["code"], PARSE_ERROR);
    }

    #[tokio::test]
    async fn bad_call_params_yield_32602() {
        let responses =
            run_session("{\"jsonrpc\":\"2.0\",\"id\":4,\"method\":\"tools/call\",\"params\":{\"arguments\":{}}}\n").await;
        assert_eq!(responses[0]["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn failed_tool_yields_tool_error() {
        let responses = run_session(
            "{\"jsonrpc\":\"2.0\",\"id\":5,\"method\":\"tools/call\",\"params\":{\"name\":\"nope\",\"arguments\":{}}}\n",
        )
        .await;
        assert_eq!(responses[0]["error"]["code"], TOOL_ERROR);
    }
}
