//! Chat-completion backend trait and concrete implementations.
//!
//! Backends:
//!   OpenAiCompatibleBackend — any OpenAI-compatible endpoint (Ark, vLLM,
//!                             LMStudio, TogetherAI, OpenRouter, …)
//!   OllamaBackend           — local Ollama server, used for the router model
//!
//! Both speak the `/v1/chat/completions` wire shape, including function
//! tool calls (`tools` in the request, `tool_calls` + `finish_reason` in
//! the response).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("API error [{status}]: {message}")]
    ApiError { status: u16, message: String },
}

// ── Messages ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object, exactly as the model emitted it.
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

/// One turn in a conversation. `content` stays a JSON value so user turns
/// can carry image-URL part arrays next to plain strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self::plain("system", text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::plain("user", text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::plain("assistant", text)
    }

    /// Tool result turn, tied back to the call that produced it.
    pub fn tool(text: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Value::String(text.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// User turn carrying an image as a data/remote URL part.
    pub fn user_image(url: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: serde_json::json!([
                { "type": "image_url", "image_url": { "url": url.into() } }
            ]),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    fn plain(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Value::String(text.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.content.as_str()
    }
}

// ── Tool specs ────────────────────────────────────────────────────────────────

/// A callable tool as advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON Schema for the argument object.
    #[serde(default = "empty_schema", alias = "inputSchema")]
    pub input_schema: Value,
}

fn empty_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl ToolSpec {
    /// OpenAI function-calling shape.
    pub fn to_function(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema,
            }
        })
    }
}

// ── Request / Response ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub message: ChatMessage,
    pub finish_reason: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ChatResponse {
    pub fn wants_tools(&self) -> bool {
        self.finish_reason == "tool_calls"
    }

    pub fn content_text(&self) -> String {
        self.message.text().unwrap_or("").to_string()
    }
}

// ── Trait ─────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, req: ChatRequest) -> Result<ChatResponse, LlmError>;
    fn model_id(&self) -> &str;
    fn is_local(&self) -> bool;
}

// ── Shared OpenAI wire helpers ────────────────────────────────────────────────

fn build_chat_body(req: &ChatRequest, default_model: &str) -> Value {
    let mut body = serde_json::json!({
        "model": req.model.as_deref().unwrap_or(default_model),
        "messages": req.messages,
    });
    if !req.tools.is_empty() {
        body["tools"] = Value::Array(req.tools.iter().map(ToolSpec::to_function).collect());
    }
    if let Some(t) = req.temperature {
        body["temperature"] = serde_json::json!(t);
    }
    if let Some(m) = req.max_tokens {
        body["max_tokens"] = serde_json::json!(m);
    }
    body
}

fn parse_chat_response(json: &Value, fallback_model: &str) -> Result<ChatResponse, LlmError> {
    let choice = &json["choices"][0];
    let message: ChatMessage = serde_json::from_value(choice["message"].clone())?;
    Ok(ChatResponse {
        message,
        finish_reason: choice["finish_reason"].as_str().unwrap_or("stop").to_string(),
        model: json["model"].as_str().unwrap_or(fallback_model).to_string(),
        prompt_tokens: json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        completion_tokens: json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    })
}

async fn check_response_status(resp: reqwest::Response) -> Result<Value, LlmError> {
    let status = resp.status().as_u16();
    let body: Value = resp.json().await?;
    if status >= 400 {
        let msg = body["error"]["message"]
            .as_str()
            .or_else(|| body["message"].as_str())
            .unwrap_or("unknown API error")
            .to_string();
        return Err(LlmError::ApiError { status, message: msg });
    }
    Ok(body)
}

// ── 1. OpenAI-compatible remote endpoint ──────────────────────────────────────

pub struct OpenAiCompatibleBackend {
    pub base_url: String,
    pub model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatibleBackend {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(k) => req.bearer_auth(k),
            None => req,
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiCompatibleBackend {
    async fn complete(&self, req: ChatRequest) -> Result<ChatResponse, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let body = build_chat_body(&req, &self.model);
        let resp = self.auth(self.client.post(&url)).json(&body).send().await?;
        let json = check_response_status(resp).await?;
        parse_chat_response(&json, &self.model)
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn is_local(&self) -> bool {
        false
    }
}

// ── 2. Ollama (local) ─────────────────────────────────────────────────────────

pub struct OllamaBackend {
    pub base_url: String,
    pub model: String,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn complete(&self, req: ChatRequest) -> Result<ChatResponse, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let body = build_chat_body(&req, &self.model);
        let resp = self.client.post(&url).json(&body).send().await?;
        let json = check_response_status(resp).await?;
        parse_chat_response(&json, &self.model)
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn is_local(&self) -> bool {
        true
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_omits_tools_when_empty() {
        let req = ChatRequest {
            messages: vec![ChatMessage::user("hi")],
            ..Default::default()
        };
        let body = build_chat_body(&req, "m");
        assert!(body.get("tools").is_none());
        assert!(body.get("temperature").is_none());
        assert_eq!(body["model"], "m");
    }

    #[test]
    fn body_carries_tools_and_sampling() {
        let req = ChatRequest {
            messages: vec![ChatMessage::user("hi")],
            tools: vec![ToolSpec {
                name: "calculate".to_string(),
                description: "evaluate arithmetic".to_string(),
                input_schema: serde_json::json!({"type": "object"}),
            }],
            model: None,
            temperature: Some(0.7),
            max_tokens: Some(2000),
        };
        let body = build_chat_body(&req, "m");
        assert_eq!(body["tools"][0]["function"]["name"], "calculate");
        assert_eq!(body["tools"][0]["function"]["parameters"]["type"], "object");
        assert_eq!(body["max_tokens"], 2000);
    }

    #[test]
    fn parses_tool_call_response() {
        let json = serde_json::json!({
            "model": "ark-1",
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_0",
                        "type": "function",
                        "function": { "name": "load_image", "arguments": "{\"image_path\":\"a.png\"}" }
                    }]
                }
            }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 3 }
        });
        let resp = parse_chat_response(&json, "fallback").unwrap();
        assert!(resp.wants_tools());
        let calls = resp.message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "load_image");
        assert_eq!(resp.prompt_tokens, 12);
    }

    #[test]
    fn parses_final_text_response() {
        let json = serde_json::json!({
            "choices": [{
                "finish_reason": "stop",
                "message": { "role": "assistant", "content": "done" }
            }],
            "usage": {}
        });
        let resp = parse_chat_response(&json, "fallback").unwrap();
        assert!(!resp.wants_tools());
        assert_eq!(resp.content_text(), "done");
        assert_eq!(resp.model, "fallback");
    }

    #[test]
    fn tool_message_round_trips() {
        let msg = ChatMessage::tool("result text", "call_7");
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["role"], "tool");
        assert_eq!(v["tool_call_id"], "call_7");
        assert!(v.get("tool_calls").is_none());
    }

    #[test]
    fn image_message_is_part_array() {
        let msg = ChatMessage::user_image("data:image/png;base64,AAAA");
        assert_eq!(msg.content[0]["type"], "image_url");
    }

    #[test]
    fn ollama_is_local() {
        let b = OllamaBackend::new("http://localhost:11434", "qwen2.5:7b-instruct");
        assert!(b.is_local());
        assert_eq!(b.model_id(), "qwen2.5:7b-instruct");
    }
}
