//! Chat session engine: conversation history, the tool-call loop, and
//! router gating of the offered tool set.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use docsense_common::temp::TempStore;
use docsense_common::Result;
use docsense_llm::audit::{AuditEntry, AuditLog};
use docsense_llm::backend::{ChatMessage, ChatRequest, LlmBackend, ToolSpec};
use docsense_llm::router::PipelineRouter;
use docsense_mcp::protocol::ToolDescriptor;
use docsense_mcp::McpManager;

/// Seed system prompt for the document-analysis assistant.
pub const SYSTEM_PROMPT: &str =
    "You are a skilled document-analysis assistant. Give the final answer \
     directly, without showing your reasoning or intermediate steps. You \
     have MCP tools available. When asked to analyse a document path, first \
     convert it with pdf_to_markdown, then parse the converted file with \
     extract_text_and_images, then load every referenced image with \
     load_image. Whenever a document contains image links, load them with \
     load_image regardless of the question.";

/// Seam between the session loop and tool execution, so the loop is
/// testable without spawning server processes.
#[async_trait]
pub trait ToolDispatcher: Send {
    fn tool_specs(&self) -> Vec<ToolSpec>;
    async fn dispatch(&mut self, name: &str, arguments: Value) -> Result<String>;
}

#[async_trait]
impl ToolDispatcher for McpManager {
    fn tool_specs(&self) -> Vec<ToolSpec> {
        self.descriptors().iter().map(spec_from_descriptor).collect()
    }

    async fn dispatch(&mut self, name: &str, arguments: Value) -> Result<String> {
        self.call_tool(name, arguments).await
    }
}

fn spec_from_descriptor(d: &ToolDescriptor) -> ToolSpec {
    ToolSpec {
        name: d.name.clone(),
        description: d.description.clone(),
        input_schema: d.input_schema.clone(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadedFile {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub file_type: String,
}

/// One user-visible transcript turn.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptTurn {
    pub role: String,
    pub content: String,
}

pub struct ChatSession {
    backend: Arc<dyn LlmBackend>,
    tools: Box<dyn ToolDispatcher>,
    router: Option<PipelineRouter>,
    audit: Arc<AuditLog>,
    temp: Arc<TempStore>,
    history: Vec<ChatMessage>,
    recent_questions: Vec<String>,
    uploaded_files: Vec<UploadedFile>,
    image_queue: Vec<String>,
    max_rounds: usize,
    max_recent: usize,
}

impl ChatSession {
    pub fn new(
        backend: Arc<dyn LlmBackend>,
        tools: Box<dyn ToolDispatcher>,
        router: Option<PipelineRouter>,
        audit: Arc<AuditLog>,
        temp: Arc<TempStore>,
        max_rounds: usize,
        max_recent: usize,
    ) -> Self {
        Self {
            backend,
            tools,
            router,
            audit,
            temp,
            history: vec![ChatMessage::system(SYSTEM_PROMPT)],
            recent_questions: Vec::new(),
            uploaded_files: Vec::new(),
            image_queue: Vec::new(),
            max_rounds,
            max_recent,
        }
    }

    /// Run one query to completion, invoking tools until the model stops
    /// asking for them.
    pub async fn process_query(
        &mut self,
        query: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let enhanced = self.enhance_query(query);

        let mut messages = self.history.clone();
        messages.push(ChatMessage::user(enhanced));

        self.recent_questions.push(query.to_string());
        if self.recent_questions.len() > self.max_recent {
            let drop = self.recent_questions.len() - self.max_recent;
            self.recent_questions.drain(..drop);
        }

        let mut tool_specs = self.tools.tool_specs();
        if let Some(router) = &self.router {
            let selected = router.select_tools(query, &self.recent_questions).await;
            if !selected.is_empty() {
                tool_specs.retain(|s| selected.contains(&s.name));
                tracing::info!(offered = tool_specs.len(), "router pruned tool set");
            }
        }

        loop {
            let req = ChatRequest {
                messages: messages.clone(),
                tools: tool_specs.clone(),
                model: None,
                temperature: Some(temperature),
                max_tokens: Some(max_tokens),
            };

            let started = Instant::now();
            let resp = self
                .backend
                .complete(req)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
            self.audit.record(AuditEntry::new(
                resp.model.clone(),
                if self.backend.is_local() { "local" } else { "ark" }.to_string(),
                resp.prompt_tokens,
                resp.completion_tokens,
                &resp.content_text(),
                started.elapsed().as_millis() as u64,
            ));

            messages.push(resp.message.clone());

            if !resp.wants_tools() {
                let content = resp.content_text();
                self.commit(&messages);
                if let Err(e) = self.temp.cleanup() {
                    tracing::warn!(error = %e, "temp cleanup failed");
                }
                return Ok(content);
            }

            for call in resp.message.tool_calls.iter().flatten() {
                let arguments: Value = serde_json::from_str(&call.function.arguments)?;
                let output = self.tools.dispatch(&call.function.name, arguments).await?;

                // Image payloads go to the model as image parts, not as
                // tool-result text.
                if call.function.name == "load_image" {
                    self.image_queue.push(output);
                } else {
                    messages.push(ChatMessage::tool(output, &call.id));
                }
            }
            for image in self.image_queue.drain(..) {
                messages.push(ChatMessage::user_image(image));
            }
        }
    }

    /// Prefix the query with the uploaded-file instruction when files are
    /// pending.
    fn enhance_query(&self, query: &str) -> String {
        if self.uploaded_files.is_empty() {
            return query.to_string();
        }
        let paths = self
            .uploaded_files
            .iter()
            .map(|f| f.path.to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Please read the following files:\n{paths}\n\
             Extract their text and images, then carry out this instruction:\n{query}"
        )
    }

    /// Append this query's new turns to the history, dropping tool-result
    /// intermediates, then trim.
    fn commit(&mut self, messages: &[ChatMessage]) {
        let new_turns = messages[self.history.len()..]
            .iter()
            .filter(|m| m.role != "tool")
            .cloned();
        self.history.extend(new_turns);
        self.trim_history();
    }

    /// Keep the system prompt plus the last `max_rounds` rounds.
    fn trim_history(&mut self) {
        let cap = self.max_rounds * 2;
        if self.history.len() > cap + 1 {
            let cut = self.history.len() - cap;
            self.history.drain(1..cut);
        }
    }

    /// Record a failed query as a visible exchange, as the UI does.
    pub fn record_error(&mut self, query: &str, error: &str) {
        self.history.push(ChatMessage::user(query));
        self.history
            .push(ChatMessage::assistant(format!("Query failed: {error}")));
        self.trim_history();
    }

    pub fn clear_history(&mut self) {
        self.history.truncate(1);
        self.recent_questions.clear();
    }

    /// User and assistant turns with plain text content, for rendering.
    pub fn transcript(&self) -> Vec<TranscriptTurn> {
        self.history
            .iter()
            .filter(|m| m.role == "user" || m.role == "assistant")
            .filter_map(|m| {
                m.text().map(|t| TranscriptTurn {
                    role: m.role.clone(),
                    content: t.to_string(),
                })
            })
            .collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.tool_specs().into_iter().map(|s| s.name).collect()
    }

    pub fn add_uploaded_file(&mut self, file: UploadedFile) {
        self.uploaded_files.push(file);
    }

    pub fn uploaded_files(&self) -> &[UploadedFile] {
        &self.uploaded_files
    }

    pub fn clear_files(&mut self) {
        self.uploaded_files.clear();
    }
}
