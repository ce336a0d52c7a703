//! Built-in tools and the registry that dispatches them by name.
//!
//! Tool lifecycle:
//!   1. Implement [`Tool`] for your type.
//!   2. Register with [`ToolRegistry::register`].
//!   3. The MCP server (or the agent directly) invokes tools via
//!      [`ToolRegistry::invoke`].

pub mod calculate;
pub mod document;
pub mod fetch;
pub mod report;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use docsense_common::temp::TempStore;
use docsense_mcp::protocol::ToolDescriptor;

/// A callable tool.
///
/// # Minimal contract
/// - `name()` must be unique across the registry (snake_case).
/// - `description()` is surfaced to the model as the tool docstring.
/// - `parameters_schema()` returns a JSON Schema object for the arguments.
/// - `invoke()` receives the argument object and returns the tool's text
///   output (JSON-encoded when structured).
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn invoke(&self, params: Value) -> Result<String>;
}

/// Central registry mapping tool names → trait objects.
/// Build once at startup, then share via Arc.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool. Panics if the name is already registered.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        assert!(
            !self.tools.contains_key(&name),
            "Duplicate tool name: {name}"
        );
        self.order.push(name.clone());
        self.tools.insert(name, Arc::new(tool));
    }

    /// Invoke a registered tool by name.
    pub async fn invoke(&self, name: &str, params: Value) -> Result<String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: {name}"))?;

        tracing::info!(tool = name, "invoking tool");
        tool.invoke(params).await
    }

    /// Advertised tools in registration order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| ToolDescriptor {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.parameters_schema(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl docsense_mcp::server::ToolHandler for ToolRegistry {
    fn server_name(&self) -> &str {
        "docsense-toolbox"
    }

    async fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.descriptors()
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> docsense_common::Result<String> {
        self.invoke(name, arguments)
            .await
            .map_err(docsense_common::DocsenseError::Other)
    }
}

/// Build the default toolbox. Called once at startup by the toolbox binary
/// and by tests.
pub fn build_default_registry(store: Arc<TempStore>) -> ToolRegistry {
    let http = fetch::FetchClient::new(None);
    let mut reg = ToolRegistry::new();
    reg.register(fetch::StructuredTextTool::new(http.clone()));
    reg.register(fetch::PageMetadataTool::new(http));
    reg.register(document::PdfToMarkdownTool::new(store.clone()));
    reg.register(document::ExtractTextAndImagesTool::new());
    reg.register(document::LoadImageTool::new());
    reg.register(report::WriteMarkdownTool::new());
    reg.register(calculate::CalculateTool::new());
    tracing::info!("tool registry ready with {} tools", reg.len());
    reg
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes the input params back."
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({
                "type": "object",
                "properties": { "message": { "type": "string" } },
                "required": ["message"]
            })
        }
        async fn invoke(&self, params: Value) -> Result<String> {
            Ok(params["message"].as_str().unwrap_or("").to_string())
        }
    }

    #[tokio::test]
    async fn register_and_invoke() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool);
        assert_eq!(reg.len(), 1);

        let out = reg
            .invoke("echo", serde_json::json!({ "message": "hello" }))
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn unknown_tool_errors() {
        let reg = ToolRegistry::new();
        let err = reg.invoke("nonexistent", serde_json::json!({})).await;
        assert!(err.is_err());
        assert!(err.unwrap_err().to_string().contains("Unknown tool"));
    }

    #[test]
    fn descriptors_keep_registration_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            TempStore::new(dir.path().join("t"), 100, std::time::Duration::from_secs(60)).unwrap(),
        );
        let reg = build_default_registry(store);
        let names: Vec<String> = reg.descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec![
                "fetch_structured_text",
                "fetch_page_metadata",
                "pdf_to_markdown",
                "extract_text_and_images",
                "load_image",
                "write_markdown",
                "calculate",
            ]
        );
    }

    #[test]
    #[should_panic(expected = "Duplicate tool name")]
    fn duplicate_registration_panics() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool);
        reg.register(EchoTool);
    }
}
