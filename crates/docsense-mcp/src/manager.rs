//! Connection manager: owns the tool-server processes and the
//! tool-name → server map used for dispatch.

use std::collections::HashMap;

use serde_json::Value;

use docsense_common::{DocsenseError, Result};

use crate::client::{ServerSpec, StdioClient};
use crate::protocol::ToolDescriptor;

pub struct McpManager {
    servers: HashMap<String, StdioClient>,
    /// tool name → owning server id; first registration wins.
    tools_map: HashMap<String, String>,
    /// Advertised tools in registration order.
    descriptors: Vec<ToolDescriptor>,
}

impl McpManager {
    pub fn new() -> Self {
        Self {
            servers: HashMap::new(),
            tools_map: HashMap::new(),
            descriptors: Vec::new(),
        }
    }

    /// Spawn and register a tool server under `server_id`.
    pub async fn connect(&mut self, server_id: &str, spec: ServerSpec) -> Result<()> {
        if self.servers.contains_key(server_id) {
            return Err(DocsenseError::ServerAlreadyConnected(server_id.to_string()));
        }

        let mut client = StdioClient::connect(&spec).await?;
        let tools = client.list_tools().await?;
        tracing::info!(server = server_id, tools = tools.len(), "connected tool server");

        for tool in tools {
            if self.tools_map.contains_key(&tool.name) {
                tracing::warn!(
                    tool = %tool.name,
                    server = server_id,
                    owner = %self.tools_map[&tool.name],
                    "duplicate tool name, keeping first registration"
                );
                continue;
            }
            self.tools_map.insert(tool.name.clone(), server_id.to_string());
            self.descriptors.push(tool);
        }

        self.servers.insert(server_id.to_string(), client);
        Ok(())
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.descriptors.iter().map(|d| d.name.clone()).collect()
    }

    pub fn server_for(&self, tool: &str) -> Option<&str> {
        self.tools_map.get(tool).map(String::as_str)
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Route a tool call to its owning server.
    pub async fn call_tool(&mut self, tool: &str, arguments: Value) -> Result<String> {
        let server_id = self
            .tools_map
            .get(tool)
            .cloned()
            .ok_or_else(|| DocsenseError::ToolNotFound(tool.to_string()))?;
        let client = self
            .servers
            .get_mut(&server_id)
            .ok_or_else(|| DocsenseError::ServerNotFound(server_id.clone()))?;

        tracing::info!(tool, server = %server_id, "invoking tool");
        client.call_tool(tool, arguments).await
    }

    /// Kill all server processes and clear the maps.
    pub async fn shutdown(&mut self) {
        for (id, mut client) in self.servers.drain() {
            tracing::debug!(server = %id, "stopping tool server");
            client.shutdown().await;
        }
        self.tools_map.clear();
        self.descriptors.clear();
    }
}

impl Default for McpManager {
    fn default() -> Self {
        Self::new()
    }
}
