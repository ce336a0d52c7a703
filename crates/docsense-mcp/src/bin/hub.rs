//! docsense-hub — aggregate every tool server from registry.json behind a
//! single MCP stdio server. This is the headless deployment mode: a remote
//! client speaks to one process and the hub forwards each call to the
//! owning backend server.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use docsense_common::Result;
use docsense_mcp::registry::{connect_registry, registry_path, RegistryFile};
use docsense_mcp::server::{run_stdio, ToolHandler};
use docsense_mcp::{McpManager, ToolDescriptor};

struct HubHandler {
    manager: Mutex<McpManager>,
}

#[async_trait]
impl ToolHandler for HubHandler {
    fn server_name(&self) -> &str {
        "docsense-hub"
    }

    async fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.manager.lock().await.descriptors().to_vec()
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
        self.manager.lock().await.call_tool(name, arguments).await
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout is the wire; logs must go to stderr only.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docsense=info")),
        )
        .init();

    let path = registry_path();
    let registry = RegistryFile::load(&path).map_err(|e| {
        anyhow::anyhow!("cannot read registry {}: {e}", path.display())
    })?;

    let mut manager = McpManager::new();
    connect_registry(&mut manager, &registry).await;

    if manager.is_empty() {
        tracing::warn!("no tool servers connected, hub will advertise an empty tool list");
    } else {
        tracing::info!(
            servers = manager.server_count(),
            tools = manager.descriptors().len(),
            "hub ready"
        );
    }

    let handler = HubHandler {
        manager: Mutex::new(manager),
    };
    run_stdio(&handler).await?;

    handler.manager.lock().await.shutdown().await;
    Ok(())
}
