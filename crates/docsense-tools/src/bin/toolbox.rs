//! docsense-toolbox — serve the built-in tools over MCP stdio so
//! registry.json can list this binary like any other tool server.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use docsense_common::temp::TempStore;
use docsense_mcp::server::run_stdio;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout is the wire; logs must go to stderr only.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docsense=info")),
        )
        .init();

    let temp_root =
        std::env::var("DOCSENSE_TEMP_DIR").unwrap_or_else(|_| "temp".to_string());
    let store = Arc::new(TempStore::new(
        temp_root,
        300,
        Duration::from_secs(3600),
    )?);

    let registry = docsense_tools::build_default_registry(store);
    run_stdio(&registry).await?;
    Ok(())
}
