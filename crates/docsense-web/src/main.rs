//! docsense — document-analysis agent over MCP tool calls.
//! Entry point for the web front-end binary.

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use tracing::info;
use tracing_subscriber::EnvFilter;

use docsense_agent::config::{load_pipelines, Config};
use docsense_agent::ChatSession;
use docsense_common::temp::TempStore;
use docsense_llm::audit::AuditLog;
use docsense_llm::backend::{LlmBackend, OllamaBackend, OpenAiCompatibleBackend};
use docsense_llm::router::PipelineRouter;
use docsense_mcp::registry::{connect_registry, registry_path, RegistryFile};
use docsense_mcp::McpManager;

/// Build the router when the local-agent switch is on and a pipelines
/// table is present.
fn build_pipeline_router(config: &Config) -> Option<PipelineRouter> {
    if !config.use_local_agent {
        return None;
    }

    let path = std::path::Path::new(&config.router.pipelines_path);
    let pipelines = match load_pipelines(path) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "USE_LOCAL_AGENT is set but pipelines.json is unusable; router disabled"
            );
            return None;
        }
    };

    let backend = OllamaBackend::new(config.router.base_url.clone(), config.router_model.clone());
    info!(
        model = %config.router_model,
        endpoint = %config.router.base_url,
        pipelines = pipelines.len(),
        "local router model enabled"
    );
    Some(PipelineRouter::new(
        Arc::new(backend),
        pipelines,
        config.router.threshold,
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("docsense=debug,info")),
        )
        .init();

    info!("docsense starting up...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = match Config::load() {
        Ok(c) => {
            info!(
                model = %c.model,
                base_url = %c.base_url,
                local_agent = c.use_local_agent,
                "configuration loaded"
            );
            c
        }
        Err(e) => {
            tracing::warn!("Could not load configuration: {e}");
            tracing::warn!("Set ARK_API_KEY and ARK_MODEL in the environment or a .env file.");
            return Ok(());
        }
    };

    // Scratch store, wiped on startup
    let temp = Arc::new(TempStore::new(
        config.temp.root.clone(),
        config.temp.max_mb,
        Duration::from_secs(config.temp.ttl_secs),
    )?);
    temp.clear_all()?;

    // Connect MCP tool servers from registry.json
    let mut manager = McpManager::new();
    let reg_path = registry_path();
    match RegistryFile::load(&reg_path) {
        Ok(registry) => connect_registry(&mut manager, &registry).await,
        Err(e) => {
            tracing::warn!(path = %reg_path.display(), error = %e, "no tool registry loaded");
        }
    }
    if manager.is_empty() {
        tracing::warn!("no tool servers connected; the agent will answer without tools");
    } else {
        info!(
            servers = manager.server_count(),
            tools = manager.descriptors().len(),
            "tool servers ready"
        );
    }

    // Remote chat backend (Ark / OpenAI-compatible)
    let backend: Arc<dyn LlmBackend> = Arc::new(OpenAiCompatibleBackend::new(
        config.base_url.clone(),
        config.model.clone(),
        Some(config.api_key.expose_secret().to_string()),
    ));

    let router = build_pipeline_router(&config);
    let audit = Arc::new(AuditLog::default());

    let session = ChatSession::new(
        backend,
        Box::new(manager),
        router,
        audit.clone(),
        temp.clone(),
        config.session.max_rounds,
        config.session.recent_questions,
    );

    // Build app state and router
    let state = docsense_web::state::AppState::new(
        session,
        temp,
        audit,
        config.model.clone(),
        config.use_local_agent,
    );
    let app = docsense_web::router::build_router(state);

    // Start web server
    let listener = tokio::net::TcpListener::bind(&config.web.bind).await?;
    info!("Web UI listening on http://{}", config.web.bind);
    info!("docsense ready. Press Ctrl+C to stop.");

    axum::serve(listener, app).await?;

    Ok(())
}
