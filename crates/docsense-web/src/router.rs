//! Axum router — maps all URL paths to handlers.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{
    chat::{chat_page, chat_submit, history_clear},
    system::system_status,
    tools::tools_list,
    upload::{files_clear, upload},
};
use crate::sse::sse_handler;
use crate::state::{AppState, SharedState};

/// Build and return the full Axum router.
pub fn build_router(state: AppState) -> Router {
    let shared: SharedState = Arc::new(state);

    Router::new()
        // Pages
        .route("/", get(chat_page))

        // SSE streaming
        .route("/api/events", get(sse_handler))

        // API endpoints
        .route("/api/chat", post(chat_submit))
        .route("/api/upload", post(upload))
        .route("/api/tools", get(tools_list))
        .route("/api/history/clear", post(history_clear))
        .route("/api/files/clear", post(files_clear))
        .route("/api/system", get(system_status))

        // Middleware
        .layer(DefaultBodyLimit::max(64 * 1024 * 1024))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}
