//! Chat page and query endpoint.

use std::time::Instant;

use axum::extract::{Json, State};
use axum::response::Html;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::{AppEvent, SharedState};

pub async fn chat_page(State(_state): State<SharedState>) -> Html<&'static str> {
    Html(include_str!("../../templates/chat.html"))
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

#[derive(Debug, Deserialize)]
pub struct ChatSubmit {
    pub message: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

pub async fn chat_submit(
    State(state): State<SharedState>,
    Json(payload): Json<ChatSubmit>,
) -> Json<Value> {
    let query = payload.message.trim();
    if query.is_empty() {
        let session = state.session.lock().await;
        return Json(json!({
            "transcript": session.transcript(),
            "files": session.uploaded_files(),
        }));
    }

    let started = Instant::now();
    let mut session = state.session.lock().await;
    let outcome = session
        .process_query(query, payload.temperature, payload.max_tokens)
        .await;

    let error = match outcome {
        Ok(_) => {
            state.publish(AppEvent::QueryAnswered {
                latency_ms: started.elapsed().as_millis() as u64,
            });
            None
        }
        Err(e) => {
            tracing::error!(error = %e, "query failed");
            session.record_error(query, &e.to_string());
            state.publish(AppEvent::Notification {
                level: "error".to_string(),
                message: e.to_string(),
            });
            Some(e.to_string())
        }
    };

    Json(json!({
        "transcript": session.transcript(),
        "files": session.uploaded_files(),
        "error": error,
    }))
}

pub async fn history_clear(State(state): State<SharedState>) -> Json<Value> {
    let mut session = state.session.lock().await;
    session.clear_history();
    state.publish(AppEvent::HistoryCleared);
    Json(json!({ "transcript": session.transcript() }))
}
