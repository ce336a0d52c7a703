//! Connected-tool listing.

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::SharedState;

pub async fn tools_list(State(state): State<SharedState>) -> Json<Value> {
    let session = state.session.lock().await;
    Json(json!({ "tools": session.tool_names() }))
}
