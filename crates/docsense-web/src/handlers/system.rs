//! System status: backend mode and the model-call audit trail.

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::SharedState;

pub async fn system_status(State(state): State<SharedState>) -> Json<Value> {
    let mode = if state.use_local_agent {
        "local_router"
    } else {
        "remote_only"
    };
    Json(json!({
        "model": state.model,
        "mode": mode,
        "audit": state.audit.snapshot(),
    }))
}
