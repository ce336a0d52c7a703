//! File upload: multipart parts land in the scratch store and join the
//! session's uploaded-file list for the next query.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde_json::json;

use docsense_agent::UploadedFile;
use docsense_common::sanitize::sanitize_filename;

use crate::state::{AppEvent, SharedState};

pub async fn upload(State(state): State<SharedState>, mut multipart: Multipart) -> impl IntoResponse {
    let mut stored = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(e) => {
                return (StatusCode::BAD_REQUEST, format!("invalid multipart body: {e}"))
                    .into_response()
            }
        };

        let Some(file_name) = field.file_name().map(sanitize_filename) else {
            continue;
        };

        let bytes = match field.bytes().await {
            Ok(b) => b,
            Err(e) => {
                return (StatusCode::BAD_REQUEST, format!("failed to read upload: {e}"))
                    .into_response()
            }
        };

        let path = state.temp.allocate(&format!("-{file_name}"));
        if let Err(e) = std::fs::write(&path, &bytes) {
            tracing::error!(error = %e, path = %path.display(), "failed to store upload");
            return (StatusCode::INTERNAL_SERVER_ERROR, "failed to store upload").into_response();
        }

        let file_type = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        tracing::info!(name = %file_name, size = bytes.len(), "stored uploaded file");
        state.publish(AppEvent::FileUploaded {
            name: file_name.clone(),
            size: bytes.len() as u64,
        });

        stored.push(UploadedFile {
            name: file_name,
            path,
            size: bytes.len() as u64,
            file_type,
        });
    }

    let mut session = state.session.lock().await;
    for file in stored {
        session.add_uploaded_file(file);
    }
    Json(json!({ "files": session.uploaded_files() })).into_response()
}

pub async fn files_clear(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let mut session = state.session.lock().await;
    session.clear_files();
    Json(json!({ "files": session.uploaded_files() }))
}
