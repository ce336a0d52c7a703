//! Shared application state for the web server.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};

use docsense_agent::ChatSession;
use docsense_common::temp::TempStore;
use docsense_llm::audit::AuditLog;

/// Events pushed to connected clients via SSE.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// A query finished and the transcript changed
    QueryAnswered { latency_ms: u64 },
    /// A file landed in the scratch store
    FileUploaded { name: String, size: u64 },
    /// Conversation history was cleared
    HistoryCleared,
    /// General system notification
    Notification { level: String, message: String },
}

/// Shared state injected into every Axum handler.
pub struct AppState {
    /// The chat engine. One query runs at a time; the lock is the queue.
    pub session: Mutex<ChatSession>,
    pub temp: Arc<TempStore>,
    pub audit: Arc<AuditLog>,
    /// Broadcast channel for SSE push events
    pub event_tx: broadcast::Sender<AppEvent>,
    pub model: String,
    pub use_local_agent: bool,
}

impl AppState {
    pub fn new(
        session: ChatSession,
        temp: Arc<TempStore>,
        audit: Arc<AuditLog>,
        model: String,
        use_local_agent: bool,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            session: Mutex::new(session),
            temp,
            audit,
            event_tx,
            model,
            use_local_agent,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.event_tx.subscribe()
    }

    pub fn publish(&self, event: AppEvent) {
        let _ = self.event_tx.send(event);
    }
}

pub type SharedState = Arc<AppState>;
