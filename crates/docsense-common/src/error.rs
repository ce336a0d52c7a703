use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocsenseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("RPC error [{code}]: {message}")]
    Rpc { code: i32, message: String },

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Server not found: {0}")]
    ServerNotFound(String),

    #[error("Server already connected: {0}")]
    ServerAlreadyConnected(String),

    #[error("Server unavailable: {0}")]
    ServerUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DocsenseError>;
