pub mod config;
pub mod session;

pub use config::Config;
pub use session::{ChatSession, ToolDispatcher, UploadedFile};
