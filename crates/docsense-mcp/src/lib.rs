pub mod client;
pub mod manager;
pub mod protocol;
pub mod registry;
pub mod server;

pub use client::{RpcChannel, ServerSpec, StdioClient};
pub use manager::McpManager;
pub use protocol::{RpcError, RpcRequest, RpcResponse, ToolDescriptor};
pub use registry::{RegistryFile, ServerEntry};
pub use server::ToolHandler;
