//! Servidor MCP do Lore.
//!
//! Expõe a base de conhecimento a clientes MCP como tools via JSON-RPC
//! delimitado por linhas no stdio.
//!
//! ## Exemplo
//!
//! ```ignore
//! use std::sync::Arc;
//! use lore::mcp::McpServer;
//! use lore::{Config, KnowledgeBase};
//!
//! #[tokio::main]
//! async fn main() -> lore::LoreResult<()> {
//!     let knowledge = KnowledgeBase::open(Config::load_or_default()).await?;
//!     McpServer::stdio(Arc::new(knowledge)).run().await
//! }
//! ```

mod protocol;
mod server;
mod tools;
mod transport;

pub use protocol::{
    CallToolParams, InitializeResult, JsonRpcError, JsonRpcId, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, ServerCapabilities, ServerInfo, ToolContent, ToolDescription, ToolResult,
    ToolsCapability, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
    PARSE_ERROR, PROTOCOL_VERSION,
};

pub use server::McpServer;
pub use tools::ToolHandler;
pub use transport::{Incoming, LineTransport, StdioTransport};
