//! MCP (Model Context Protocol) Server
//!
//! Exposes the vault tools to MCP clients.
//!
//! # Architecture
//!
//! 1. **Protocol Layer** (`protocol`): JSON-RPC 2.0 message types
//! 2. **Dispatch Layer** (`server`): method routing and tool result rendering
//! 3. **Transport Layer** (`http`, `stdio`): how messages arrive
//!
//! The dispatcher knows nothing about transports; both transports share one
//! `McpServer`.

// Protocol layer: JSON-RPC 2.0 message types
pub mod protocol;

// Dispatch layer
pub mod server;

// Transports
pub mod http;
pub mod stdio;

pub use protocol::{
    CallToolResult, Content, McpError, McpMethod, McpRequest, McpResponse, ServerCapabilities,
    ServerInfo, Tool, ToolCallParams,
};
pub use server::{McpServer, SERVER_NAME};
