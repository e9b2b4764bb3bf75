//! Vaultgate Library
//!
//! Remote command and tree access to named document vaults, served over MCP.
//! The tool layer (`tools`) is usable on its own; `mcp` puts a JSON-RPC
//! surface on top of it.

pub mod config;
pub mod logging;
pub mod mcp;
pub mod metrics;
pub mod tools;
pub mod vault;
