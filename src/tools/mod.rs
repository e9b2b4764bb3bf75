//! Vault Tool Subsystem
//!
//! The command gateway and the tree renderer, plus the pieces they share.
//!
//! # Guarantees
//!
//! - **Vault check first**: unknown vault names are rejected before anything else
//! - **Whitelist before spawn**: a rejected command never starts a process
//! - **Timeout enforcement**: timed out commands are killed, with their process group
//! - **Bounded output**: only the tail of long output is kept
//! - **Errors as data**: every failure comes back inside the result value
//!
//! The command line is handed to a shell, so pipes and operators work. The
//! whitelist only checks the first token; it is a coarse filter, not a
//! sandbox.
//!
//! # Architecture
//!
//! - `whitelist.rs`: permitted command names
//! - `executor.rs`: the command gateway
//! - `timeout.rs`: timeout management
//! - `tree.rs`: directory tree rendering
//! - `service.rs`: facade used by the transports
//!
//! # Example
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//! use vaultgate::tools::{GatewayConfig, VaultTools, Whitelist};
//! use vaultgate::vault::VaultRegistry;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut vaults = BTreeMap::new();
//!     vaults.insert("notes".to_string(), "/srv/notes".into());
//!
//!     let tools = VaultTools::new(
//!         Arc::new(VaultRegistry::new(vaults)?),
//!         Arc::new(Whitelist::from_commands(["ls", "cat"])),
//!         GatewayConfig::default(),
//!     );
//!
//!     let result = tools.execute_bash("notes", "ls -la").await;
//!     println!("success: {}", result.success);
//!     println!("{}", result.output);
//!
//!     Ok(())
//! }
//! ```

mod error;
mod executor;
mod service;
mod timeout;
mod tree;
mod whitelist;

pub use error::ToolError;
pub use executor::{
    combine_output, truncate_tail, CommandGateway, ExecutionResult, GatewayConfig,
    DEFAULT_MAX_OUTPUT_SIZE, STDERR_DIVIDER, TRUNCATION_MARKER,
};
pub use service::VaultTools;
pub use timeout::ExecutionTimeout;
pub use tree::{render_path, TreeRenderer, TreeResult};
pub use whitelist::{base_command, Whitelist};
