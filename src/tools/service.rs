//! Vault tool facade shared by every transport

use super::executor::{CommandGateway, ExecutionResult, GatewayConfig};
use super::tree::{TreeRenderer, TreeResult};
use super::whitelist::Whitelist;
use crate::config::Config;
use crate::vault::VaultRegistry;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// The three operations exposed to remote callers
///
/// Cloning is cheap: the registry and whitelist are shared, immutable values.
#[derive(Debug, Clone)]
pub struct VaultTools {
    vaults: Arc<VaultRegistry>,
    gateway: CommandGateway,
    renderer: TreeRenderer,
}

impl VaultTools {
    pub fn new(vaults: Arc<VaultRegistry>, whitelist: Arc<Whitelist>, config: GatewayConfig) -> Self {
        Self {
            gateway: CommandGateway::new(vaults.clone(), whitelist, config),
            renderer: TreeRenderer::new(vaults.clone()),
            vaults,
        }
    }

    /// Build the tools from loaded configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configured vault path is missing or not a directory.
    pub fn from_config(config: &Config) -> Result<Self> {
        let vaults = Arc::new(VaultRegistry::new(config.vaults.clone())?);

        let whitelist = if config.execution.whitelist_enabled {
            Whitelist::load(&config.execution.whitelist_path)
        } else {
            Whitelist::default()
        };
        info!(
            "Loaded {} vault(s), whitelist {} ({} commands)",
            vaults.len(),
            if config.execution.whitelist_enabled { "enabled" } else { "disabled" },
            whitelist.len()
        );

        Ok(Self::new(vaults, Arc::new(whitelist), config.execution.gateway_config()))
    }

    /// Run a shell command inside a vault
    pub async fn execute_bash(&self, vault: &str, command: &str) -> ExecutionResult {
        self.gateway.execute(vault, command).await
    }

    /// Render a vault's directory tree
    pub async fn get_tree(&self, vault: &str, include_files: bool) -> TreeResult {
        self.renderer.render(vault, include_files).await
    }

    /// Sorted vault names
    pub fn list_vaults(&self) -> Vec<String> {
        self.vaults.names()
    }

    pub fn vaults(&self) -> &VaultRegistry {
        &self.vaults
    }

    pub fn gateway_config(&self) -> &GatewayConfig {
        self.gateway.config()
    }
}
