// Vaultgate - Main Entry Point
//
// CLI for the vault gateway:
// - MCP server over HTTP or stdio
// - One-shot command execution and tree rendering
// - Configuration checks

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use vaultgate::config::{Config, DEFAULT_CONFIG_FILE};
use vaultgate::logging;
use vaultgate::mcp::{http, stdio, McpServer};
use vaultgate::tools::VaultTools;

/// Vaultgate: shell and tree access to document vaults over MCP
#[derive(Parser, Debug)]
#[command(name = "vaultgate")]
#[command(version)]
#[command(about = "Run commands and render trees inside named vaults, served over MCP", long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "VAULTGATE_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve MCP over HTTP
    Serve,
    /// Serve MCP over stdin/stdout
    Stdio,
    /// Run one command inside a vault
    Exec {
        /// Vault name
        vault: String,
        /// Command line, interpreted by the configured shell
        command: String,
    },
    /// Print a vault's directory tree
    Tree {
        /// Vault name
        vault: String,
        /// Only show directories
        #[arg(long)]
        dirs_only: bool,
    },
    /// List configured vaults
    Vaults,
    /// Validate configuration and vault paths
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let config = Config::load_from_path(&args.config)
        .with_context(|| format!("Failed to load configuration from {:?}", args.config))?;

    let to_stderr = !matches!(args.command, Commands::Serve);
    logging::init_tracing(&config.logging, args.verbose, to_stderr)?;

    let tools = VaultTools::from_config(&config)?;

    match args.command {
        Commands::Serve => {
            info!("Vaultgate v{} starting", env!("CARGO_PKG_VERSION"));
            http::serve(McpServer::new(tools), &config.server).await?;
        }
        Commands::Stdio => {
            stdio::serve_stdio(McpServer::new(tools)).await?;
        }
        Commands::Exec { vault, command } => {
            let result = tools.execute_bash(&vault, &command).await;
            print!("{}", result.output);
            if result.truncated {
                eprintln!("[output truncated]");
            }
            if !result.success {
                eprintln!("Error: {}", result.error);
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Tree { vault, dirs_only } => {
            let result = tools.get_tree(&vault, !dirs_only).await;
            if !result.error.is_empty() {
                eprintln!("Error: {}", result.error);
                return Ok(ExitCode::FAILURE);
            }
            println!("{}", result.tree);
        }
        Commands::Vaults => {
            for name in tools.list_vaults() {
                println!("{}", name);
            }
        }
        Commands::CheckConfig => {
            println!("Configuration OK");
            for vault in tools.vaults().health() {
                println!("  {} -> {}", vault.name, vault.path.display());
            }
            let gateway = tools.gateway_config();
            println!(
                "  timeout: {}s, max output: {} chars, whitelist: {}",
                gateway.timeout.as_secs(),
                gateway.max_output_size,
                if gateway.whitelist_enabled { "enabled" } else { "disabled" }
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}
