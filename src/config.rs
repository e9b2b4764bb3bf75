// Configuration File Support
//
// This module provides configuration file parsing for the vault gateway.
// Supports TOML format with environment variable overrides.
// The file location comes from the CLI (`--config`), defaulting to ./vaultgate.toml.

use crate::tools::{ExecutionTimeout, GatewayConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "vaultgate.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Vault name → root directory
    pub vaults: BTreeMap<String, PathBuf>,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Command execution configuration
    pub execution: ExecutionConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Listen port
    pub port: u16,

    /// Require a bearer token on MCP endpoints
    pub auth_enabled: bool,

    /// Expected bearer token (required when auth_enabled is true)
    pub auth_token: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            auth_enabled: false,
            auth_token: String::new(),
        }
    }
}

/// Command execution configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Wall-clock limit per command, in seconds
    pub command_timeout_secs: u64,

    /// Maximum characters of output returned
    pub max_output_size: usize,

    /// Enforce the command whitelist
    pub whitelist_enabled: bool,

    /// Whitelist file, one command name per line
    pub whitelist_path: PathBuf,

    /// Shell that interprets command lines
    pub shell: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: 30,
            max_output_size: 100_000,
            whitelist_enabled: true,
            whitelist_path: PathBuf::from("whitelist.txt"),
            shell: "/bin/sh".to_string(),
        }
    }
}

impl ExecutionConfig {
    /// Gateway settings derived from this section
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            timeout: ExecutionTimeout::from_secs(self.command_timeout_secs),
            max_output_size: self.max_output_size,
            whitelist_enabled: self.whitelist_enabled,
            shell: self.shell.clone(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,

    /// Also append logs to this file
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from a specific path
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, if an
    /// environment override is malformed, or if the result fails validation.
    /// A missing file is not an error: defaults and environment are used.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::debug!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - VAULTS (JSON object of name → path, replaces the table)
    /// - MCP_HOST, MCP_PORT, MCP_AUTH_ENABLED, MCP_AUTH_TOKEN
    /// - COMMAND_TIMEOUT, MAX_OUTPUT_SIZE, COMMAND_SHELL
    /// - WHITELIST_ENABLED, WHITELIST_PATH
    /// - LOG_LEVEL, LOG_FORMAT, LOG_PATH
    ///
    /// Unparsable numbers are ignored; an unparsable VAULTS value is an error.
    pub fn apply_env_overrides(mut self) -> Result<Self> {
        if let Ok(vaults) = std::env::var("VAULTS") {
            self.vaults = serde_json::from_str(&vaults)
                .context("VAULTS must be a valid JSON object mapping vault names to paths")?;
        }

        // Server overrides
        if let Ok(host) = std::env::var("MCP_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("MCP_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(enabled) = std::env::var("MCP_AUTH_ENABLED") {
            self.server.auth_enabled = parse_flag(&enabled);
        }
        if let Ok(token) = std::env::var("MCP_AUTH_TOKEN") {
            self.server.auth_token = token;
        }

        // Execution overrides
        if let Ok(timeout) = std::env::var("COMMAND_TIMEOUT") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                self.execution.command_timeout_secs = timeout;
            }
        }
        if let Ok(size) = std::env::var("MAX_OUTPUT_SIZE") {
            if let Ok(size) = size.parse::<usize>() {
                self.execution.max_output_size = size;
            }
        }
        if let Ok(shell) = std::env::var("COMMAND_SHELL") {
            self.execution.shell = shell;
        }
        if let Ok(enabled) = std::env::var("WHITELIST_ENABLED") {
            self.execution.whitelist_enabled = parse_flag(&enabled);
        }
        if let Ok(path) = std::env::var("WHITELIST_PATH") {
            self.execution.whitelist_path = PathBuf::from(path);
        }

        // Logging overrides
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.format = format.to_lowercase();
        }
        if let Ok(path) = std::env::var("LOG_PATH") {
            self.logging.log_file = Some(PathBuf::from(path));
        }

        Ok(self)
    }

    /// Validate the configuration
    ///
    /// Vault paths are checked later, when the registry is built.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.vaults.is_empty() {
            anyhow::bail!("At least one vault must be configured (config [vaults] table or VAULTS)");
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Invalid log level: {}. Must be one of: trace, debug, info, warn, error", self.logging.level),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!("Invalid log format: {}. Must be one of: json, pretty, compact", self.logging.format),
        }

        if self.server.auth_enabled && self.server.auth_token.is_empty() {
            anyhow::bail!("MCP_AUTH_TOKEN must be set when MCP_AUTH_ENABLED is true");
        }

        if self.execution.command_timeout_secs == 0 {
            anyhow::bail!("Command timeout must be > 0 seconds");
        }
        if self.execution.max_output_size == 0 {
            anyhow::bail!("Max output size must be > 0");
        }
        if self.execution.shell.trim().is_empty() {
            anyhow::bail!("Command shell must not be empty");
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::NamedTempFile;

    const ENV_VARS: &[&str] = &[
        "VAULTS",
        "MCP_HOST",
        "MCP_PORT",
        "MCP_AUTH_ENABLED",
        "MCP_AUTH_TOKEN",
        "COMMAND_TIMEOUT",
        "MAX_OUTPUT_SIZE",
        "COMMAND_SHELL",
        "WHITELIST_ENABLED",
        "WHITELIST_PATH",
        "LOG_LEVEL",
        "LOG_FORMAT",
        "LOG_PATH",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    fn config_with_vault() -> Config {
        let mut config = Config::default();
        config.vaults.insert("notes".to_string(), PathBuf::from("/tmp"));
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.server.port, 8080);
        assert!(!config.server.auth_enabled);
        assert_eq!(config.execution.command_timeout_secs, 30);
        assert_eq!(config.execution.max_output_size, 100_000);
        assert!(config.execution.whitelist_enabled);
        assert_eq!(config.execution.whitelist_path, PathBuf::from("whitelist.txt"));
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(config_with_vault().validate().is_ok());
    }

    #[test]
    fn test_config_validation_requires_vault() {
        let err = Config::default().validate().unwrap_err().to_string();
        assert!(err.contains("At least one vault"));
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = config_with_vault();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_log_format() {
        let mut config = config_with_vault();
        config.logging.format = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_auth_needs_token() {
        let mut config = config_with_vault();
        config.server.auth_enabled = true;
        assert!(config.validate().is_err());

        config.server.auth_token = "secret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_execution_limits() {
        let mut config = config_with_vault();
        config.execution.command_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = config_with_vault();
        config.execution.max_output_size = 0;
        assert!(config.validate().is_err());

        let mut config = config_with_vault();
        config.execution.shell = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_load_valid_toml_config() {
        clear_env();

        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[vaults]
personal = "/srv/vaults/personal"
work = "/srv/vaults/work"

[server]
port = 9000
auth_enabled = true
auth_token = "s3cret"

[execution]
command_timeout_secs = 10
max_output_size = 5000
whitelist_enabled = false
whitelist_path = "/etc/vaultgate/whitelist.txt"

[logging]
level = "debug"
format = "json"
"#;

        fs::write(temp_file.path(), toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.vaults.len(), 2);
        assert_eq!(config.vaults["work"], PathBuf::from("/srv/vaults/work"));
        assert_eq!(config.server.port, 9000);
        assert!(config.server.auth_enabled);
        assert_eq!(config.execution.command_timeout_secs, 10);
        assert_eq!(config.execution.max_output_size, 5000);
        assert!(!config.execution.whitelist_enabled);
        assert_eq!(config.logging.format, "json");
        // Untouched fields keep defaults
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.execution.shell, "/bin/sh");
    }

    #[test]
    #[serial]
    fn test_load_invalid_toml_config() {
        clear_env();

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[vaults\nnotes = 1").unwrap();

        assert!(Config::load_from_path(temp_file.path()).is_err());
    }

    #[test]
    #[serial]
    fn test_missing_file_uses_env() {
        clear_env();
        std::env::set_var("VAULTS", r#"{"notes": "/tmp"}"#);

        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().with_extension("nonexistent");
        let config = Config::load_from_path(&path).unwrap();

        assert_eq!(config.vaults["notes"], PathBuf::from("/tmp"));
        assert_eq!(config.server.port, 8080);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();

        std::env::set_var("VAULTS", r#"{"a": "/tmp/a", "b": "/tmp/b"}"#);
        std::env::set_var("MCP_PORT", "9100");
        std::env::set_var("MCP_AUTH_ENABLED", "TRUE");
        std::env::set_var("MCP_AUTH_TOKEN", "tok");
        std::env::set_var("COMMAND_TIMEOUT", "5");
        std::env::set_var("MAX_OUTPUT_SIZE", "2048");
        std::env::set_var("WHITELIST_ENABLED", "false");
        std::env::set_var("WHITELIST_PATH", "/etc/wl.txt");
        std::env::set_var("LOG_LEVEL", "DEBUG");
        std::env::set_var("LOG_PATH", "logs/vaultgate.log");

        let config = config_with_vault().apply_env_overrides().unwrap();

        assert_eq!(config.vaults.len(), 2);
        assert!(!config.vaults.contains_key("notes"));
        assert_eq!(config.server.port, 9100);
        assert!(config.server.auth_enabled);
        assert_eq!(config.server.auth_token, "tok");
        assert_eq!(config.execution.command_timeout_secs, 5);
        assert_eq!(config.execution.max_output_size, 2048);
        assert!(!config.execution.whitelist_enabled);
        assert_eq!(config.execution.whitelist_path, PathBuf::from("/etc/wl.txt"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.log_file, Some(PathBuf::from("logs/vaultgate.log")));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_overrides_invalid_values() {
        clear_env();

        std::env::set_var("MCP_PORT", "not-a-port");
        std::env::set_var("COMMAND_TIMEOUT", "-3");

        let config = config_with_vault().apply_env_overrides().unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.execution.command_timeout_secs, 30);

        std::env::set_var("VAULTS", "not json");
        let err = config_with_vault().apply_env_overrides().unwrap_err().to_string();
        assert!(err.contains("VAULTS must be a valid JSON object"));

        clear_env();
    }

    #[test]
    fn test_gateway_config_from_execution() {
        let mut execution = ExecutionConfig::default();
        execution.command_timeout_secs = 3;
        execution.whitelist_enabled = false;

        let gateway = execution.gateway_config();
        assert_eq!(gateway.timeout.as_secs(), 3);
        assert!(!gateway.whitelist_enabled);
        assert_eq!(gateway.max_output_size, 100_000);
    }
}
