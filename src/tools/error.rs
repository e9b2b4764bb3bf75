//! Tool Error Taxonomy
//!
//! Every failure the gateway or the tree renderer can hit is one of these
//! variants. They never escape the public operations as `Err`; instead their
//! `Display` text becomes the `error` field of the returned result.

use std::path::PathBuf;
use std::process::ExitStatus;

/// Errors surfaced by vault tools
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// Requested vault is not in the registry
    #[error("Unknown vault: {name}. Available vaults: {}", .available.join(", "))]
    UnknownVault {
        /// The name the caller asked for
        name: String,
        /// Every vault the registry knows, sorted
        available: Vec<String>,
    },

    /// Base command is not in the whitelist
    #[error("Command '{0}' is not whitelisted. Set WHITELIST_ENABLED=false to disable the whitelist.")]
    NotWhitelisted(String),

    /// Process ran past the configured timeout and was killed
    #[error("Command timed out after {0} seconds")]
    Timeout(u64),

    /// Process completed with a non-zero status or was killed by a signal
    #[error("{}", exit_message(.code, .signal))]
    NonZeroExit {
        /// Exit code, when the process exited normally
        code: Option<i32>,
        /// Terminating signal number (unix)
        signal: Option<i32>,
    },

    /// OS-level failure starting or talking to the process
    #[error("Execution error: {0}")]
    Spawn(String),

    /// Vault root itself could not be listed
    #[error("Permission denied accessing vault: {}", .0.display())]
    PermissionDenied(PathBuf),

    /// Any other failure while walking a vault
    #[error("Error generating tree: {0}")]
    Traversal(String),
}

fn exit_message(code: &Option<i32>, signal: &Option<i32>) -> String {
    match (*code, *signal) {
        (Some(code), _) => format!("Command exited with code {code}"),
        (None, Some(signal)) => format!("Command terminated by signal {signal}"),
        (None, None) => "Command terminated abnormally".to_string(),
    }
}

impl ToolError {
    /// Describe an unsuccessful exit status
    pub fn from_exit_status(status: &ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(status);
        #[cfg(not(unix))]
        let signal = None;

        Self::NonZeroExit {
            code: status.code(),
            signal,
        }
    }

    /// Short label used for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownVault { .. } => "unknown_vault",
            Self::NotWhitelisted(_) => "not_whitelisted",
            Self::Timeout(_) => "timeout",
            Self::NonZeroExit { .. } => "non_zero_exit",
            Self::Spawn(_) => "spawn_error",
            Self::PermissionDenied(_) => "permission_denied",
            Self::Traversal(_) => "traversal_error",
        }
    }
}
