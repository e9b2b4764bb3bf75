//! Command Gateway
//!
//! Runs an untrusted command line inside a vault directory. The vault is
//! resolved first, the whitelist is consulted next, and only then is a shell
//! spawned. The child runs with a wall-clock bound, its two output streams are
//! decoded lossily and merged, and the merged text is cut down to its tail if
//! it is too long.
//!
//! Every failure is folded into the returned [`ExecutionResult`]; nothing is
//! raised to the caller.

use super::error::ToolError;
use super::timeout::ExecutionTimeout;
use super::whitelist::{base_command, Whitelist};
use crate::metrics;
use crate::vault::VaultRegistry;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Prefix placed in front of output that lost its head
pub const TRUNCATION_MARKER: &str = "... [output truncated] ...\n";

/// Divider between standard output and standard error
pub const STDERR_DIVIDER: &str = "\n--- stderr ---\n";

/// Default cap on retained output, in characters
pub const DEFAULT_MAX_OUTPUT_SIZE: usize = 100_000;

/// Outcome of one gateway call
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Standard output, followed by standard error when there was any
    pub output: String,

    /// Empty on success
    pub error: String,

    /// True iff the process exited with status zero
    pub success: bool,

    /// Whether the head of `output` was dropped
    pub truncated: bool,
}

impl ExecutionResult {
    /// Result for a call that never produced output
    pub fn from_error(error: &ToolError) -> Self {
        Self {
            output: String::new(),
            error: error.to_string(),
            success: false,
            truncated: false,
        }
    }
}

/// Configuration for the gateway
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Wall-clock bound per command
    pub timeout: ExecutionTimeout,

    /// Maximum characters of output kept
    pub max_output_size: usize,

    /// Reject commands whose base name is not whitelisted
    pub whitelist_enabled: bool,

    /// Shell used to interpret the command line (`<shell> -c <command>`)
    pub shell: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            timeout: ExecutionTimeout::default(),
            max_output_size: DEFAULT_MAX_OUTPUT_SIZE,
            whitelist_enabled: true,
            shell: "/bin/sh".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Create a new config with custom timeout
    pub fn with_timeout(timeout_secs: u64) -> Self {
        Self {
            timeout: ExecutionTimeout::from_secs(timeout_secs),
            ..Default::default()
        }
    }

    /// Create a new config with custom output limit
    pub fn with_max_output_size(size: usize) -> Self {
        Self {
            max_output_size: size,
            ..Default::default()
        }
    }

    /// Disable whitelist enforcement
    pub fn skip_whitelist(mut self) -> Self {
        self.whitelist_enabled = false;
        self
    }
}

/// Gateway that validates and runs commands inside vaults
#[derive(Debug, Clone)]
pub struct CommandGateway {
    vaults: Arc<VaultRegistry>,
    whitelist: Arc<Whitelist>,
    config: GatewayConfig,
}

impl CommandGateway {
    pub fn new(vaults: Arc<VaultRegistry>, whitelist: Arc<Whitelist>, config: GatewayConfig) -> Self {
        Self {
            vaults,
            whitelist,
            config,
        }
    }

    /// Get a reference to the config
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run `command_line` inside the named vault
    ///
    /// # Example
    ///
    /// ```ignore
    /// let result = gateway.execute("notes", "ls -la").await;
    /// if !result.success {
    ///     eprintln!("{}", result.error);
    /// }
    /// ```
    pub async fn execute(&self, vault_name: &str, command_line: &str) -> ExecutionResult {
        let start = Instant::now();

        let result = match self.run(vault_name, command_line).await {
            Ok(result) => result,
            Err(e) => {
                warn!(vault = %vault_name, kind = e.kind(), "Command rejected or failed: {}", e);
                metrics::record_command(e.kind(), start.elapsed());
                return ExecutionResult::from_error(&e);
            }
        };

        let outcome = if result.success { "success" } else { "non_zero_exit" };
        info!(
            vault = %vault_name,
            success = result.success,
            truncated = result.truncated,
            "Command finished in {:?}",
            start.elapsed()
        );
        metrics::record_command(outcome, start.elapsed());
        result
    }

    async fn run(&self, vault_name: &str, command_line: &str) -> Result<ExecutionResult, ToolError> {
        let vault_path = self.vaults.resolve(vault_name)?;

        if self.config.whitelist_enabled && !self.whitelist.is_allowed(command_line) {
            return Err(ToolError::NotWhitelisted(base_command(command_line)));
        }

        info!("Executing command in vault '{}': {}", vault_name, command_line);

        let mut child = ScopedChild::spawn(&self.config.shell, command_line, vault_path)
            .map_err(|e| ToolError::Spawn(e.to_string()))?;

        let outcome = self.config.timeout.run(child.collect()).await;
        let collected = match outcome {
            Ok(collected) => collected,
            Err(timeout) => {
                warn!("Command timed out after {:?}: {}", self.config.timeout.duration(), command_line);
                child.terminate().await;
                return Err(timeout);
            }
        };
        let (status, stdout, stderr) = collected.map_err(|e| ToolError::Spawn(e.to_string()))?;

        let combined = combine_output(&stdout, &stderr);
        let (output, truncated) = truncate_tail(&combined, self.config.max_output_size);
        if truncated {
            debug!("Output truncated from {} characters", combined.chars().count());
        }

        let error = if status.success() {
            String::new()
        } else {
            ToolError::from_exit_status(&status).to_string()
        };

        Ok(ExecutionResult {
            output,
            error,
            success: status.success(),
            truncated,
        })
    }
}

/// Child process bound to the lifetime of one gateway call
///
/// Dropping the handle before the child has been reaped kills the child and,
/// on unix, its whole process group.
struct ScopedChild {
    child: Child,
    /// Process group id (the child's pid, since it leads its own group)
    pgid: Option<i32>,
    reaped: bool,
}

impl ScopedChild {
    fn spawn(shell: &str, command_line: &str, cwd: &Path) -> io::Result<Self> {
        let mut command = Command::new(shell);
        command
            .arg("-c")
            .arg(command_line)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn()?;
        let pgid = child.id().and_then(|pid| i32::try_from(pid).ok());

        Ok(Self {
            child,
            pgid,
            reaped: false,
        })
    }

    /// Read both streams to the end and wait for exit
    async fn collect(&mut self) -> io::Result<(ExitStatus, Vec<u8>, Vec<u8>)> {
        let mut stdout_pipe = self
            .child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("child stdout not captured"))?;
        let mut stderr_pipe = self
            .child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("child stderr not captured"))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let (out_read, err_read, status) = tokio::join!(
            stdout_pipe.read_to_end(&mut stdout),
            stderr_pipe.read_to_end(&mut stderr),
            self.child.wait()
        );
        out_read?;
        err_read?;
        let status = status?;

        self.reaped = true;
        Ok((status, stdout, stderr))
    }

    /// Kill the process group and the child, then wait for the child to exit
    async fn terminate(&mut self) {
        self.kill_group();
        if let Err(e) = self.child.kill().await {
            warn!("Failed to kill timed out command: {}", e);
        }
        self.reaped = true;
    }

    fn kill_group(&self) {
        #[cfg(unix)]
        {
            if let Some(pgid) = self.pgid {
                // SAFETY: killpg only sends a signal; a stale group id yields ESRCH.
                let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
                if rc != 0 {
                    debug!("killpg({}) failed: {}", pgid, io::Error::last_os_error());
                }
            }
        }
    }
}

impl Drop for ScopedChild {
    fn drop(&mut self) {
        if !self.reaped {
            debug!("Dropping unreaped command, killing process group");
            self.kill_group();
            let _ = self.child.start_kill();
        }
    }
}

/// Decode both streams and join them with the stderr divider
pub fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut combined = String::from_utf8_lossy(stdout).into_owned();
    if !stderr.is_empty() {
        combined.push_str(STDERR_DIVIDER);
        combined.push_str(&String::from_utf8_lossy(stderr));
    }
    combined
}

/// Keep the last `max_chars` characters, prefixed by [`TRUNCATION_MARKER`]
pub fn truncate_tail(text: &str, max_chars: usize) -> (String, bool) {
    let total = text.chars().count();
    if total <= max_chars {
        return (text.to_string(), false);
    }

    let skip = total - max_chars;
    let start = text
        .char_indices()
        .nth(skip)
        .map(|(index, _)| index)
        .unwrap_or(text.len());

    (format!("{}{}", TRUNCATION_MARKER, &text[start..]), true)
}
