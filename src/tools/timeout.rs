//! Execution Timeout Management
//!
//! This module provides the wall-clock bound applied to every command.

use super::error::ToolError;
use std::time::Duration;
use tokio::time;

/// Execution timeout configuration
///
/// Timeouts are enforced to prevent commands from hanging indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTimeout {
    /// The timeout duration
    duration: Duration,
}

impl Default for ExecutionTimeout {
    fn default() -> Self {
        Self::from_secs(30)
    }
}

impl ExecutionTimeout {
    /// Create a new execution timeout
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use vaultgate::tools::ExecutionTimeout;
    ///
    /// let timeout = ExecutionTimeout::new(Duration::from_secs(30));
    /// assert_eq!(timeout.as_secs(), 30);
    /// ```
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Create a timeout from seconds
    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Get the timeout duration
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Whole seconds, as reported to callers
    pub fn as_secs(&self) -> u64 {
        self.duration.as_secs()
    }

    /// Drive a future to completion or give up when the timeout elapses
    ///
    /// The future is dropped on timeout; callers that own OS resources inside
    /// it must reclaim them themselves.
    pub async fn run<F, T>(&self, future: F) -> Result<T, ToolError>
    where
        F: std::future::Future<Output = T>,
    {
        time::timeout(self.duration, future)
            .await
            .map_err(|_| ToolError::Timeout(self.as_secs()))
    }
}
