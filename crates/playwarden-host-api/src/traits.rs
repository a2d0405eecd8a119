//! Process registry traits

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors from process registry operations.
///
/// These never cross the [`ProcessRegistry`] boundary: implementations fold
/// them into a `false` result and log them.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Signal failed: {0}")]
    SignalFailed(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// How tracked processes are terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    /// Ask politely, wait up to `timeout`, then force
    Graceful { timeout: Duration },
    /// Force immediate termination
    Force,
}

impl Default for StopMode {
    fn default() -> Self {
        Self::Graceful {
            timeout: Duration::from_millis(500),
        }
    }
}

/// View of the operating system's live process list, keyed by process name.
///
/// Names are matched with [`process_name_matches`](crate::process_name_matches).
#[async_trait]
pub trait ProcessRegistry: Send + Sync {
    /// True if any live process matches `name`
    async fn is_running(&self, name: &str) -> bool;

    /// Terminate every live process matching `name`.
    ///
    /// Returns true if at least one match was found and every termination
    /// succeeded. Returns false on no match or on any failure.
    async fn kill(&self, name: &str) -> bool;
}
