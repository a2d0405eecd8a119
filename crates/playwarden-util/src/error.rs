//! Error types for playwarden

use thiserror::Error;

/// Core error type for playwarden operations
#[derive(Debug, Error)]
pub enum PlaywardenError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Supervisor has not been configured")]
    NotConfigured,

    #[error("Supervisor is already running; stop it before starting or reconfiguring")]
    AlreadyRunning,

    #[error("Supervisor is not running")]
    NotRunning,

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaywardenError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, PlaywardenError>;
