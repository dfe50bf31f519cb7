//! Error types for the site agent

use thiserror::Error;

/// Main error type for the site agent and the deployer
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("the specified site ({requested}) does not match the configured site ({configured})")]
    SiteMismatch {
        requested: String,
        configured: String,
    },

    #[error("Tenant violation: {0}")]
    TenantViolation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Scheduler rejected the request: {0}")]
    SchedulerRejection(String),

    #[error("Scheduler error: {0}")]
    SchedulerError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Deployment error: {0}")]
    DeployError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AgentError::NotFound(_))
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Internal(err.to_string())
    }
}
