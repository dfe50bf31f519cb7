//! Application configuration options

use std::time::Duration;

use secrecy::SecretString;

use crate::deploy::wait::WaitSettings;
use crate::errors::AgentError;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;

/// Gateway options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Site identity every request must name
    pub site_name: String,

    /// Server configuration
    pub server: ServerOptions,

    /// Remote scheduler configuration
    pub scheduler: SchedulerOptions,
}

impl AppOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            lifecycle: LifecycleOptions {
                max_shutdown_delay: Duration::from_secs(settings.max_shutdown_delay_secs),
            },
            site_name: settings.site_name.clone(),
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            scheduler: SchedulerOptions {
                url: settings.scheduler.url.clone(),
                username: settings.scheduler.username.clone(),
                password: settings.scheduler.password.clone(),
                timeout: Duration::from_secs(settings.scheduler.timeout_secs),
            },
        }
    }

    /// Rejects options the gateway cannot serve with
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.site_name.trim().is_empty() {
            return Err(AgentError::ConfigError("site name is required".to_string()));
        }
        if self.scheduler.url.trim().is_empty() {
            return Err(AgentError::ConfigError(
                "scheduler url is required".to_string(),
            ));
        }
        if self.scheduler.username.is_some() != self.scheduler.password.is_some() {
            return Err(AgentError::ConfigError(
                "scheduler username and password must be set together".to_string(),
            ));
        }
        Ok(())
    }
}

/// Lifecycle options for the gateway
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(15),
        }
    }
}

/// Gateway HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on, 0 picks a free port
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Remote scheduler client options
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Base URL of the scheduler
    pub url: String,

    /// Basic auth user name
    pub username: Option<String>,

    /// Basic auth password
    pub password: Option<SecretString>,

    /// Per request timeout
    pub timeout: Duration,
}

/// Options of one deployer run
#[derive(Debug, Clone)]
pub struct DeployerOptions {
    /// Record store layout
    pub layout: StorageLayout,

    /// Namespace of the deployment record
    pub namespace: String,

    /// Name of the deployment record
    pub deployment: String,

    /// Convergence polling
    pub wait: WaitSettings,

    /// Per request timeout towards the site agent
    pub client_timeout: Duration,
}

impl DeployerOptions {
    pub fn from_settings(settings: &Settings, namespace: String, deployment: String) -> Self {
        Self {
            layout: StorageLayout::new(settings.deployer.records_dir.clone()),
            namespace,
            deployment,
            wait: WaitSettings {
                interval: Duration::from_secs(settings.deployer.poll_interval_secs),
                base_timeout: Duration::from_secs(settings.deployer.base_timeout_secs),
            },
            client_timeout: Duration::from_secs(settings.deployer.client_timeout_secs),
        }
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        if self.namespace.trim().is_empty() || self.deployment.trim().is_empty() {
            return Err(AgentError::ConfigError(
                "deployment name and namespace are required".to_string(),
            ));
        }
        if self.wait.interval.is_zero() {
            return Err(AgentError::ConfigError(
                "poll interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
