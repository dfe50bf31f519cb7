//! Settings file management

use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::errors::AgentError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Agent settings, loaded from a JSON file. Every field has a default so an
/// empty object is a valid settings file.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,

    /// Directory for a rolling log file
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Identity of the site this agent fronts
    #[serde(default)]
    pub site_name: String,

    /// Gateway listener configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Remote scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerSettings,

    /// Deployer configuration
    #[serde(default)]
    pub deployer: DeployerSettings,

    /// Upper bound on a graceful shutdown, in seconds
    #[serde(default = "default_max_shutdown_delay")]
    pub max_shutdown_delay_secs: u64,
}

fn default_max_shutdown_delay() -> u64 {
    15
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            site_name: String::new(),
            server: ServerSettings::default(),
            scheduler: SchedulerSettings::default(),
            deployer: DeployerSettings::default(),
            max_shutdown_delay_secs: default_max_shutdown_delay(),
        }
    }
}

impl Settings {
    /// Reads the settings file at `path`
    pub async fn load(path: &Path) -> Result<Self, AgentError> {
        File::new(path).read_json().await.map_err(|e| {
            AgentError::ConfigError(format!("failed to load {}: {}", path.display(), e))
        })
    }
}

/// Gateway listener settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Remote scheduler settings
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    /// Base URL of the scheduler, e.g. `http://marathon.mesos:8080`
    #[serde(default)]
    pub url: String,

    /// Basic auth user name
    #[serde(default)]
    pub username: Option<String>,

    /// Basic auth password
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,

    /// Per request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: None,
            password: None,
            timeout_secs: default_request_timeout(),
        }
    }
}

/// Deployer settings
#[derive(Debug, Clone, Deserialize)]
pub struct DeployerSettings {
    /// Root of the record store
    #[serde(default = "default_records_dir")]
    pub records_dir: PathBuf,

    /// Convergence poll interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Minimum convergence deadline in seconds
    #[serde(default = "default_base_timeout")]
    pub base_timeout_secs: u64,

    /// Per request timeout towards the site agent, in seconds
    #[serde(default = "default_request_timeout")]
    pub client_timeout_secs: u64,
}

fn default_records_dir() -> PathBuf {
    PathBuf::from("/var/lib/siteagent")
}

fn default_poll_interval() -> u64 {
    2
}

fn default_base_timeout() -> u64 {
    360
}

impl Default for DeployerSettings {
    fn default() -> Self {
        Self {
            records_dir: default_records_dir(),
            poll_interval_secs: default_poll_interval(),
            base_timeout_secs: default_base_timeout(),
            client_timeout_secs: default_request_timeout(),
        }
    }
}
