//! Command line interface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use secrecy::SecretString;

use crate::logs::LogLevel;
use crate::storage::settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "siteagent", about = "Site agent and deployer for a Marathon-compatible scheduler")]
pub struct Cli {
    /// JSON settings file; flags and environment variables override it
    #[arg(long, global = true, env = "SITEAGENT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub logging: LogArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the site agent gateway in front of the scheduler.
    Serve(ServeArgs),

    /// Drive one deployment record onto its site, then exit.
    Deploy(DeployArgs),

    /// Print version information as JSON.
    Version,
}

#[derive(Debug, Args)]
pub struct LogArgs {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<LogLevel>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Directory for a daily rolling log file
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,
}

impl LogArgs {
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(level) = &self.log_level {
            settings.log_level = level.clone();
        }
        if self.log_json {
            settings.log_json = true;
        }
        if let Some(dir) = &self.log_dir {
            settings.log_dir = Some(dir.clone());
        }
    }
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Site this agent fronts; requests naming another site are refused
    #[arg(long, env = "SITEAGENT_SITE_NAME")]
    pub site_name: Option<String>,

    /// Bind host
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port
    #[arg(long, env = "SITEAGENT_PORT")]
    pub port: Option<u16>,

    /// Base URL of the scheduler
    #[arg(long, env = "SITEAGENT_SCHEDULER_URL")]
    pub scheduler_url: Option<String>,

    /// Basic auth user name for the scheduler
    #[arg(long, env = "SITEAGENT_SCHEDULER_USERNAME")]
    pub scheduler_username: Option<String>,

    /// Basic auth password for the scheduler
    #[arg(long, env = "SITEAGENT_SCHEDULER_PASSWORD", hide_env_values = true)]
    pub scheduler_password: Option<String>,
}

impl ServeArgs {
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(site_name) = &self.site_name {
            settings.site_name = site_name.clone();
        }
        if let Some(host) = &self.host {
            settings.server.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(url) = &self.scheduler_url {
            settings.scheduler.url = url.clone();
        }
        if let Some(username) = &self.scheduler_username {
            settings.scheduler.username = Some(username.clone());
        }
        if let Some(password) = &self.scheduler_password {
            settings.scheduler.password = Some(SecretString::from(password.clone()));
        }
    }
}

#[derive(Debug, Args)]
pub struct DeployArgs {
    /// Name of the deployment record
    #[arg(long, env = "SITEAGENT_DEPLOYMENT_NAME")]
    pub name: String,

    /// Namespace of the deployment record
    #[arg(long, env = "SITEAGENT_DEPLOYMENT_NAMESPACE")]
    pub namespace: String,

    /// Root of the record store
    #[arg(long, env = "SITEAGENT_RECORDS_DIR")]
    pub records_dir: Option<PathBuf>,

    /// Convergence poll interval in seconds
    #[arg(long)]
    pub poll_interval: Option<u64>,
}

impl DeployArgs {
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(dir) = &self.records_dir {
            settings.deployer.records_dir = dir.clone();
        }
        if let Some(secs) = self.poll_interval {
            settings.deployer.poll_interval_secs = secs;
        }
    }
}
