//! Remote scheduler access

pub mod client;

use async_trait::async_trait;
use scheduler_api::{
    Application, ApplicationVersions, Deployment, DeploymentId, Group, Info, Leader, Tasks,
};

use crate::errors::AgentError;

pub use client::SchedulerClient;

/// Filters forwarded on `GET /v2/apps`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationFilter {
    pub embed: Option<String>,
    pub label: Option<String>,
}

/// Typed access to the scheduler REST API, one method per resource and verb.
///
/// Application and group ids are absolute (`/<project>/<app>`). A 404 from
/// the scheduler surfaces as [`AgentError::NotFound`], any other 4xx as
/// [`AgentError::SchedulerRejection`] and every other failure status as
/// [`AgentError::SchedulerError`].
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn applications(&self, filter: &ApplicationFilter)
        -> Result<Vec<Application>, AgentError>;

    /// Fetches one application with its tasks embedded
    async fn application(&self, id: &str) -> Result<Application, AgentError>;

    async fn application_versions(&self, id: &str) -> Result<ApplicationVersions, AgentError>;

    async fn application_by_version(
        &self,
        id: &str,
        version: &str,
    ) -> Result<Application, AgentError>;

    async fn create_application(&self, app: &Application) -> Result<Application, AgentError>;

    async fn update_application(
        &self,
        app: &Application,
        force: bool,
    ) -> Result<DeploymentId, AgentError>;

    async fn scale_application(
        &self,
        id: &str,
        instances: i32,
        force: bool,
    ) -> Result<DeploymentId, AgentError>;

    async fn restart_application(&self, id: &str, force: bool)
        -> Result<DeploymentId, AgentError>;

    async fn delete_application(&self, id: &str) -> Result<DeploymentId, AgentError>;

    async fn tasks(&self, app_id: &str) -> Result<Tasks, AgentError>;

    /// Kills the given tasks; with `scale` the app's instance count is
    /// decreased instead of the tasks being replaced.
    async fn kill_tasks(&self, ids: &[String], scale: bool) -> Result<(), AgentError>;

    /// Root group, with every application
    async fn groups(&self) -> Result<Group, AgentError>;

    async fn group(&self, id: &str) -> Result<Group, AgentError>;

    async fn delete_group(&self, id: &str, force: bool) -> Result<DeploymentId, AgentError>;

    async fn deployments(&self) -> Result<Vec<Deployment>, AgentError>;

    async fn delete_deployment(&self, id: &str, force: bool)
        -> Result<DeploymentId, AgentError>;

    async fn info(&self) -> Result<Info, AgentError>;

    async fn leader(&self) -> Result<Leader, AgentError>;
}
