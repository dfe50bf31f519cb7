//! Client side of the gateway, as consumed by the deployer

pub mod client;

use async_trait::async_trait;
use scheduler_api::{Application, Deployment, DeploymentId};

use crate::errors::AgentError;

pub use client::SiteProxyClient;

/// Gateway operations the deployer needs, bound to one site.
///
/// Lookups return `None` when the gateway reports the resource absent.
#[async_trait]
pub trait SiteApi: Send + Sync {
    /// Site id every request is addressed to
    fn site_id(&self) -> &str;

    async fn get_application(
        &self,
        project: &str,
        app: &str,
    ) -> Result<Option<Application>, AgentError>;

    async fn create_application(
        &self,
        project: &str,
        app: &Application,
    ) -> Result<Application, AgentError>;

    async fn update_application(
        &self,
        project: &str,
        app_name: &str,
        app: &Application,
        force: bool,
    ) -> Result<DeploymentId, AgentError>;

    async fn scale_application(
        &self,
        project: &str,
        app: &str,
        replicas: i32,
        force: bool,
    ) -> Result<DeploymentId, AgentError>;

    async fn get_deployment(
        &self,
        project: &str,
        deployment_id: &str,
    ) -> Result<Option<Deployment>, AgentError>;

    /// Cancels a deployment. Without `force` the scheduler rolls the
    /// affected apps back and reports the rollback deployment.
    async fn delete_deployment(
        &self,
        project: &str,
        deployment_id: &str,
        force: bool,
    ) -> Result<Option<DeploymentId>, AgentError>;
}
