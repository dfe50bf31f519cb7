//! HTTP client for the site agent gateway

use std::time::Duration;

use async_trait::async_trait;
use control_api::{Site, SiteType};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use scheduler_api::{
    Application, ApplicationVersions, Deployment, DeploymentId, Group, Info, KillTasksRequest,
    Leader, Tasks,
};
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::errors::AgentError;
use crate::server::routes::{
    APPLICATIONS, ATTRIBUTES, DEPLOYMENTS, EMBED, FORCE, LABEL, PING_PATH, PROJECTS, PROXY_PATH,
    REPLICAS, SITES, VERSIONS,
};
use crate::site::SiteApi;

/// Talks to the gateway of one site, one method per gateway route.
///
/// Status mapping: 200 yields the decoded body (`None` for an empty body),
/// 404 yields `None`, 406 is a [`AgentError::SchedulerRejection`] carrying
/// the gateway's message and anything else is [`AgentError::Internal`].
pub struct SiteProxyClient {
    client: Client,
    base_url: String,
    site_id: String,
}

impl SiteProxyClient {
    /// Create a new client for the gateway at `agent_address`
    pub fn new(agent_address: &str, site_id: &str, timeout: Duration) -> Result<Self, AgentError> {
        if agent_address.trim().is_empty() {
            return Err(AgentError::ConfigError(format!(
                "site {} has no agent address",
                site_id
            )));
        }
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: agent_address.trim_end_matches('/').to_string(),
            site_id: site_id.to_string(),
        })
    }

    /// Create a client from a site record. Only marathon sites are fronted by
    /// a site agent.
    pub fn for_site(site: &Site, timeout: Duration) -> Result<Self, AgentError> {
        if site.spec.site_type != SiteType::Marathon {
            return Err(AgentError::ConfigError(format!(
                "site {} is of type {}, only marathon sites are supported",
                site.display_name(),
                site.spec.site_type
            )));
        }
        Self::new(&site.status.site_agent_address, site.name(), timeout)
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn proxy(&self, method: Method, query: &[(&str, &str)]) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, PROXY_PATH);
        let mut pairs = vec![(SITES, self.site_id.as_str())];
        pairs.extend_from_slice(query);
        debug!("{} {} {:?}", method, url, pairs);
        self.client.request(method, url).query(&pairs)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>, AgentError> {
        let response = request.send().await?;
        match response.status() {
            StatusCode::OK => {
                let bytes = response.bytes().await?;
                if bytes.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(serde_json::from_slice(&bytes)?))
                }
            }
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::NOT_ACCEPTABLE => {
                let message = response.text().await.unwrap_or_default();
                warn!("Site agent rejected request: {}", message);
                Err(AgentError::SchedulerRejection(message))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                error!("Site agent request failed: {} - {}", status, body);
                Err(AgentError::Internal(format!(
                    "site agent returned {}: {}",
                    status, body
                )))
            }
        }
    }

    /// Liveness of the gateway
    pub async fn ping(&self) -> Result<(), AgentError> {
        let url = format!("{}{}", self.base_url, PING_PATH);
        self.fetch::<serde_json::Value>(self.client.get(url)).await?;
        Ok(())
    }

    pub async fn list_versions(
        &self,
        project: &str,
        app: &str,
    ) -> Result<Option<ApplicationVersions>, AgentError> {
        self.fetch(self.proxy(
            Method::GET,
            &[(PROJECTS, project), (APPLICATIONS, app), (ATTRIBUTES, "versions")],
        ))
        .await
    }

    pub async fn get_version(
        &self,
        project: &str,
        app: &str,
        version: &str,
    ) -> Result<Option<Application>, AgentError> {
        self.fetch(self.proxy(
            Method::GET,
            &[(PROJECTS, project), (APPLICATIONS, app), (VERSIONS, version)],
        ))
        .await
    }

    pub async fn list_tasks(&self, project: &str, app: &str) -> Result<Option<Tasks>, AgentError> {
        self.fetch(self.proxy(
            Method::GET,
            &[(PROJECTS, project), (APPLICATIONS, app), (ATTRIBUTES, "tasks")],
        ))
        .await
    }

    pub async fn list_project_applications(
        &self,
        project: &str,
    ) -> Result<Option<Vec<Application>>, AgentError> {
        self.fetch(self.proxy(
            Method::GET,
            &[(PROJECTS, project), (ATTRIBUTES, "applications")],
        ))
        .await
    }

    pub async fn list_applications(
        &self,
        embed: Option<&str>,
        label: Option<&str>,
    ) -> Result<Option<Vec<Application>>, AgentError> {
        let mut query = vec![(ATTRIBUTES, "applications")];
        if let Some(embed) = embed {
            query.push((EMBED, embed));
        }
        if let Some(label) = label {
            query.push((LABEL, label));
        }
        self.fetch(self.proxy(Method::GET, &query)).await
    }

    pub async fn list_deployments(
        &self,
        project: &str,
    ) -> Result<Option<Vec<Deployment>>, AgentError> {
        self.fetch(self.proxy(
            Method::GET,
            &[(PROJECTS, project), (ATTRIBUTES, "deployments")],
        ))
        .await
    }

    pub async fn list_projects(&self) -> Result<Option<Group>, AgentError> {
        self.fetch(self.proxy(Method::GET, &[(ATTRIBUTES, "projects")]))
            .await
    }

    pub async fn get_project(&self, project: &str) -> Result<Option<Group>, AgentError> {
        self.fetch(self.proxy(Method::GET, &[(PROJECTS, project)]))
            .await
    }

    pub async fn info(&self) -> Result<Option<Info>, AgentError> {
        self.fetch(self.proxy(Method::GET, &[(ATTRIBUTES, "info")]))
            .await
    }

    pub async fn leader(&self) -> Result<Option<Leader>, AgentError> {
        self.fetch(self.proxy(Method::GET, &[(ATTRIBUTES, "leader")]))
            .await
    }

    pub async fn restart_application(
        &self,
        project: &str,
        app: &str,
        force: bool,
    ) -> Result<Option<DeploymentId>, AgentError> {
        let mut query = vec![(PROJECTS, project), (APPLICATIONS, app), (ATTRIBUTES, "restart")];
        push_force(&mut query, force);
        self.fetch(self.proxy(Method::PUT, &query)).await
    }

    pub async fn kill_tasks(
        &self,
        project: &str,
        app: &str,
        ids: &[String],
        scale: bool,
    ) -> Result<(), AgentError> {
        let mut query = vec![(PROJECTS, project), (APPLICATIONS, app), (ATTRIBUTES, "tasks")];
        push_force(&mut query, scale);
        let body = KillTasksRequest { ids: ids.to_vec() };
        self.fetch::<serde_json::Value>(self.proxy(Method::DELETE, &query).json(&body))
            .await?;
        Ok(())
    }

    pub async fn delete_application(
        &self,
        project: &str,
        app: &str,
    ) -> Result<Option<DeploymentId>, AgentError> {
        self.fetch(self.proxy(
            Method::DELETE,
            &[(PROJECTS, project), (APPLICATIONS, app)],
        ))
        .await
    }

    pub async fn delete_project(
        &self,
        project: &str,
        force: bool,
    ) -> Result<Option<DeploymentId>, AgentError> {
        let mut query = vec![(PROJECTS, project)];
        push_force(&mut query, force);
        self.fetch(self.proxy(Method::DELETE, &query)).await
    }
}

fn push_force(query: &mut Vec<(&str, &str)>, force: bool) {
    if force {
        query.push((FORCE, "true"));
    }
}

fn required<T>(value: Option<T>, what: impl FnOnce() -> String) -> Result<T, AgentError> {
    value.ok_or_else(|| AgentError::NotFound(what()))
}

#[async_trait]
impl SiteApi for SiteProxyClient {
    fn site_id(&self) -> &str {
        &self.site_id
    }

    async fn get_application(
        &self,
        project: &str,
        app: &str,
    ) -> Result<Option<Application>, AgentError> {
        self.fetch(self.proxy(
            Method::GET,
            &[(PROJECTS, project), (APPLICATIONS, app)],
        ))
        .await
    }

    async fn create_application(
        &self,
        project: &str,
        app: &Application,
    ) -> Result<Application, AgentError> {
        let created = self
            .fetch(
                self.proxy(
                    Method::POST,
                    &[(PROJECTS, project), (ATTRIBUTES, "applications")],
                )
                .json(app),
            )
            .await?;
        required(created, || format!("created application {}", app.id))
    }

    async fn update_application(
        &self,
        project: &str,
        app_name: &str,
        app: &Application,
        force: bool,
    ) -> Result<DeploymentId, AgentError> {
        let mut query = vec![(PROJECTS, project), (APPLICATIONS, app_name)];
        push_force(&mut query, force);
        let deployment = self
            .fetch(self.proxy(Method::PUT, &query).json(app))
            .await?;
        required(deployment, || format!("application {}", app.id))
    }

    async fn scale_application(
        &self,
        project: &str,
        app: &str,
        replicas: i32,
        force: bool,
    ) -> Result<DeploymentId, AgentError> {
        let replicas = replicas.to_string();
        let mut query = vec![
            (PROJECTS, project),
            (APPLICATIONS, app),
            (REPLICAS, replicas.as_str()),
        ];
        push_force(&mut query, force);
        let deployment = self.fetch(self.proxy(Method::PUT, &query)).await?;
        required(deployment, || format!("application /{}/{}", project, app))
    }

    async fn get_deployment(
        &self,
        project: &str,
        deployment_id: &str,
    ) -> Result<Option<Deployment>, AgentError> {
        self.fetch(self.proxy(
            Method::GET,
            &[(PROJECTS, project), (DEPLOYMENTS, deployment_id)],
        ))
        .await
    }

    async fn delete_deployment(
        &self,
        project: &str,
        deployment_id: &str,
        force: bool,
    ) -> Result<Option<DeploymentId>, AgentError> {
        let mut query = vec![(PROJECTS, project), (DEPLOYMENTS, deployment_id)];
        push_force(&mut query, force);
        self.fetch(self.proxy(Method::DELETE, &query)).await
    }
}
