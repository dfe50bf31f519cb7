//! HTTP client for the Marathon-compatible scheduler

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use scheduler_api::{
    Application, ApplicationEnvelope, ApplicationVersions, Applications, Deployment,
    DeploymentId, Group, Info, KillTasksRequest, Leader, ScaleRequest, Tasks,
};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};
use url::Url;

use crate::app::options::SchedulerOptions;
use crate::errors::AgentError;
use crate::scheduler::{ApplicationFilter, Scheduler};

/// reqwest based [`Scheduler`]
pub struct SchedulerClient {
    client: Client,
    base_url: String,
    credentials: Option<(String, SecretString)>,
}

impl SchedulerClient {
    /// Create a new scheduler client. Fails on an unusable URL or on half
    /// configured credentials.
    pub fn new(options: &SchedulerOptions) -> Result<Self, AgentError> {
        let url = Url::parse(&options.url).map_err(|e| {
            AgentError::ConfigError(format!("invalid scheduler url {:?}: {}", options.url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AgentError::ConfigError(format!(
                "unsupported scheduler url scheme: {}",
                url.scheme()
            )));
        }

        let credentials = match (&options.username, &options.password) {
            (Some(username), Some(password)) => Some((username.clone(), password.clone())),
            (None, None) => None,
            _ => {
                return Err(AgentError::ConfigError(
                    "scheduler username and password must be set together".to_string(),
                ))
            }
        };

        let client = Client::builder().timeout(options.timeout).build()?;

        Ok(Self {
            client,
            base_url: options.url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let request = self.client.request(method, url);
        match &self.credentials {
            Some((username, password)) => {
                request.basic_auth(username, Some(password.expose_secret()))
            }
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, AgentError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify(status, &body))
    }

    async fn read<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AgentError> {
        let body = self.send(request).await?.json().await?;
        Ok(body)
    }
}

fn classify(status: StatusCode, body: &str) -> AgentError {
    let body = body.trim();
    match status {
        StatusCode::NOT_FOUND => {
            debug!("Scheduler returned 404: {}", body);
            AgentError::NotFound(body.to_string())
        }
        s if s.is_client_error() => {
            warn!("Scheduler rejected request: {} - {}", status, body);
            AgentError::SchedulerRejection(format!("{}: {}", status, body))
        }
        _ => {
            error!("Scheduler request failed: {} - {}", status, body);
            AgentError::SchedulerError(format!("{}: {}", status, body))
        }
    }
}

fn app_path(id: &str) -> String {
    format!("/v2/apps/{}", id.trim_start_matches('/'))
}

fn group_path(id: &str) -> String {
    format!("/v2/groups/{}", id.trim_start_matches('/'))
}

#[async_trait]
impl Scheduler for SchedulerClient {
    async fn applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, AgentError> {
        let mut query = Vec::new();
        if let Some(embed) = &filter.embed {
            query.push(("embed", embed.as_str()));
        }
        if let Some(label) = &filter.label {
            query.push(("label", label.as_str()));
        }
        let apps: Applications = self
            .read(self.request(Method::GET, "/v2/apps").query(&query))
            .await?;
        Ok(apps.apps)
    }

    async fn application(&self, id: &str) -> Result<Application, AgentError> {
        let envelope: ApplicationEnvelope = self
            .read(
                self.request(Method::GET, &app_path(id))
                    .query(&[("embed", "apps.tasks")]),
            )
            .await?;
        Ok(envelope.app)
    }

    async fn application_versions(&self, id: &str) -> Result<ApplicationVersions, AgentError> {
        let path = format!("{}/versions", app_path(id));
        self.read(self.request(Method::GET, &path)).await
    }

    async fn application_by_version(
        &self,
        id: &str,
        version: &str,
    ) -> Result<Application, AgentError> {
        let path = format!("{}/versions/{}", app_path(id), version);
        self.read(self.request(Method::GET, &path)).await
    }

    async fn create_application(&self, app: &Application) -> Result<Application, AgentError> {
        self.read(self.request(Method::POST, "/v2/apps").json(app))
            .await
    }

    async fn update_application(
        &self,
        app: &Application,
        force: bool,
    ) -> Result<DeploymentId, AgentError> {
        self.read(
            self.request(Method::PUT, &app_path(&app.id))
                .query(&[("force", force)])
                .json(app),
        )
        .await
    }

    async fn scale_application(
        &self,
        id: &str,
        instances: i32,
        force: bool,
    ) -> Result<DeploymentId, AgentError> {
        self.read(
            self.request(Method::PUT, &app_path(id))
                .query(&[("force", force)])
                .json(&ScaleRequest { instances }),
        )
        .await
    }

    async fn restart_application(
        &self,
        id: &str,
        force: bool,
    ) -> Result<DeploymentId, AgentError> {
        let path = format!("{}/restart", app_path(id));
        self.read(self.request(Method::POST, &path).query(&[("force", force)]))
            .await
    }

    async fn delete_application(&self, id: &str) -> Result<DeploymentId, AgentError> {
        self.read(self.request(Method::DELETE, &app_path(id))).await
    }

    async fn tasks(&self, app_id: &str) -> Result<Tasks, AgentError> {
        let path = format!("{}/tasks", app_path(app_id));
        self.read(self.request(Method::GET, &path)).await
    }

    async fn kill_tasks(&self, ids: &[String], scale: bool) -> Result<(), AgentError> {
        let body = KillTasksRequest { ids: ids.to_vec() };
        self.send(
            self.request(Method::POST, "/v2/tasks/delete")
                .query(&[("scale", scale)])
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn groups(&self) -> Result<Group, AgentError> {
        self.read(self.request(Method::GET, "/v2/groups")).await
    }

    async fn group(&self, id: &str) -> Result<Group, AgentError> {
        self.read(self.request(Method::GET, &group_path(id))).await
    }

    async fn delete_group(&self, id: &str, force: bool) -> Result<DeploymentId, AgentError> {
        self.read(
            self.request(Method::DELETE, &group_path(id))
                .query(&[("force", force)]),
        )
        .await
    }

    async fn deployments(&self) -> Result<Vec<Deployment>, AgentError> {
        self.read(self.request(Method::GET, "/v2/deployments"))
            .await
    }

    async fn delete_deployment(
        &self,
        id: &str,
        force: bool,
    ) -> Result<DeploymentId, AgentError> {
        let path = format!("/v2/deployments/{}", id);
        let response = self
            .send(self.request(Method::DELETE, &path).query(&[("force", force)]))
            .await?;

        // A forced cancel is acknowledged with 202 and no rollback deployment.
        if response.status() == StatusCode::ACCEPTED {
            return Ok(DeploymentId {
                deployment_id: id.to_string(),
                version: String::new(),
            });
        }
        Ok(response.json().await?)
    }

    async fn info(&self) -> Result<Info, AgentError> {
        self.read(self.request(Method::GET, "/v2/info")).await
    }

    async fn leader(&self) -> Result<Leader, AgentError> {
        self.read(self.request(Method::GET, "/v2/leader")).await
    }
}
