use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{DeploymentRef, Task, TASK_RUNNING};

/// A scheduler application, as accepted by `POST /v2/apps` and returned by
/// `GET /v2/apps/{id}`.
///
/// The status fields (`version`, `tasks`, `tasks_running`, `deployments`, ...)
/// are only ever filled by the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Application {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Vec<Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<Container>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpus: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mem: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_checks: Option<Vec<HealthCheck>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instances: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<i32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_ports: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_launch_delay_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_strategy: Option<UpgradeStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uris: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_resource_roles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch: Option<Vec<Fetch>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks_running: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks_staged: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks_healthy: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks_unhealthy: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployments: Option<Vec<DeploymentRef>>,
}

impl Application {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Id of the first deployment the scheduler reports as touching this app.
    pub fn active_deployment_id(&self) -> Option<&str> {
        self.deployments
            .as_deref()
            .and_then(|refs| refs.first())
            .map(|r| r.id.as_str())
    }

    pub fn has_active_deployment(&self) -> bool {
        self.active_deployment_id().is_some()
    }

    pub fn has_health_checks(&self) -> bool {
        self.health_checks.as_ref().is_some_and(|hc| !hc.is_empty())
    }

    /// Largest grace period declared by the health checks, in seconds.
    pub fn max_grace_period_seconds(&self) -> Option<i32> {
        self.health_checks
            .as_deref()?
            .iter()
            .filter_map(|hc| hc.grace_period_seconds)
            .max()
    }

    pub fn task_list(&self) -> &[Task] {
        self.tasks.as_deref().unwrap_or_default()
    }

    /// True when every reported task is running.
    ///
    /// A task without a state counts as running once it has a start time,
    /// which is how older schedulers report launched tasks.
    pub fn all_tasks_running(&self) -> bool {
        self.task_list().iter().all(|task| match task.state.as_deref() {
            Some(state) => state == TASK_RUNNING,
            None => task.started_at.as_deref().is_some_and(|s| !s.is_empty()),
        })
    }

    /// True when every task carries at least one health check result and all
    /// results are alive. A missing (null) result counts as not alive.
    pub fn all_tasks_healthy(&self) -> bool {
        self.task_list().iter().all(|task| {
            let results = task.health_check_results.as_deref().unwrap_or_default();
            !results.is_empty()
                && results
                    .iter()
                    .all(|result| result.as_ref().is_some_and(|r| r.alive))
        })
    }
}

/// Body of a scale request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleRequest {
    pub instances: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Container {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub container_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker: Option<Docker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<Volume>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Docker {
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_pull_image: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privileged: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<Parameter>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_mappings: Option<Vec<PortMapping>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortMapping {
    pub container_port: i32,
    pub host_port: i32,
    pub service_port: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Volume {
    pub container_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthCheck {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Command>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_index: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_consecutive_failures: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace_period_seconds: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_seconds: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpgradeStrategy {
    pub minimum_health_capacity: f64,
    pub maximum_over_capacity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fetch {
    pub uri: String,
    pub executable: bool,
    pub extract: bool,
    pub cache: bool,
}

/// Envelope of `GET /v2/apps/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationEnvelope {
    pub app: Application,
}

/// Envelope of `GET /v2/apps`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Applications {
    #[serde(default)]
    pub apps: Vec<Application>,
}

/// Response of `GET /v2/apps/{id}/versions`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationVersions {
    #[serde(default)]
    pub versions: Vec<String>,
}
