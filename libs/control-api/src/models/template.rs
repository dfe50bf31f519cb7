use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Desired application carried by a deployment record. Mirrors the
/// scheduler's application model without any of its status fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppTemplate {
    /// Either `/<project>/<app>` or a bare `<app>` resolved against the
    /// record's namespace.
    pub id: String,
    pub cmd: Option<String>,
    pub args: Vec<String>,
    /// Placement constraints, e.g. `["hostname", "UNIQUE"]`
    pub constraints: Vec<Constraint>,
    pub container: Option<ContainerTemplate>,
    pub cpus: Option<f64>,
    pub mem: Option<f64>,
    pub disk: Option<f64>,
    pub env: BTreeMap<String, String>,
    pub executor: Option<String>,
    pub health_checks: Vec<HealthCheckTemplate>,
    pub ports: Vec<i32>,
    pub require_ports: Option<bool>,
    pub backoff_seconds: Option<f64>,
    pub backoff_factor: Option<f64>,
    pub max_launch_delay_seconds: Option<f64>,
    pub dependencies: Vec<String>,
    pub user: String,
    pub upgrade_strategy: Option<UpgradeStrategyTemplate>,
    pub uris: Vec<String>,
    pub labels: BTreeMap<String, String>,
    pub accepted_resource_roles: Vec<String>,
    pub fetch: Vec<FetchTemplate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraint {
    pub constraint: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerTemplate {
    #[serde(rename = "type")]
    pub container_type: String,
    pub docker: Option<DockerTemplate>,
    pub volumes: Vec<VolumeTemplate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DockerTemplate {
    pub force_pull_image: Option<bool>,
    pub image: String,
    pub network: String,
    pub parameters: Vec<ParameterTemplate>,
    pub port_mappings: Vec<PortMappingTemplate>,
    pub privileged: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VolumeTemplate {
    pub container_path: String,
    pub host_path: String,
    pub mode: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortMappingTemplate {
    pub container_port: i32,
    pub host_port: i32,
    pub service_port: i32,
    pub protocol: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterTemplate {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpgradeStrategyTemplate {
    pub minimum_health_capacity: f64,
    pub maximum_over_capacity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthCheckTemplate {
    pub command: Option<String>,
    pub port_index: Option<i32>,
    pub path: Option<String>,
    pub max_consecutive_failures: Option<i32>,
    pub protocol: String,
    pub grace_period_seconds: i32,
    pub interval_seconds: i32,
    pub timeout_seconds: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchTemplate {
    pub uri: String,
    pub executable: bool,
    pub extract: bool,
    pub cache: bool,
}
