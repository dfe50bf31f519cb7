use serde::{Deserialize, Serialize};

/// A deployment in progress, as listed by `GET /v2/deployments`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Deployment {
    pub id: String,
    pub version: String,
    pub affected_apps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_actions: Option<serde_json::Value>,
    pub current_step: i32,
    pub total_steps: i32,
}

impl Deployment {
    /// True when at least one affected application lives under `prefix`.
    pub fn touches(&self, prefix: &str) -> bool {
        self.affected_apps.iter().any(|app| app.starts_with(prefix))
    }

    /// True when the deployment affects applications and all of them live
    /// under `prefix`.
    pub fn confined_to(&self, prefix: &str) -> bool {
        !self.affected_apps.is_empty() && self.affected_apps.iter().all(|app| app.starts_with(prefix))
    }
}

/// Reference to a deployment embedded in an application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRef {
    pub id: String,
}

/// Returned by every mutating call that starts a deployment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentId {
    pub deployment_id: String,
    pub version: String,
}
