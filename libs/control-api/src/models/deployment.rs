use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::AppTemplate;

/// Requests a scale of the deployed application; value is the config version
pub const SCALE_ANNOTATION: &str = "deploy.siteagent.io/scale";
/// Requests a rollback to the last complete deployment; value is the config version
pub const RECONCILE_ANNOTATION: &str = "deploy.siteagent.io/reconcile";
/// Requests a retry of a failed deployment; value is the config version
pub const RETRY_ANNOTATION: &str = "deploy.siteagent.io/retry";

/// Status of a deployment record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentPhase {
    #[default]
    New,
    Pending,
    Running,
    Complete,
    Failed,
}

impl fmt::Display for DeploymentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeploymentPhase::New => "new",
            DeploymentPhase::Pending => "pending",
            DeploymentPhase::Running => "running",
            DeploymentPhase::Complete => "complete",
            DeploymentPhase::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// One versioned attempt to deploy a deployment config onto a site
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentRecord {
    /// Record name, unique within the namespace (e.g. `web-3`)
    pub name: String,
    /// Namespace of the record, which is also the remote project id
    pub namespace: String,
    /// Name of the deployment config this record was produced from
    pub config_name: String,
    /// Version of the config this record was produced from
    pub version: i64,
    /// Latest version of the config at the time the record was written
    pub latest_version: i64,
    pub site: Option<String>,
    pub desired_replicas: Option<i32>,
    pub template: Option<AppTemplate>,
    pub status: DeploymentPhase,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl DeploymentRecord {
    /// `namespace/name`, for logs
    pub fn label(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    pub fn requested_action(&self) -> RequestedAction {
        RequestedAction::decode(&self.annotations, self.latest_version)
    }

    pub fn is_complete(&self) -> bool {
        self.status == DeploymentPhase::Complete
    }
}

/// Action a deployer run must take, decoded once from the record annotations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedAction {
    Deploy,
    Scale { version: i64 },
    Reconcile { version: i64 },
    Retry { version: i64 },
}

impl RequestedAction {
    /// Decodes the action annotations.
    ///
    /// An annotation only counts when its value parses and equals
    /// `latest_version`; scale wins over reconcile, which wins over retry.
    pub fn decode(annotations: &BTreeMap<String, String>, latest_version: i64) -> Self {
        let current = |key: &str| {
            annotations
                .get(key)
                .and_then(|v| v.trim().parse::<i64>().ok())
                .filter(|v| *v == latest_version)
        };

        if let Some(version) = current(SCALE_ANNOTATION) {
            RequestedAction::Scale { version }
        } else if let Some(version) = current(RECONCILE_ANNOTATION) {
            RequestedAction::Reconcile { version }
        } else if let Some(version) = current(RETRY_ANNOTATION) {
            RequestedAction::Retry { version }
        } else {
            RequestedAction::Deploy
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RequestedAction::Deploy => "deploy",
            RequestedAction::Scale { .. } => "scale",
            RequestedAction::Reconcile { .. } => "reconcile",
            RequestedAction::Retry { .. } => "retry",
        }
    }
}

impl fmt::Display for RequestedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
