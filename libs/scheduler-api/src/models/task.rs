use serde::{Deserialize, Serialize};

/// A running or staged instance of an application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Task {
    pub id: String,
    pub app_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<i32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staged_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// One entry per declared health check; the scheduler reports `null`
    /// for checks that have not produced a result yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check_results: Option<Vec<Option<HealthCheckResult>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthCheckResult {
    pub alive: bool,
    pub consecutive_failures: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_success: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

/// Envelope of `GET /v2/apps/{id}/tasks`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tasks {
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// Body of `POST /v2/tasks/delete`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillTasksRequest {
    #[serde(default)]
    pub ids: Vec<String>,
}

/// Derives the task id prefix `<project>_<app>.` of an application.
///
/// The scheduler names tasks after the "safe" form of the application path,
/// with `/` replaced by `_`, followed by `.` and a uuid.
pub fn task_id_prefix(project: &str, app: &str) -> String {
    format!("{}_{}.", project, app)
}
