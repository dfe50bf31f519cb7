//! Tenant scope checks
//!
//! A tenant (project) owns the scheduler group `/<project>` and everything
//! under it. Application ids are `/<project>/<app>` and task ids
//! `<project>_<app>.<uuid>`. Every check here runs before any scheduler call.

use scheduler_api::task_id_prefix;

use crate::errors::AgentError;
use crate::utils::is_path_segment;

/// Fails closed unless `requested` names the configured site
pub fn check_site(requested: &str, configured: &str) -> Result<(), AgentError> {
    if requested != configured {
        return Err(AgentError::SiteMismatch {
            requested: requested.to_string(),
            configured: configured.to_string(),
        });
    }
    Ok(())
}

fn check_segment(kind: &str, value: &str) -> Result<(), AgentError> {
    if is_path_segment(value) {
        Ok(())
    } else {
        Err(AgentError::TenantViolation(format!(
            "{} id {:?} must be a single path segment",
            kind, value
        )))
    }
}

/// `/<project>`, the scheduler group of a project
pub fn project_group(project: &str) -> Result<String, AgentError> {
    check_segment("project", project)?;
    Ok(format!("/{}", project))
}

/// `/<project>/`, the prefix every id of the project carries
pub fn project_prefix(project: &str) -> Result<String, AgentError> {
    check_segment("project", project)?;
    Ok(format!("/{}/", project))
}

/// `/<project>/<app>`
pub fn app_id(project: &str, app: &str) -> Result<String, AgentError> {
    check_segment("application", app)?;
    Ok(format!("{}{}", project_prefix(project)?, app))
}

/// Checks that `id` names an application inside the project. Nested groups
/// are allowed, but no segment may be empty, `.` or `..`.
pub fn check_app_in_project(id: &str, project: &str) -> Result<(), AgentError> {
    let prefix = project_prefix(project)?;
    let rest = id.strip_prefix(prefix.as_str()).ok_or_else(|| {
        AgentError::TenantViolation(format!(
            "application id {:?} is not under project {:?}",
            id, project
        ))
    })?;
    for segment in rest.split('/') {
        check_segment("application", segment)?;
    }
    Ok(())
}

/// Checks that the body id of an update names the addressed application
pub fn check_app_is(id: &str, project: &str, app: &str) -> Result<(), AgentError> {
    let expected = app_id(project, app)?;
    if id != expected {
        return Err(AgentError::TenantViolation(format!(
            "application id {:?} does not match the addressed application {:?}",
            id, expected
        )));
    }
    Ok(())
}

/// Checks that every task id belongs to the addressed application.
///
/// `_` is the task id delimiter, so ids containing it cannot be attributed
/// to a single application and are refused.
pub fn check_task_ids(ids: &[String], project: &str, app: &str) -> Result<(), AgentError> {
    check_segment("project", project)?;
    check_segment("application", app)?;
    if project.contains('_') || app.contains('_') {
        return Err(AgentError::TenantViolation(format!(
            "cannot attribute tasks of /{}/{}: ids contain '_'",
            project, app
        )));
    }
    let prefix = task_id_prefix(project, app);
    match ids.iter().find(|id| !id.starts_with(&prefix)) {
        Some(id) => Err(AgentError::TenantViolation(format!(
            "task id {:?} does not belong to application /{}/{}",
            id, project, app
        ))),
        None => Ok(()),
    }
}
