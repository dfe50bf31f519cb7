//! HTTP request handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use scheduler_api::{Application, KillTasksRequest};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info, warn};

use crate::errors::AgentError;
use crate::scheduler::ApplicationFilter;
use crate::server::routes::{
    parse_query, resolve, Endpoint, RouteMatch, APPLICATIONS, DEPLOYMENTS, EMBED, FORCE, LABEL,
    PROJECTS, REPLICAS, SITES, VERSIONS,
};
use crate::server::state::ServerState;
use crate::server::tenant;
use crate::utils::is_path_segment;

/// Outcome of a successful handler
#[derive(Debug)]
pub enum Reply {
    Json(serde_json::Value),
    /// 200 with an empty body
    Empty,
    /// 404 with an empty body
    Absent,
}

impl Reply {
    fn json<T: Serialize>(value: &T) -> Result<Self, AgentError> {
        Ok(Reply::Json(serde_json::to_value(value)?))
    }
}

/// Single entry point of the gateway: resolves the request against the route
/// table and dispatches to the matching handler.
pub async fn dispatch(
    State(state): State<Arc<ServerState>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    info!("{} {}", method, uri);

    let mut response = match resolve(&method, uri.path(), parse_query(uri.query())) {
        None => {
            debug!("No route for {} {}", method, uri);
            StatusCode::NOT_FOUND.into_response()
        }
        Some(matched) => match handle(&state, &matched, &body).await {
            Ok(reply) => reply_response(matched.endpoint, reply),
            Err(e) => error_response(matched.endpoint, e),
        },
    };

    response
        .headers_mut()
        .insert(header::SERVER, state.server_header.clone());
    response
}

fn reply_response(endpoint: Endpoint, reply: Reply) -> Response {
    match reply {
        Reply::Json(value) => (StatusCode::OK, Json(value)).into_response(),
        Reply::Empty if endpoint == Endpoint::Ping => (
            StatusCode::OK,
            [(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"))],
        )
            .into_response(),
        Reply::Empty => StatusCode::OK.into_response(),
        Reply::Absent => StatusCode::NOT_FOUND.into_response(),
    }
}

fn error_response(endpoint: Endpoint, err: AgentError) -> Response {
    let status = match &err {
        AgentError::NotFound(detail) => {
            debug!("{}: not found: {}", endpoint.describe(), detail);
            return StatusCode::NOT_FOUND.into_response();
        }
        AgentError::Internal(_)
        | AgentError::JsonError(_)
        | AgentError::IoError(_)
        | AgentError::ServerError(_)
        | AgentError::ShutdownError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::NOT_ACCEPTABLE,
    };

    let message = format!("{}: {}", endpoint.describe(), err);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("{}", message);
    } else {
        warn!("{}", message);
    }
    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"))],
        message,
    )
        .into_response()
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, AgentError> {
    serde_json::from_slice(body)
        .map_err(|e| AgentError::ValidationError(format!("invalid request body: {}", e)))
}

/// `/<project>/<app>` of the addressed application
fn target_app(m: &RouteMatch) -> Result<String, AgentError> {
    tenant::app_id(m.var(PROJECTS)?, m.var(APPLICATIONS)?)
}

async fn handle(state: &ServerState, m: &RouteMatch, body: &[u8]) -> Result<Reply, AgentError> {
    if m.endpoint == Endpoint::Ping {
        return Ok(Reply::Empty);
    }

    tenant::check_site(m.var(SITES)?, &state.site_name)?;
    let scheduler = state.scheduler.as_ref();

    match m.endpoint {
        Endpoint::Ping => Ok(Reply::Empty),

        Endpoint::ListVersions => {
            let id = target_app(m)?;
            Reply::json(&scheduler.application_versions(&id).await?)
        }

        Endpoint::GetVersion => {
            let id = target_app(m)?;
            let version = m.var(VERSIONS)?;
            if !is_path_segment(version) {
                return Err(AgentError::ValidationError(format!(
                    "invalid version {:?}",
                    version
                )));
            }
            Reply::json(&scheduler.application_by_version(&id, version).await?)
        }

        Endpoint::ListTasks => {
            let id = target_app(m)?;
            Reply::json(&scheduler.tasks(&id).await?)
        }

        Endpoint::GetApplication => {
            let id = target_app(m)?;
            match scheduler.application(&id).await {
                Ok(app) => Reply::json(&app),
                Err(e) if e.is_not_found() => Ok(Reply::Absent),
                Err(e) => Err(e),
            }
        }

        Endpoint::ListProjectApplications => {
            let group = tenant::project_group(m.var(PROJECTS)?)?;
            let group = scheduler.group(&group).await?;
            Reply::json(&group.apps.unwrap_or_default())
        }

        Endpoint::ListApplications => {
            let filter = ApplicationFilter {
                embed: m.param(EMBED).map(str::to_string),
                label: m.param(LABEL).map(str::to_string),
            };
            Reply::json(&scheduler.applications(&filter).await?)
        }

        Endpoint::GetDeployment => {
            let prefix = tenant::project_prefix(m.var(PROJECTS)?)?;
            let id = m.var(DEPLOYMENTS)?;
            let deployment = scheduler
                .deployments()
                .await?
                .into_iter()
                .find(|d| d.id == id && d.touches(&prefix));
            match deployment {
                Some(deployment) => Reply::json(&deployment),
                None => Ok(Reply::Absent),
            }
        }

        Endpoint::ListDeployments => {
            let prefix = tenant::project_prefix(m.var(PROJECTS)?)?;
            let deployments: Vec<_> = scheduler
                .deployments()
                .await?
                .into_iter()
                .filter(|d| d.confined_to(&prefix))
                .collect();
            Reply::json(&deployments)
        }

        Endpoint::ListProjects => Reply::json(&scheduler.groups().await?),

        Endpoint::GetProject => {
            let group = tenant::project_group(m.var(PROJECTS)?)?;
            match scheduler.group(&group).await {
                Ok(group) => Reply::json(&group),
                Err(e) if e.is_not_found() => Ok(Reply::Absent),
                Err(e) => Err(e),
            }
        }

        Endpoint::Info => Reply::json(&scheduler.info().await?),

        Endpoint::Leader => Reply::json(&scheduler.leader().await?),

        Endpoint::RestartApplication => {
            let id = target_app(m)?;
            Reply::json(&scheduler.restart_application(&id, m.flag(FORCE)).await?)
        }

        Endpoint::ScaleApplication => {
            let id = target_app(m)?;
            let raw = m.var(REPLICAS)?;
            let replicas = raw
                .parse::<i32>()
                .ok()
                .filter(|n| *n >= 0)
                .ok_or_else(|| {
                    AgentError::ValidationError(format!("invalid replica count {:?}", raw))
                })?;
            Reply::json(
                &scheduler
                    .scale_application(&id, replicas, m.flag(FORCE))
                    .await?,
            )
        }

        Endpoint::UpdateApplication => {
            let app: Application = parse_body(body)?;
            tenant::check_app_is(&app.id, m.var(PROJECTS)?, m.var(APPLICATIONS)?)?;
            Reply::json(&scheduler.update_application(&app, m.flag(FORCE)).await?)
        }

        Endpoint::CreateApplication => {
            let app: Application = parse_body(body)?;
            tenant::check_app_in_project(&app.id, m.var(PROJECTS)?)?;
            Reply::json(&scheduler.create_application(&app).await?)
        }

        Endpoint::KillTasks => {
            let request: KillTasksRequest = parse_body(body)?;
            tenant::check_task_ids(&request.ids, m.var(PROJECTS)?, m.var(APPLICATIONS)?)?;
            scheduler.kill_tasks(&request.ids, m.flag(FORCE)).await?;
            Ok(Reply::Empty)
        }

        Endpoint::DeleteApplication => {
            let id = target_app(m)?;
            Reply::json(&scheduler.delete_application(&id).await?)
        }

        Endpoint::DeleteDeployment => {
            let prefix = tenant::project_prefix(m.var(PROJECTS)?)?;
            let id = m.var(DEPLOYMENTS)?;
            let owned = scheduler
                .deployments()
                .await?
                .iter()
                .any(|d| d.id == id && d.touches(&prefix));
            if !owned {
                debug!("Deployment {} not found under {}", id, prefix);
                return Ok(Reply::Empty);
            }
            Reply::json(&scheduler.delete_deployment(id, m.flag(FORCE)).await?)
        }

        Endpoint::DeleteProject => {
            let group = tenant::project_group(m.var(PROJECTS)?)?;
            Reply::json(&scheduler.delete_group(&group, m.flag(FORCE)).await?)
        }
    }
}
