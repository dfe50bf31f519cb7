//! Ordered route table of the gateway
//!
//! Every request resolves against [`ROUTES`] top to bottom and the first
//! descriptor whose method, path and required query pairs all match wins, so
//! more specific descriptors must come before the general ones sharing their
//! path.

use std::collections::BTreeMap;

use http::Method;

use crate::errors::AgentError;

pub const SITES: &str = "sites";
pub const PROJECTS: &str = "projects";
pub const APPLICATIONS: &str = "applications";
pub const ATTRIBUTES: &str = "attributes";
pub const VERSIONS: &str = "versions";
pub const DEPLOYMENTS: &str = "deployments";
pub const REPLICAS: &str = "replicas";
pub const FORCE: &str = "force";
pub const EMBED: &str = "embed";
pub const LABEL: &str = "label";

pub const PROXY_PATH: &str = "/proxy";
pub const PING_PATH: &str = "/ping";

/// A query parameter a route requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPair {
    /// `key=value` must be present
    Literal(&'static str, &'static str),
    /// `key` must be present; its value is captured under the key
    Capture(&'static str),
}

use QueryPair::{Capture, Literal};

/// Handler selected by a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Ping,
    ListVersions,
    GetVersion,
    ListTasks,
    GetApplication,
    ListProjectApplications,
    ListApplications,
    GetDeployment,
    ListDeployments,
    ListProjects,
    GetProject,
    Info,
    Leader,
    RestartApplication,
    ScaleApplication,
    UpdateApplication,
    CreateApplication,
    KillTasks,
    DeleteApplication,
    DeleteDeployment,
    DeleteProject,
}

impl Endpoint {
    /// Context prefixed to error responses
    pub fn describe(&self) -> &'static str {
        match self {
            Endpoint::Ping => "ping",
            Endpoint::ListVersions => "listing application versions",
            Endpoint::GetVersion => "getting application version",
            Endpoint::ListTasks => "listing application tasks",
            Endpoint::GetApplication => "getting application",
            Endpoint::ListProjectApplications => "listing project applications",
            Endpoint::ListApplications => "listing applications",
            Endpoint::GetDeployment => "getting deployment",
            Endpoint::ListDeployments => "listing deployments",
            Endpoint::ListProjects => "listing projects",
            Endpoint::GetProject => "getting project",
            Endpoint::Info => "getting scheduler info",
            Endpoint::Leader => "getting scheduler leader",
            Endpoint::RestartApplication => "restarting application",
            Endpoint::ScaleApplication => "scaling application",
            Endpoint::UpdateApplication => "updating application",
            Endpoint::CreateApplication => "creating application",
            Endpoint::KillTasks => "killing tasks",
            Endpoint::DeleteApplication => "deleting application",
            Endpoint::DeleteDeployment => "deleting deployment",
            Endpoint::DeleteProject => "deleting project",
        }
    }
}

/// `(method, path, required query pairs)` and the endpoint it selects
#[derive(Debug)]
pub struct Route {
    pub method: Method,
    pub path: &'static str,
    pub query: &'static [QueryPair],
    pub endpoint: Endpoint,
}

const fn route(
    method: Method,
    path: &'static str,
    query: &'static [QueryPair],
    endpoint: Endpoint,
) -> Route {
    Route {
        method,
        path,
        query,
        endpoint,
    }
}

pub static ROUTES: &[Route] = &[
    route(Method::GET, PING_PATH, &[], Endpoint::Ping),
    // GET
    route(
        Method::GET,
        PROXY_PATH,
        &[Capture(SITES), Capture(PROJECTS), Capture(APPLICATIONS), Literal(ATTRIBUTES, "versions")],
        Endpoint::ListVersions,
    ),
    route(
        Method::GET,
        PROXY_PATH,
        &[Capture(SITES), Capture(PROJECTS), Capture(APPLICATIONS), Capture(VERSIONS)],
        Endpoint::GetVersion,
    ),
    route(
        Method::GET,
        PROXY_PATH,
        &[Capture(SITES), Capture(PROJECTS), Capture(APPLICATIONS), Literal(ATTRIBUTES, "tasks")],
        Endpoint::ListTasks,
    ),
    route(
        Method::GET,
        PROXY_PATH,
        &[Capture(SITES), Capture(PROJECTS), Capture(APPLICATIONS)],
        Endpoint::GetApplication,
    ),
    route(
        Method::GET,
        PROXY_PATH,
        &[Capture(SITES), Capture(PROJECTS), Literal(ATTRIBUTES, "applications")],
        Endpoint::ListProjectApplications,
    ),
    route(
        Method::GET,
        PROXY_PATH,
        &[Capture(SITES), Literal(ATTRIBUTES, "applications")],
        Endpoint::ListApplications,
    ),
    route(
        Method::GET,
        PROXY_PATH,
        &[Capture(SITES), Capture(PROJECTS), Capture(DEPLOYMENTS)],
        Endpoint::GetDeployment,
    ),
    route(
        Method::GET,
        PROXY_PATH,
        &[Capture(SITES), Capture(PROJECTS), Literal(ATTRIBUTES, "deployments")],
        Endpoint::ListDeployments,
    ),
    route(
        Method::GET,
        PROXY_PATH,
        &[Capture(SITES), Literal(ATTRIBUTES, "projects")],
        Endpoint::ListProjects,
    ),
    route(
        Method::GET,
        PROXY_PATH,
        &[Capture(SITES), Capture(PROJECTS)],
        Endpoint::GetProject,
    ),
    route(
        Method::GET,
        PROXY_PATH,
        &[Capture(SITES), Literal(ATTRIBUTES, "info")],
        Endpoint::Info,
    ),
    route(
        Method::GET,
        PROXY_PATH,
        &[Capture(SITES), Literal(ATTRIBUTES, "leader")],
        Endpoint::Leader,
    ),
    // PUT
    route(
        Method::PUT,
        PROXY_PATH,
        &[Capture(SITES), Capture(PROJECTS), Capture(APPLICATIONS), Literal(ATTRIBUTES, "restart")],
        Endpoint::RestartApplication,
    ),
    route(
        Method::PUT,
        PROXY_PATH,
        &[Capture(SITES), Capture(PROJECTS), Capture(APPLICATIONS), Capture(REPLICAS)],
        Endpoint::ScaleApplication,
    ),
    route(
        Method::PUT,
        PROXY_PATH,
        &[Capture(SITES), Capture(PROJECTS), Capture(APPLICATIONS)],
        Endpoint::UpdateApplication,
    ),
    // POST
    route(
        Method::POST,
        PROXY_PATH,
        &[Capture(SITES), Capture(PROJECTS), Literal(ATTRIBUTES, "applications")],
        Endpoint::CreateApplication,
    ),
    // DELETE
    route(
        Method::DELETE,
        PROXY_PATH,
        &[Capture(SITES), Capture(PROJECTS), Capture(APPLICATIONS), Literal(ATTRIBUTES, "tasks")],
        Endpoint::KillTasks,
    ),
    route(
        Method::DELETE,
        PROXY_PATH,
        &[Capture(SITES), Capture(PROJECTS), Capture(APPLICATIONS)],
        Endpoint::DeleteApplication,
    ),
    route(
        Method::DELETE,
        PROXY_PATH,
        &[Capture(SITES), Capture(PROJECTS), Capture(DEPLOYMENTS)],
        Endpoint::DeleteDeployment,
    ),
    route(
        Method::DELETE,
        PROXY_PATH,
        &[Capture(SITES), Capture(PROJECTS)],
        Endpoint::DeleteProject,
    ),
];

/// A resolved request: the endpoint, its captured variables and the full,
/// decoded query string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub endpoint: Endpoint,
    pub vars: BTreeMap<&'static str, String>,
    pub query: Vec<(String, String)>,
}

impl RouteMatch {
    /// A captured variable
    pub fn var(&self, name: &str) -> Result<&str, AgentError> {
        self.vars
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| AgentError::Internal(format!("route captured no {:?}", name)))
    }

    /// First value of an optional query parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// True when the parameter is present with value `true`
    pub fn flag(&self, name: &str) -> bool {
        self.param(name)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}

impl Route {
    fn matches(
        &self,
        method: &Method,
        path: &str,
        query: &[(String, String)],
    ) -> Option<BTreeMap<&'static str, String>> {
        if self.method != *method || self.path != path {
            return None;
        }

        let mut vars = BTreeMap::new();
        for pair in self.query {
            match *pair {
                Literal(key, value) => {
                    if !query.iter().any(|(k, v)| k == key && v == value) {
                        return None;
                    }
                }
                Capture(key) => {
                    let (_, value) = query.iter().find(|(k, _)| k == key)?;
                    vars.insert(key, value.clone());
                }
            }
        }
        Some(vars)
    }
}

/// Decodes a raw query string into its key/value pairs, in order
pub fn parse_query(raw: Option<&str>) -> Vec<(String, String)> {
    raw.map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

/// Resolves a request against [`ROUTES`]
pub fn resolve(method: &Method, path: &str, query: Vec<(String, String)>) -> Option<RouteMatch> {
    ROUTES.iter().find_map(|route| {
        route.matches(method, path, &query).map(|vars| RouteMatch {
            endpoint: route.endpoint,
            vars,
            query: query.clone(),
        })
    })
}
