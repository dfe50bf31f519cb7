//! Shared fakes for the integration tests
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use scheduler_api::{
    Application, ApplicationVersions, Deployment, DeploymentId, DeploymentRef, Group, Info,
    Leader, Task, Tasks, TASK_RUNNING,
};
use siteagent::errors::AgentError;
use siteagent::scheduler::{ApplicationFilter, Scheduler};
use siteagent::site::SiteApi;

const MUTATIONS: &[&str] = &[
    "create",
    "update",
    "scale",
    "restart",
    "delete_app",
    "kill",
    "delete_group",
    "delete_deployment",
];

#[derive(Default)]
struct FakeState {
    apps: BTreeMap<String, Application>,
    deployments: Vec<Deployment>,
    calls: Vec<String>,
    /// Remaining polls before an application converges
    pending: BTreeMap<String, u32>,
    converge_after: u32,
    never_converge: bool,
    reject_deployment_deletes: bool,
}

/// In-memory scheduler that records every call.
///
/// Applications touched by a mutating call converge after `converge_after`
/// read calls; their deployment disappears at the same time.
#[derive(Default)]
pub struct FakeScheduler {
    state: Mutex<FakeState>,
}

impl FakeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn converging_after(polls: u32) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().converge_after = polls;
        fake
    }

    pub fn never_converging() -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().never_converge = true;
        fake
    }

    pub fn reject_deployment_deletes(&self) {
        self.state.lock().unwrap().reject_deployment_deletes = true;
    }

    /// Seeds a converged application
    pub fn insert_app(&self, app: Application) {
        let mut state = self.state.lock().unwrap();
        let app = running(app);
        state.apps.insert(app.id.clone(), app);
    }

    /// Seeds an application with an in-flight deployment
    pub fn insert_deploying_app(&self, app: Application, deployment_id: &str) {
        let mut state = self.state.lock().unwrap();
        let mut app = running(app);
        app.deployments = Some(vec![DeploymentRef {
            id: deployment_id.to_string(),
        }]);
        state.deployments.push(Deployment {
            id: deployment_id.to_string(),
            version: "v0".to_string(),
            affected_apps: vec![app.id.clone()],
            current_step: 1,
            total_steps: 2,
            ..Default::default()
        });
        // One extra poll so the deployment is still visible to the first read.
        let polls = state.converge_after;
        state.pending.insert(app.id.clone(), polls.max(1) + 1);
        state.apps.insert(app.id.clone(), app);
    }

    pub fn insert_deployment(&self, deployment: Deployment) {
        self.state.lock().unwrap().deployments.push(deployment);
    }

    pub fn app(&self, id: &str) -> Option<Application> {
        self.state.lock().unwrap().apps.get(id).cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| {
                let verb = call.split(' ').next().unwrap_or_default();
                MUTATIONS.contains(&verb)
            })
            .collect()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    /// Advances every pending application by one poll
    fn tick(&self) {
        let mut state = self.state.lock().unwrap();
        if state.never_converge {
            return;
        }
        let mut done = Vec::new();
        for (id, remaining) in state.pending.iter_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                done.push(id.clone());
            }
        }
        for id in done {
            state.pending.remove(&id);
            state.deployments.retain(|d| !d.affected_apps.contains(&id));
            if let Some(app) = state.apps.remove(&id) {
                state.apps.insert(id, running(app));
            }
        }
    }

    /// Marks `app` as deploying and returns the new deployment id
    fn start_deployment(&self, mut app: Application) -> DeploymentId {
        let mut state = self.state.lock().unwrap();
        let id = uuid::Uuid::new_v4().to_string();
        let version = format!("v{}", state.calls.len());

        app.version = Some(version.clone());
        app.tasks = Some(Vec::new());
        app.tasks_running = Some(0);
        app.deployments = Some(vec![DeploymentRef { id: id.clone() }]);
        state.deployments.retain(|d| !d.affected_apps.contains(&app.id));
        state.deployments.push(Deployment {
            id: id.clone(),
            version: version.clone(),
            affected_apps: vec![app.id.clone()],
            current_step: 1,
            total_steps: 1,
            ..Default::default()
        });
        let polls = state.converge_after;
        state.pending.insert(app.id.clone(), polls.max(1));
        state.apps.insert(app.id.clone(), app);

        DeploymentId {
            deployment_id: id,
            version,
        }
    }

    fn lookup(&self, id: &str) -> Result<Application, AgentError> {
        self.state
            .lock()
            .unwrap()
            .apps
            .get(id)
            .cloned()
            .ok_or_else(|| AgentError::NotFound(format!("App '{}' does not exist", id)))
    }
}

/// `app` with every instance running and no deployment in flight
pub fn running(mut app: Application) -> Application {
    let instances = app.instances.unwrap_or(1);
    let project_app = app.id.trim_start_matches('/').replace('/', "_");
    app.tasks = Some(
        (0..instances)
            .map(|i| Task {
                id: format!("{}.{}", project_app, i),
                app_id: app.id.clone(),
                state: Some(TASK_RUNNING.to_string()),
                started_at: Some("2024-01-01T00:00:00.000Z".to_string()),
                ..Default::default()
            })
            .collect(),
    );
    app.tasks_running = Some(instances);
    app.instances = Some(instances);
    app.deployments = Some(Vec::new());
    app
}

#[async_trait]
impl Scheduler for FakeScheduler {
    async fn applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, AgentError> {
        self.record(format!("applications {:?}", filter.label));
        Ok(self.state.lock().unwrap().apps.values().cloned().collect())
    }

    async fn application(&self, id: &str) -> Result<Application, AgentError> {
        self.record(format!("application {}", id));
        self.tick();
        self.lookup(id)
    }

    async fn application_versions(&self, id: &str) -> Result<ApplicationVersions, AgentError> {
        self.record(format!("versions {}", id));
        let app = self.lookup(id)?;
        Ok(ApplicationVersions {
            versions: app.version.into_iter().collect(),
        })
    }

    async fn application_by_version(
        &self,
        id: &str,
        version: &str,
    ) -> Result<Application, AgentError> {
        self.record(format!("version {} {}", id, version));
        let app = self.lookup(id)?;
        if app.version.as_deref() == Some(version) {
            Ok(app)
        } else {
            Err(AgentError::NotFound(format!("{} {}", id, version)))
        }
    }

    async fn create_application(&self, app: &Application) -> Result<Application, AgentError> {
        self.record(format!("create {}", app.id));
        if self.state.lock().unwrap().apps.contains_key(&app.id) {
            return Err(AgentError::SchedulerRejection(format!(
                "409 Conflict: An app with id [{}] already exists.",
                app.id
            )));
        }
        self.start_deployment(app.clone());
        let mut created = app.clone();
        created.deployments = Some(Vec::new());
        Ok(created)
    }

    async fn update_application(
        &self,
        app: &Application,
        force: bool,
    ) -> Result<DeploymentId, AgentError> {
        self.record(format!("update {} force={}", app.id, force));
        Ok(self.start_deployment(app.clone()))
    }

    async fn scale_application(
        &self,
        id: &str,
        instances: i32,
        force: bool,
    ) -> Result<DeploymentId, AgentError> {
        self.record(format!("scale {} {} force={}", id, instances, force));
        let mut app = self.lookup(id)?;
        app.instances = Some(instances);
        Ok(self.start_deployment(app))
    }

    async fn restart_application(
        &self,
        id: &str,
        force: bool,
    ) -> Result<DeploymentId, AgentError> {
        self.record(format!("restart {} force={}", id, force));
        let app = self.lookup(id)?;
        Ok(self.start_deployment(app))
    }

    async fn delete_application(&self, id: &str) -> Result<DeploymentId, AgentError> {
        self.record(format!("delete_app {}", id));
        self.lookup(id)?;
        self.state.lock().unwrap().apps.remove(id);
        Ok(DeploymentId {
            deployment_id: uuid::Uuid::new_v4().to_string(),
            version: String::new(),
        })
    }

    async fn tasks(&self, app_id: &str) -> Result<Tasks, AgentError> {
        self.record(format!("tasks {}", app_id));
        let app = self.lookup(app_id)?;
        Ok(Tasks {
            tasks: app.tasks.unwrap_or_default(),
        })
    }

    async fn kill_tasks(&self, ids: &[String], scale: bool) -> Result<(), AgentError> {
        self.record(format!("kill {} scale={}", ids.join(","), scale));
        Ok(())
    }

    async fn groups(&self) -> Result<Group, AgentError> {
        self.record("groups".to_string());
        Ok(Group {
            id: "/".to_string(),
            apps: Some(self.state.lock().unwrap().apps.values().cloned().collect()),
            ..Default::default()
        })
    }

    async fn group(&self, id: &str) -> Result<Group, AgentError> {
        self.record(format!("group {}", id));
        let prefix = format!("{}/", id);
        let apps: Vec<Application> = self
            .state
            .lock()
            .unwrap()
            .apps
            .values()
            .filter(|app| app.id.starts_with(&prefix))
            .cloned()
            .collect();
        if apps.is_empty() {
            return Err(AgentError::NotFound(format!("Group '{}' does not exist", id)));
        }
        Ok(Group {
            id: id.to_string(),
            apps: Some(apps),
            ..Default::default()
        })
    }

    async fn delete_group(&self, id: &str, force: bool) -> Result<DeploymentId, AgentError> {
        self.record(format!("delete_group {} force={}", id, force));
        Ok(DeploymentId {
            deployment_id: uuid::Uuid::new_v4().to_string(),
            version: String::new(),
        })
    }

    async fn deployments(&self) -> Result<Vec<Deployment>, AgentError> {
        self.record("deployments".to_string());
        self.tick();
        Ok(self.state.lock().unwrap().deployments.clone())
    }

    async fn delete_deployment(
        &self,
        id: &str,
        force: bool,
    ) -> Result<DeploymentId, AgentError> {
        self.record(format!("delete_deployment {} force={}", id, force));
        let mut state = self.state.lock().unwrap();
        if state.reject_deployment_deletes {
            return Err(AgentError::SchedulerError(
                "503 Service Unavailable: leader election in progress".to_string(),
            ));
        }
        let Some(position) = state.deployments.iter().position(|d| d.id == id) else {
            return Err(AgentError::NotFound(format!(
                "DeploymentPlan {} does not exist",
                id
            )));
        };
        let deployment = state.deployments.remove(position);
        for app_id in &deployment.affected_apps {
            state.pending.remove(app_id);
            if let Some(app) = state.apps.get_mut(app_id) {
                app.deployments = Some(Vec::new());
            }
        }
        Ok(DeploymentId {
            deployment_id: format!("rollback-{}", id),
            version: String::new(),
        })
    }

    async fn info(&self) -> Result<Info, AgentError> {
        self.record("info".to_string());
        Ok(Info {
            name: "marathon".to_string(),
            version: "1.11.24".to_string(),
            ..Default::default()
        })
    }

    async fn leader(&self) -> Result<Leader, AgentError> {
        self.record("leader".to_string());
        Ok(Leader {
            leader: "master-1:8080".to_string(),
        })
    }
}

/// [`SiteApi`] straight over a [`FakeScheduler`], without HTTP in between
pub struct FakeSite {
    pub site_id: String,
    pub scheduler: Arc<FakeScheduler>,
}

impl FakeSite {
    pub fn new(site_id: &str, scheduler: Arc<FakeScheduler>) -> Self {
        Self {
            site_id: site_id.to_string(),
            scheduler,
        }
    }
}

fn absent_as_none<T>(result: Result<T, AgentError>) -> Result<Option<T>, AgentError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl SiteApi for FakeSite {
    fn site_id(&self) -> &str {
        &self.site_id
    }

    async fn get_application(
        &self,
        project: &str,
        app: &str,
    ) -> Result<Option<Application>, AgentError> {
        absent_as_none(self.scheduler.application(&format!("/{}/{}", project, app)).await)
    }

    async fn create_application(
        &self,
        _project: &str,
        app: &Application,
    ) -> Result<Application, AgentError> {
        self.scheduler.create_application(app).await
    }

    async fn update_application(
        &self,
        _project: &str,
        _app_name: &str,
        app: &Application,
        force: bool,
    ) -> Result<DeploymentId, AgentError> {
        self.scheduler.update_application(app, force).await
    }

    async fn scale_application(
        &self,
        project: &str,
        app: &str,
        replicas: i32,
        force: bool,
    ) -> Result<DeploymentId, AgentError> {
        self.scheduler
            .scale_application(&format!("/{}/{}", project, app), replicas, force)
            .await
    }

    async fn get_deployment(
        &self,
        _project: &str,
        deployment_id: &str,
    ) -> Result<Option<Deployment>, AgentError> {
        Ok(self
            .scheduler
            .deployments()
            .await?
            .into_iter()
            .find(|d| d.id == deployment_id))
    }

    async fn delete_deployment(
        &self,
        _project: &str,
        deployment_id: &str,
        force: bool,
    ) -> Result<Option<DeploymentId>, AgentError> {
        absent_as_none(self.scheduler.delete_deployment(deployment_id, force).await)
    }
}
