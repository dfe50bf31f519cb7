//! One deployer run: drive a deployment record onto its site

use std::fmt;
use std::sync::Arc;

use control_api::{DeploymentRecord, RequestedAction};
use scheduler_api::Application;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use crate::deploy::convert::to_scheduler_application;
use crate::deploy::decision::{decide_deploy, decide_scale, specs_match, DeployStep, ScaleStep};
use crate::deploy::fsm::{RunEvent, RunFsm, RunState};
use crate::deploy::wait::{WaitSettings, Watch};
use crate::errors::AgentError;
use crate::site::SiteApi;
use crate::utils::{generate_uuid, is_path_segment};

/// Desired remote state derived from a deployment record
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredState {
    pub site_id: String,
    pub project: String,
    pub app: String,
    /// Scheduler application with `id` and `instances` filled in
    pub application: Application,
    pub replicas: i32,
}

impl DesiredState {
    pub fn app_id(&self) -> String {
        format!("/{}/{}", self.project, self.app)
    }
}

/// Derives the desired state of a record. Fails when the record misses its
/// site, replica count or template, or when its application id points
/// outside the record's namespace.
pub fn resolve_target(record: &DeploymentRecord) -> Result<DesiredState, AgentError> {
    let site_id = record
        .site
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| {
            AgentError::ConfigError(format!("deployment {} has no site", record.label()))
        })?;
    let replicas = record.desired_replicas.ok_or_else(|| {
        AgentError::ConfigError(format!(
            "deployment {} has no desired replica count",
            record.label()
        ))
    })?;
    if replicas < 0 {
        return Err(AgentError::ConfigError(format!(
            "deployment {} asks for {} replicas",
            record.label(),
            replicas
        )));
    }
    let template = record.template.as_ref().ok_or_else(|| {
        AgentError::ConfigError(format!("deployment {} has no template", record.label()))
    })?;

    let (project, app) = resolve_app_id(&record.namespace, &template.id)?;
    let mut application = to_scheduler_application(template);
    application.id = format!("/{}/{}", project, app);
    application.instances = Some(replicas);

    Ok(DesiredState {
        site_id: site_id.to_string(),
        project,
        app,
        application,
        replicas,
    })
}

/// Splits an application id into project and app. A bare name lives in
/// `namespace`; an absolute id must be exactly `/<namespace>/<app>`.
fn resolve_app_id(namespace: &str, id: &str) -> Result<(String, String), AgentError> {
    if !is_path_segment(namespace) {
        return Err(AgentError::ConfigError(format!(
            "invalid namespace {:?}",
            namespace
        )));
    }

    let app = match id.strip_prefix('/') {
        None => id,
        Some(absolute) => {
            let parts: Vec<&str> = absolute.split('/').collect();
            let [project, app] = parts.as_slice() else {
                return Err(AgentError::ConfigError(format!(
                    "application id {:?} must have the form /<project>/<app>",
                    id
                )));
            };
            if *project != namespace {
                return Err(AgentError::TenantViolation(format!(
                    "application id {:?} is outside project {}",
                    id, namespace
                )));
            }
            *app
        }
    };

    if !is_path_segment(app) {
        return Err(AgentError::ConfigError(format!(
            "invalid application id {:?}",
            id
        )));
    }
    Ok((namespace.to_string(), app.to_string()))
}

/// What a successful run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated { deployment_id: String },
    Scaled { deployment_id: String },
    /// Already at the requested state, nothing was submitted
    Unchanged,
    /// Retry of an already submitted spec
    Resumed { deployment_id: Option<String> },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Created => write!(f, "created"),
            Outcome::Updated { deployment_id } => write!(f, "updated ({})", deployment_id),
            Outcome::Scaled { deployment_id } => write!(f, "scaled ({})", deployment_id),
            Outcome::Unchanged => write!(f, "unchanged"),
            Outcome::Resumed {
                deployment_id: Some(id),
            } => write!(f, "resumed ({})", id),
            Outcome::Resumed { deployment_id: None } => write!(f, "resumed"),
        }
    }
}

/// Summary of a successful run
#[derive(Debug, Clone)]
pub struct DeployReport {
    pub run_id: String,
    pub record: String,
    pub action: RequestedAction,
    pub site_id: String,
    pub app_id: String,
    pub outcome: Outcome,
}

impl fmt::Display for DeployReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} of {} on site {}: {}",
            self.record, self.action, self.app_id, self.site_id, self.outcome
        )
    }
}

/// Drives one deployment record onto its site. Every error is fatal for the
/// run.
pub struct Deployer {
    run_id: String,
    record: DeploymentRecord,
    siblings: Vec<DeploymentRecord>,
    site: Arc<dyn SiteApi>,
    wait: WaitSettings,
    fsm: RunFsm,
}

impl Deployer {
    /// `siblings` are the other records of the same deployment config,
    /// consulted when reconciling.
    pub fn new(
        record: DeploymentRecord,
        siblings: Vec<DeploymentRecord>,
        site: Arc<dyn SiteApi>,
        wait: WaitSettings,
    ) -> Self {
        Self {
            run_id: generate_uuid(),
            record,
            siblings,
            site,
            wait,
            fsm: RunFsm::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn state(&self) -> RunState {
        self.fsm.state()
    }

    /// Executes the run until the remote state converged or the run failed.
    pub async fn execute(&mut self, cancel: &CancellationToken) -> Result<DeployReport, AgentError> {
        let span = info_span!("deploy", run_id = %self.run_id, record = %self.record.label());
        let result = self.run(cancel).instrument(span.clone()).await;

        let _entered = span.enter();
        match &result {
            Ok(report) => info!("Deployment run succeeded: {}", report),
            Err(e) => {
                error!("Deployment run failed: {}", e);
                if !self.fsm.state().is_terminal() {
                    self.fsm.process(RunEvent::Fail(e.to_string()))?;
                }
            }
        }
        result
    }

    /// Newest complete sibling record, excluding the record being run
    pub fn rollback_target(&self) -> Option<&DeploymentRecord> {
        let mut candidates: Vec<&DeploymentRecord> = self
            .siblings
            .iter()
            .filter(|r| r.config_name == self.record.config_name && r.name != self.record.name)
            .collect();
        candidates.sort_by(|a, b| b.version.cmp(&a.version));
        candidates.into_iter().find(|r| r.is_complete())
    }

    fn check_site(&self, desired: &DesiredState) -> Result<(), AgentError> {
        if desired.site_id != self.site.site_id() {
            return Err(AgentError::ConfigError(format!(
                "deployment targets site {} but the client is bound to site {}",
                desired.site_id,
                self.site.site_id()
            )));
        }
        Ok(())
    }

    async fn run(&mut self, cancel: &CancellationToken) -> Result<DeployReport, AgentError> {
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled("deployment run cancelled".to_string()));
        }
        self.fsm.process(RunEvent::Loaded)?;

        let action = self.record.requested_action();
        info!("Requested action: {}", action);

        let desired = resolve_target(&self.record)?;
        self.check_site(&desired)?;
        self.fsm.process(RunEvent::Resolved)?;

        let site = Arc::clone(&self.site);
        let wait = self.wait.clone();
        let watch = Watch {
            site: site.as_ref(),
            project: &desired.project,
            settings: &wait,
            cancel,
        };

        let actual = site.get_application(&desired.project, &desired.app).await?;
        self.fsm.process(RunEvent::Fetched)?;

        let outcome = match action {
            RequestedAction::Deploy => self.deploy(&watch, &desired, actual, false).await?,
            RequestedAction::Scale { .. } => self.scale(&watch, &desired, actual).await?,
            RequestedAction::Retry { .. } => self.retry(&watch, &desired, actual).await?,
            RequestedAction::Reconcile { .. } => {
                self.reconcile(&watch, &desired, actual).await?
            }
        };

        Ok(DeployReport {
            run_id: self.run_id.clone(),
            record: self.record.label(),
            action,
            site_id: desired.site_id.clone(),
            app_id: desired.app_id(),
            outcome,
        })
    }

    async fn deploy(
        &mut self,
        watch: &Watch<'_>,
        desired: &DesiredState,
        actual: Option<Application>,
        force: bool,
    ) -> Result<Outcome, AgentError> {
        match decide_deploy(actual.as_ref(), force) {
            DeployStep::Abort { deployment_id } => Err(AgentError::DeployError(format!(
                "application {} is already in deployment {}",
                desired.app_id(),
                deployment_id
            ))),
            DeployStep::Create => {
                self.fsm.process(RunEvent::Decided)?;
                info!("Creating application {}", desired.app_id());
                watch
                    .site
                    .create_application(&desired.project, &desired.application)
                    .await?;
                self.converge(watch, desired, None).await?;
                Ok(Outcome::Created)
            }
            DeployStep::Update => {
                self.fsm.process(RunEvent::Decided)?;
                info!("Updating application {} (force: {})", desired.app_id(), force);
                let deployment = watch
                    .site
                    .update_application(&desired.project, &desired.app, &desired.application, force)
                    .await?;
                self.converge(watch, desired, Some(&deployment.deployment_id))
                    .await?;
                Ok(Outcome::Updated {
                    deployment_id: deployment.deployment_id,
                })
            }
        }
    }

    async fn scale(
        &mut self,
        watch: &Watch<'_>,
        desired: &DesiredState,
        actual: Option<Application>,
    ) -> Result<Outcome, AgentError> {
        match decide_scale(actual.as_ref(), desired.replicas) {
            ScaleStep::Missing => Err(AgentError::DeployError(format!(
                "application {} does not exist, nothing to scale",
                desired.app_id()
            ))),
            ScaleStep::Busy { deployment_id } => Err(AgentError::DeployError(format!(
                "application {} is already in deployment {}",
                desired.app_id(),
                deployment_id
            ))),
            ScaleStep::Unchanged => {
                info!(
                    "Application {} already runs {} instances",
                    desired.app_id(),
                    desired.replicas
                );
                self.fsm.process(RunEvent::NoChange)?;
                Ok(Outcome::Unchanged)
            }
            ScaleStep::Scale => {
                self.fsm.process(RunEvent::Decided)?;
                info!(
                    "Scaling application {} to {} instances",
                    desired.app_id(),
                    desired.replicas
                );
                let deployment = watch
                    .site
                    .scale_application(&desired.project, &desired.app, desired.replicas, false)
                    .await?;
                self.converge(watch, desired, Some(&deployment.deployment_id))
                    .await?;
                Ok(Outcome::Scaled {
                    deployment_id: deployment.deployment_id,
                })
            }
        }
    }

    async fn retry(
        &mut self,
        watch: &Watch<'_>,
        desired: &DesiredState,
        actual: Option<Application>,
    ) -> Result<Outcome, AgentError> {
        let in_flight = match &actual {
            Some(app) if specs_match(&desired.application, app) => {
                Some(app.active_deployment_id().map(str::to_string))
            }
            _ => None,
        };

        let Some(deployment_id) = in_flight else {
            info!("Spec of {} changed, deploying again", desired.app_id());
            return self.deploy(watch, desired, actual, false).await;
        };

        info!(
            "Spec of {} already submitted, resuming the wait",
            desired.app_id()
        );
        self.fsm.process(RunEvent::Decided)?;
        self.converge(watch, desired, deployment_id.as_deref())
            .await?;
        Ok(Outcome::Resumed { deployment_id })
    }

    async fn reconcile(
        &mut self,
        watch: &Watch<'_>,
        desired: &DesiredState,
        actual: Option<Application>,
    ) -> Result<Outcome, AgentError> {
        let target = match self.rollback_target() {
            Some(record) => {
                info!(
                    "Rolling back {} to {} (version {})",
                    desired.app_id(),
                    record.name,
                    record.version
                );
                Some(resolve_target(record)?)
            }
            None => None,
        };

        match target {
            Some(target) => {
                self.check_site(&target)?;
                if target.app_id() != desired.app_id() {
                    return Err(AgentError::ConfigError(format!(
                        "rollback target deploys {} instead of {}",
                        target.app_id(),
                        desired.app_id()
                    )));
                }
                self.deploy(watch, &target, actual, true).await
            }
            None => self.abandon(watch, desired, actual).await,
        }
    }

    /// Nothing to roll back to: cancel whatever is in flight and fail.
    async fn abandon(
        &mut self,
        watch: &Watch<'_>,
        desired: &DesiredState,
        actual: Option<Application>,
    ) -> Result<Outcome, AgentError> {
        let nowhere = format!(
            "no complete deployment of {} to roll back to",
            desired.app_id()
        );
        let Some(deployment_id) = actual
            .as_ref()
            .and_then(|app| app.active_deployment_id())
            .map(str::to_string)
        else {
            return Err(AgentError::DeployError(nowhere));
        };

        self.fsm.process(RunEvent::Decided)?;
        warn!("Cancelling deployment {} of {}", deployment_id, desired.app_id());
        // Without force the scheduler rolls the deployment back instead of stopping it in place.
        let rollback = match watch
            .site
            .delete_deployment(&desired.project, &deployment_id, false)
            .await
        {
            Ok(rollback) => rollback,
            Err(e) => {
                return Err(AgentError::DeployError(format!(
                    "{}; cancelling deployment {} failed: {}",
                    nowhere, deployment_id, e
                )))
            }
        };

        if let Some(rollback) = rollback {
            let deadline = watch.deadline_for(&desired.application);
            match watch
                .wait_for_deployment(&rollback.deployment_id, deadline)
                .await
            {
                Err(e @ AgentError::Cancelled(_)) => return Err(e),
                Err(e) => warn!("Rollback of {} did not finish: {}", desired.app_id(), e),
                Ok(()) => {}
            }
        }
        Err(AgentError::DeployError(nowhere))
    }

    async fn converge(
        &mut self,
        watch: &Watch<'_>,
        desired: &DesiredState,
        deployment_id: Option<&str>,
    ) -> Result<(), AgentError> {
        self.fsm.process(RunEvent::Executed)?;
        watch
            .await_convergence(&desired.app, deployment_id, &desired.application)
            .await?;
        self.fsm.process(RunEvent::Converged)
    }
}
