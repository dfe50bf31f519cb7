//! Convergence polling after a mutating call

use std::time::Duration;

use scheduler_api::Application;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::AgentError;
use crate::site::SiteApi;

/// Convergence polling settings
#[derive(Debug, Clone)]
pub struct WaitSettings {
    /// Delay between two polls
    pub interval: Duration,

    /// Deadline for apps whose health checks do not ask for more
    pub base_timeout: Duration,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            base_timeout: Duration::from_secs(360),
        }
    }
}

/// The larger of `base` and the longest health check grace period of `app`
pub fn determine_timeout(base: Duration, app: &Application) -> Duration {
    let grace = app
        .max_grace_period_seconds()
        .filter(|secs| *secs > 0)
        .map(|secs| Duration::from_secs(secs as u64))
        .unwrap_or_default();
    base.max(grace)
}

/// An application is ok once all its instances run and, when it declares
/// health checks, every task reports alive results. Zero instances is
/// trivially ok.
pub fn is_application_ok(app: &Application) -> bool {
    let instances = app.instances.unwrap_or_default();
    if instances == 0 {
        return true;
    }
    if app.tasks_running.unwrap_or_default() != instances || !app.all_tasks_running() {
        return false;
    }
    !app.has_health_checks() || app.all_tasks_healthy()
}

/// Polls one application of one project until it converges, the deadline
/// passes or the run is cancelled.
pub struct Watch<'a> {
    pub site: &'a dyn SiteApi,
    pub project: &'a str,
    pub settings: &'a WaitSettings,
    pub cancel: &'a CancellationToken,
}

impl Watch<'_> {
    /// Deadline of a convergence wait for `desired`, starting now
    pub fn deadline_for(&self, desired: &Application) -> Instant {
        Instant::now() + determine_timeout(self.settings.base_timeout, desired)
    }

    /// Waits for `deployment_id` to finish, if known, then for `app` to be ok.
    /// Both phases share one deadline.
    pub async fn await_convergence(
        &self,
        app: &str,
        deployment_id: Option<&str>,
        desired: &Application,
    ) -> Result<(), AgentError> {
        let deadline = self.deadline_for(desired);
        if let Some(id) = deployment_id {
            self.wait_for_deployment(id, deadline).await?;
        }
        self.wait_for_application(app, deadline).await
    }

    /// Polls until the gateway no longer reports the deployment
    pub async fn wait_for_deployment(
        &self,
        deployment_id: &str,
        deadline: Instant,
    ) -> Result<(), AgentError> {
        info!("Waiting for deployment {} to finish", deployment_id);
        loop {
            self.check_cancelled()?;
            match self.site.get_deployment(self.project, deployment_id).await {
                Ok(None) => {
                    info!("Deployment {} finished", deployment_id);
                    return Ok(());
                }
                Ok(Some(deployment)) => debug!(
                    "Deployment {} at step {}/{}",
                    deployment_id, deployment.current_step, deployment.total_steps
                ),
                Err(e) => warn!("Failed to poll deployment {}: {}", deployment_id, e),
            }
            self.pause(deadline, &format!("deployment {}", deployment_id))
                .await?;
        }
    }

    /// Polls until the application is ok. An application that disappeared
    /// was rolled back to nothing by the scheduler, which ends the wait.
    pub async fn wait_for_application(&self, app: &str, deadline: Instant) -> Result<(), AgentError> {
        info!("Waiting for application /{}/{} to converge", self.project, app);
        loop {
            self.check_cancelled()?;
            match self.site.get_application(self.project, app).await {
                Ok(None) => {
                    warn!("Application /{}/{} no longer exists", self.project, app);
                    return Ok(());
                }
                Ok(Some(actual)) if is_application_ok(&actual) => {
                    info!("Application {} converged", actual.id);
                    return Ok(());
                }
                Ok(Some(actual)) => debug!(
                    "Application {}: {}/{} tasks running",
                    actual.id,
                    actual.tasks_running.unwrap_or_default(),
                    actual.instances.unwrap_or_default()
                ),
                Err(e) => warn!("Failed to poll application /{}/{}: {}", self.project, app, e),
            }
            self.pause(deadline, &format!("application /{}/{}", self.project, app))
                .await?;
        }
    }

    fn check_cancelled(&self) -> Result<(), AgentError> {
        if self.cancel.is_cancelled() {
            return Err(AgentError::Cancelled("deployment run cancelled".to_string()));
        }
        Ok(())
    }

    async fn pause(&self, deadline: Instant, what: &str) -> Result<(), AgentError> {
        let now = Instant::now();
        if now >= deadline {
            return Err(AgentError::Timeout(format!(
                "{} did not converge in time",
                what
            )));
        }
        let wake = (now + self.settings.interval).min(deadline);
        tokio::select! {
            _ = self.cancel.cancelled() => {
                Err(AgentError::Cancelled(format!("stopped waiting for {}", what)))
            }
            _ = sleep_until(wake) => Ok(()),
        }
    }
}
