//! Deployer unit tests

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use common::{FakeScheduler, FakeSite};
use control_api::{
    AppTemplate, DeploymentPhase, DeploymentRecord, HealthCheckTemplate, RECONCILE_ANNOTATION,
    RETRY_ANNOTATION, SCALE_ANNOTATION,
};
use scheduler_api::Application;
use siteagent::deploy::fsm::RunState;
use siteagent::deploy::wait::WaitSettings;
use siteagent::deploy::{resolve_target, Deployer, Outcome};
use siteagent::errors::AgentError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn create_test_record(name: &str, version: i64, cmd: &str) -> DeploymentRecord {
    DeploymentRecord {
        name: name.to_string(),
        namespace: "ns1".to_string(),
        config_name: "web".to_string(),
        version,
        latest_version: version,
        site: Some("west".to_string()),
        desired_replicas: Some(3),
        template: Some(AppTemplate {
            id: "web".to_string(),
            cmd: Some(cmd.to_string()),
            cpus: Some(0.5),
            ..Default::default()
        }),
        status: DeploymentPhase::New,
        annotations: BTreeMap::new(),
    }
}

fn annotated(mut record: DeploymentRecord, key: &str) -> DeploymentRecord {
    record
        .annotations
        .insert(key.to_string(), record.latest_version.to_string());
    record
}

fn deployer(
    record: DeploymentRecord,
    siblings: Vec<DeploymentRecord>,
    scheduler: &Arc<FakeScheduler>,
) -> Deployer {
    Deployer::new(
        record,
        siblings,
        Arc::new(FakeSite::new("west", scheduler.clone())),
        WaitSettings::default(),
    )
}

fn existing_app(instances: i32) -> Application {
    Application {
        instances: Some(instances),
        cmd: Some("./serve".to_string()),
        ..Application::new("/ns1/web")
    }
}

#[tokio::test(start_paused = true)]
async fn test_deploy_creates_absent_application() {
    let scheduler = Arc::new(FakeScheduler::converging_after(3));
    let mut deployer = deployer(create_test_record("web-1", 1, "./serve"), vec![], &scheduler);

    let report = deployer.execute(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.outcome, Outcome::Created);
    assert_eq!(report.app_id, "/ns1/web");
    assert_eq!(scheduler.mutations(), vec!["create /ns1/web"]);
    let app = scheduler.app("/ns1/web").unwrap();
    assert_eq!(app.instances, Some(3));
    assert_eq!(app.tasks_running, Some(3));
    assert_eq!(deployer.state(), RunState::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn test_deploy_updates_idle_application() {
    let scheduler = Arc::new(FakeScheduler::converging_after(2));
    scheduler.insert_app(existing_app(1));
    let mut deployer = deployer(create_test_record("web-2", 2, "./serve --v2"), vec![], &scheduler);

    let report = deployer.execute(&CancellationToken::new()).await.unwrap();

    assert!(matches!(report.outcome, Outcome::Updated { .. }));
    assert_eq!(scheduler.mutations(), vec!["update /ns1/web force=false"]);
    let app = scheduler.app("/ns1/web").unwrap();
    assert_eq!(app.cmd.as_deref(), Some("./serve --v2"));
    assert_eq!(app.instances, Some(3));
}

#[tokio::test(start_paused = true)]
async fn test_deploy_aborts_on_deployment_in_progress() {
    let scheduler = Arc::new(FakeScheduler::new());
    scheduler.insert_deploying_app(existing_app(1), "d1");
    let mut deployer = deployer(create_test_record("web-2", 2, "./serve"), vec![], &scheduler);

    let err = deployer.execute(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, AgentError::DeployError(msg) if msg.contains("d1")));
    assert!(scheduler.mutations().is_empty());
    assert_eq!(deployer.state(), RunState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_scale_is_a_no_op_when_instances_match() {
    let scheduler = Arc::new(FakeScheduler::new());
    scheduler.insert_app(existing_app(3));
    let record = annotated(create_test_record("web-2", 2, "./serve"), SCALE_ANNOTATION);
    let mut deployer = deployer(record, vec![], &scheduler);

    let report = deployer.execute(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.outcome, Outcome::Unchanged);
    assert!(scheduler.mutations().is_empty());
    assert_eq!(deployer.state(), RunState::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn test_scale_changes_instances() {
    let scheduler = Arc::new(FakeScheduler::converging_after(2));
    scheduler.insert_app(existing_app(1));
    let record = annotated(create_test_record("web-2", 2, "./serve"), SCALE_ANNOTATION);
    let mut deployer = deployer(record, vec![], &scheduler);

    let report = deployer.execute(&CancellationToken::new()).await.unwrap();

    assert!(matches!(report.outcome, Outcome::Scaled { .. }));
    assert_eq!(scheduler.mutations(), vec!["scale /ns1/web 3 force=false"]);
    assert_eq!(scheduler.app("/ns1/web").unwrap().tasks_running, Some(3));
}

#[tokio::test(start_paused = true)]
async fn test_scale_of_absent_application_fails() {
    let scheduler = Arc::new(FakeScheduler::new());
    let record = annotated(create_test_record("web-2", 2, "./serve"), SCALE_ANNOTATION);
    let mut deployer = deployer(record, vec![], &scheduler);

    let err = deployer.execute(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, AgentError::DeployError(_)));
    assert!(scheduler.mutations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_scale_during_deployment_fails() {
    let scheduler = Arc::new(FakeScheduler::new());
    scheduler.insert_deploying_app(existing_app(1), "d1");
    let record = annotated(create_test_record("web-2", 2, "./serve"), SCALE_ANNOTATION);
    let mut deployer = deployer(record, vec![], &scheduler);

    assert!(deployer.execute(&CancellationToken::new()).await.is_err());
    assert!(scheduler.mutations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stale_scale_annotation_deploys() {
    let scheduler = Arc::new(FakeScheduler::converging_after(1));
    scheduler.insert_app(existing_app(3));
    let mut record = create_test_record("web-2", 2, "./serve --v2");
    record
        .annotations
        .insert(SCALE_ANNOTATION.to_string(), "1".to_string());
    let mut deployer = deployer(record, vec![], &scheduler);

    deployer.execute(&CancellationToken::new()).await.unwrap();

    assert_eq!(scheduler.mutations(), vec!["update /ns1/web force=false"]);
}

#[tokio::test(start_paused = true)]
async fn test_retry_with_submitted_spec_only_waits() {
    let scheduler = Arc::new(FakeScheduler::converging_after(3));
    let record = annotated(create_test_record("web-2", 2, "./serve"), RETRY_ANNOTATION);
    let desired = resolve_target(&record).unwrap().application;
    scheduler.insert_deploying_app(desired, "d1");
    let mut deployer = deployer(record, vec![], &scheduler);

    let report = deployer.execute(&CancellationToken::new()).await.unwrap();

    assert_eq!(
        report.outcome,
        Outcome::Resumed {
            deployment_id: Some("d1".to_string())
        }
    );
    assert!(scheduler.mutations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_retry_with_changed_spec_deploys() {
    let scheduler = Arc::new(FakeScheduler::converging_after(1));
    scheduler.insert_app(existing_app(3));
    let record = annotated(create_test_record("web-2", 2, "./serve --v2"), RETRY_ANNOTATION);
    let mut deployer = deployer(record, vec![], &scheduler);

    let report = deployer.execute(&CancellationToken::new()).await.unwrap();

    assert!(matches!(report.outcome, Outcome::Updated { .. }));
    assert_eq!(scheduler.mutations(), vec!["update /ns1/web force=false"]);
}

#[tokio::test(start_paused = true)]
async fn test_reconcile_rolls_back_to_last_complete_record() {
    let scheduler = Arc::new(FakeScheduler::converging_after(2));
    scheduler.insert_deploying_app(existing_app(3), "d2");

    let mut complete = create_test_record("web-1", 1, "./serve --v1");
    complete.status = DeploymentPhase::Complete;
    let mut failed = create_test_record("web-0", 0, "./serve --v0");
    failed.status = DeploymentPhase::Failed;
    let current = annotated(create_test_record("web-2", 2, "./serve --v2"), RECONCILE_ANNOTATION);
    let siblings = vec![failed, complete, current.clone()];
    let mut deployer = deployer(current, siblings, &scheduler);

    assert_eq!(deployer.rollback_target().unwrap().name, "web-1");
    deployer.execute(&CancellationToken::new()).await.unwrap();

    assert_eq!(scheduler.mutations(), vec!["update /ns1/web force=true"]);
    let app = scheduler.app("/ns1/web").unwrap();
    assert_eq!(app.cmd.as_deref(), Some("./serve --v1"));
}

#[tokio::test(start_paused = true)]
async fn test_reconcile_without_target_cancels_and_fails() {
    let scheduler = Arc::new(FakeScheduler::new());
    scheduler.insert_deploying_app(existing_app(3), "d2");
    let current = annotated(create_test_record("web-2", 2, "./serve"), RECONCILE_ANNOTATION);
    let mut deployer = deployer(current, vec![], &scheduler);

    let err = deployer.execute(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(&err, AgentError::DeployError(msg) if msg.contains("roll back")));
    assert_eq!(scheduler.mutations(), vec!["delete_deployment d2 force=false"]);
    assert_eq!(deployer.state(), RunState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_reconcile_without_target_or_deployment_fails() {
    let scheduler = Arc::new(FakeScheduler::new());
    scheduler.insert_app(existing_app(3));
    let current = annotated(create_test_record("web-2", 2, "./serve"), RECONCILE_ANNOTATION);
    let mut deployer = deployer(current, vec![], &scheduler);

    assert!(matches!(
        deployer.execute(&CancellationToken::new()).await,
        Err(AgentError::DeployError(_))
    ));
    assert!(scheduler.mutations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reconcile_reports_failed_cancellation() {
    let scheduler = Arc::new(FakeScheduler::new());
    scheduler.insert_deploying_app(existing_app(3), "d2");
    scheduler.reject_deployment_deletes();
    let current = annotated(create_test_record("web-2", 2, "./serve"), RECONCILE_ANNOTATION);
    let mut deployer = deployer(current, vec![], &scheduler);

    let err = deployer.execute(&CancellationToken::new()).await.unwrap_err();

    assert!(
        matches!(&err, AgentError::DeployError(msg) if msg.contains("cancelling deployment d2 failed"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_never_converging_application_times_out() {
    let scheduler = Arc::new(FakeScheduler::never_converging());
    let mut deployer = deployer(create_test_record("web-1", 1, "./serve"), vec![], &scheduler);

    let err = deployer.execute(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, AgentError::Timeout(_)));
    assert_eq!(deployer.state(), RunState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_health_check_grace_period_extends_the_deadline() {
    let scheduler = Arc::new(FakeScheduler::never_converging());
    let mut record = create_test_record("web-1", 1, "./serve");
    if let Some(template) = record.template.as_mut() {
        template.health_checks = vec![HealthCheckTemplate {
            protocol: "HTTP".to_string(),
            path: Some("/health".to_string()),
            port_index: Some(0),
            grace_period_seconds: 900,
            interval_seconds: 10,
            timeout_seconds: 5,
            ..Default::default()
        }];
    }
    let mut deployer = deployer(record, vec![], &scheduler);

    let started = Instant::now();
    let err = deployer.execute(&CancellationToken::new()).await.unwrap_err();

    assert_eq!(started.elapsed(), Duration::from_secs(900));
    assert!(
        matches!(&err, AgentError::Timeout(msg) if msg == "application /ns1/web did not converge in time"),
        "{:?}",
        err
    );
}

#[tokio::test(start_paused = true)]
async fn test_unfinished_deployment_times_out_before_the_application_is_polled() {
    let scheduler = Arc::new(FakeScheduler::never_converging());
    scheduler.insert_app(existing_app(3));
    let mut deployer = deployer(create_test_record("web-2", 2, "./serve --v2"), vec![], &scheduler);

    let started = Instant::now();
    let err = deployer.execute(&CancellationToken::new()).await.unwrap_err();

    assert_eq!(started.elapsed(), Duration::from_secs(360));
    assert!(
        matches!(&err, AgentError::Timeout(msg) if msg.starts_with("deployment ")),
        "{:?}",
        err
    );
    assert_eq!(scheduler.mutations(), vec!["update /ns1/web force=false"]);
    let app_reads = scheduler
        .calls()
        .iter()
        .filter(|call| call.starts_with("application "))
        .count();
    assert_eq!(app_reads, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_the_wait() {
    let scheduler = Arc::new(FakeScheduler::never_converging());
    let mut deployer = deployer(create_test_record("web-1", 1, "./serve"), vec![], &scheduler);

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        token.cancel();
    });

    let err = deployer.execute(&cancel).await.unwrap_err();
    assert!(matches!(err, AgentError::Cancelled(_)));
}

#[tokio::test(start_paused = true)]
async fn test_record_for_another_site_is_refused() {
    let scheduler = Arc::new(FakeScheduler::new());
    let mut record = create_test_record("web-1", 1, "./serve");
    record.site = Some("east".to_string());
    let mut deployer = deployer(record, vec![], &scheduler);

    assert!(matches!(
        deployer.execute(&CancellationToken::new()).await,
        Err(AgentError::ConfigError(_))
    ));
    assert!(scheduler.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rollback_target_on_another_site_is_refused() {
    let scheduler = Arc::new(FakeScheduler::new());
    scheduler.insert_deploying_app(existing_app(3), "d2");

    let mut complete = create_test_record("web-1", 1, "./serve --v1");
    complete.status = DeploymentPhase::Complete;
    complete.site = Some("east".to_string());
    let current = annotated(create_test_record("web-2", 2, "./serve --v2"), RECONCILE_ANNOTATION);
    let mut deployer = deployer(current.clone(), vec![complete, current], &scheduler);

    let err = deployer.execute(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(&err, AgentError::ConfigError(msg) if msg.contains("east")), "{:?}", err);
    assert!(scheduler.mutations().is_empty());
    assert_eq!(deployer.state(), RunState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_incomplete_record_is_refused() {
    let scheduler = Arc::new(FakeScheduler::new());
    let mut record = create_test_record("web-1", 1, "./serve");
    record.template = None;
    let mut deployer = deployer(record, vec![], &scheduler);

    assert!(matches!(
        deployer.execute(&CancellationToken::new()).await,
        Err(AgentError::ConfigError(_))
    ));
    assert!(scheduler.calls().is_empty());
}
