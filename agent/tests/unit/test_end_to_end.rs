//! Deployer runs through a live gateway on loopback

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use common::FakeScheduler;
use control_api::{
    AppTemplate, DeploymentPhase, DeploymentRecord, ObjectMeta, Site, SiteAddress, SitePhase,
    SiteSpec, SiteStatus, SiteType, SCALE_ANNOTATION,
};
use siteagent::app::deploy::run_with_store;
use siteagent::app::options::{
    AppOptions, DeployerOptions, LifecycleOptions, SchedulerOptions, ServerOptions,
};
use siteagent::app::run::run;
use siteagent::deploy::wait::WaitSettings;
use siteagent::deploy::Outcome;
use siteagent::errors::AgentError;
use siteagent::filesys::dir::Dir;
use siteagent::server::serve::serve;
use siteagent::server::state::ServerState;
use siteagent::storage::layout::StorageLayout;
use siteagent::storage::records::{FileRecordStore, RecordStore};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

struct Harness {
    dir: Dir,
    store: FileRecordStore,
    options: DeployerOptions,
    scheduler: Arc<FakeScheduler>,
    stop: Option<oneshot::Sender<()>>,
}

impl Harness {
    async fn start(scheduler: FakeScheduler) -> Self {
        let scheduler = Arc::new(scheduler);
        let state = Arc::new(ServerState::new("west", scheduler.clone()));
        let (stop, stopped) = oneshot::channel::<()>();
        let options = ServerOptions {
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        let (addr, _handle) = serve(&options, state, async move {
            let _ = stopped.await;
        })
        .await
        .unwrap();

        let dir = Dir::create_temp_dir("siteagent-e2e").await.unwrap();
        let layout = StorageLayout::new(dir.path());
        layout.setup().await.unwrap();
        let store = FileRecordStore::new(layout.clone());

        let site = store
            .put_site(Site {
                metadata: ObjectMeta {
                    name: "west".to_string(),
                    ..Default::default()
                },
                spec: SiteSpec {
                    site_type: SiteType::Marathon,
                    address: SiteAddress {
                        url: "http://marathon.west:8080".to_string(),
                    },
                },
                status: SiteStatus::default(),
            })
            .await
            .unwrap();
        let mut status = site.clone();
        status.status = SiteStatus {
            phase: SitePhase::Running,
            site_agent_address: format!("http://{}", addr),
        };
        store.put_site_status(status).await.unwrap();

        let options = DeployerOptions {
            layout,
            namespace: "ns1".to_string(),
            deployment: "web-1".to_string(),
            wait: WaitSettings {
                interval: Duration::from_millis(20),
                base_timeout: Duration::from_secs(10),
            },
            client_timeout: Duration::from_secs(5),
        };

        Self {
            dir,
            store,
            options,
            scheduler,
            stop: Some(stop),
        }
    }

    async fn run(&self) -> Result<siteagent::deploy::DeployReport, AgentError> {
        run_with_store(&self.store, &self.options, CancellationToken::new()).await
    }

    async fn finish(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.dir.delete().await.unwrap();
    }
}

fn record(replicas: i32) -> DeploymentRecord {
    DeploymentRecord {
        name: "web-1".to_string(),
        namespace: "ns1".to_string(),
        config_name: "web".to_string(),
        version: 1,
        latest_version: 1,
        site: Some("west".to_string()),
        desired_replicas: Some(replicas),
        template: Some(AppTemplate {
            id: "web".to_string(),
            cmd: Some("python3 -m http.server".to_string()),
            cpus: Some(0.25),
            mem: Some(64.0),
            ..Default::default()
        }),
        status: DeploymentPhase::New,
        annotations: BTreeMap::new(),
    }
}

#[tokio::test]
async fn test_deploy_creates_application_through_gateway() {
    let harness = Harness::start(FakeScheduler::converging_after(2)).await;
    harness.store.put_deployment(&record(3)).await.unwrap();

    let report = harness.run().await.unwrap();
    assert_eq!(report.outcome, Outcome::Created);
    assert_eq!(report.site_id, "west");
    assert_eq!(report.app_id, "/ns1/web");
    assert_eq!(harness.scheduler.mutations(), vec!["create /ns1/web"]);

    let app = harness.scheduler.app("/ns1/web").unwrap();
    assert_eq!(app.instances, Some(3));
    assert_eq!(app.tasks_running, Some(3));

    harness.finish().await;
}

#[tokio::test]
async fn test_scale_through_gateway() {
    let harness = Harness::start(FakeScheduler::converging_after(1)).await;
    harness.store.put_deployment(&record(1)).await.unwrap();
    harness.run().await.unwrap();

    let mut scaled = record(2);
    scaled
        .annotations
        .insert(SCALE_ANNOTATION.to_string(), "1".to_string());
    harness.store.put_deployment(&scaled).await.unwrap();

    let report = harness.run().await.unwrap();
    assert!(matches!(report.outcome, Outcome::Scaled { .. }), "{}", report);
    assert_eq!(
        harness.scheduler.mutations(),
        vec!["create /ns1/web", "scale /ns1/web 2 force=false"]
    );
    assert_eq!(harness.scheduler.app("/ns1/web").unwrap().instances, Some(2));

    harness.finish().await;
}

#[tokio::test]
async fn test_unknown_site_fails_before_any_call() {
    let harness = Harness::start(FakeScheduler::new()).await;
    let mut elsewhere = record(1);
    elsewhere.site = Some("east".to_string());
    harness.store.put_deployment(&elsewhere).await.unwrap();

    let err = harness.run().await.unwrap_err();
    assert!(err.is_not_found(), "{:?}", err);
    assert!(harness.scheduler.calls().is_empty());

    harness.finish().await;
}

#[tokio::test]
async fn test_run_serves_until_shutdown() {
    let options = AppOptions {
        lifecycle: LifecycleOptions::default(),
        site_name: "west".to_string(),
        server: ServerOptions {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        scheduler: SchedulerOptions {
            url: "http://127.0.0.1:9".to_string(),
            username: None,
            password: None,
            timeout: Duration::from_secs(1),
        },
    };
    let (stop, stopped) = oneshot::channel::<()>();
    let (bound, addr) = oneshot::channel();
    let agent = tokio::spawn(run(
        options,
        async move {
            let _ = stopped.await;
        },
        Some(bound),
    ));

    let addr = addr.await.unwrap();
    let response = reqwest::get(format!("http://{}/ping", addr)).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers().get(reqwest::header::CACHE_CONTROL).unwrap(),
        "no-cache"
    );
    assert!(response.text().await.unwrap().is_empty());

    stop.send(()).unwrap();
    agent.await.unwrap().unwrap();
}
