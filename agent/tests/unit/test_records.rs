//! File record store tests

use std::collections::BTreeMap;

use control_api::{
    DeploymentPhase, DeploymentRecord, ObjectMeta, Site, SiteAddress, SitePhase, SiteSpec,
    SiteStatus, SiteType,
};
use siteagent::errors::AgentError;
use siteagent::filesys::dir::Dir;
use siteagent::storage::layout::StorageLayout;
use siteagent::storage::records::{FileRecordStore, RecordStore};

async fn create_store() -> (Dir, FileRecordStore) {
    let dir = Dir::create_temp_dir("siteagent-records").await.unwrap();
    let layout = StorageLayout::new(dir.path());
    layout.setup().await.unwrap();
    (dir, FileRecordStore::new(layout))
}

fn site(name: &str, url: &str) -> Site {
    Site {
        metadata: ObjectMeta {
            name: name.to_string(),
            ..Default::default()
        },
        spec: SiteSpec {
            site_type: SiteType::Marathon,
            address: SiteAddress {
                url: url.to_string(),
            },
        },
        status: SiteStatus::default(),
    }
}

fn record(name: &str, config_name: &str, version: i64) -> DeploymentRecord {
    DeploymentRecord {
        name: name.to_string(),
        namespace: "ns1".to_string(),
        config_name: config_name.to_string(),
        version,
        latest_version: version,
        site: Some("west".to_string()),
        desired_replicas: Some(1),
        template: None,
        status: DeploymentPhase::Complete,
        annotations: BTreeMap::new(),
    }
}

#[tokio::test]
async fn test_put_site_creates_pending_site() {
    let (dir, store) = create_store().await;

    let mut new_site = site("west", "http://marathon.west:8080");
    new_site.status.phase = SitePhase::Running;
    let stored = store.put_site(new_site).await.unwrap();
    assert_eq!(stored.status.phase, SitePhase::Pending);
    assert!(stored.metadata.creation_timestamp.is_some());

    assert!(store.layout().site_file("west").unwrap().exists().await);
    let loaded = store.site("west").await.unwrap();
    assert_eq!(loaded, stored);

    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_put_site_rejects_invalid_sites() {
    let (dir, store) = create_store().await;

    let err = store
        .put_site(site("west", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::ValidationError(_)), "{:?}", err);

    let err = store
        .put_site(site("West_1", "http://marathon:8080"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, AgentError::ValidationError(_) | AgentError::ConfigError(_)),
        "{:?}",
        err
    );

    assert!(store.site("west").await.unwrap_err().is_not_found());
    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_site_update_keeps_status_and_resets_phase() {
    let (dir, store) = create_store().await;

    store
        .put_site(site("west", "http://marathon.west:8080"))
        .await
        .unwrap();

    let mut status = site("west", "ignored");
    status.status = SiteStatus {
        phase: SitePhase::Running,
        site_agent_address: "http://agent.west:8080".to_string(),
    };
    let stored = store.put_site_status(status).await.unwrap();
    assert_eq!(stored.spec.address.url, "http://marathon.west:8080");
    assert_eq!(stored.status.phase, SitePhase::Running);

    let updated = store
        .put_site(site("west", "http://marathon2.west:8080"))
        .await
        .unwrap();
    assert_eq!(updated.spec.address.url, "http://marathon2.west:8080");
    assert_eq!(updated.status.phase, SitePhase::Pending);
    assert_eq!(updated.status.site_agent_address, "http://agent.west:8080");

    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_status_update_of_unknown_site() {
    let (dir, store) = create_store().await;

    let err = store.put_site_status(site("east", "x")).await.unwrap_err();
    assert!(err.is_not_found());

    dir.delete().await.unwrap();
}

#[tokio::test]
async fn test_deployment_records() {
    let (dir, store) = create_store().await;

    store.put_deployment(&record("web-1", "web", 1)).await.unwrap();
    store.put_deployment(&record("web-2", "web", 2)).await.unwrap();
    store.put_deployment(&record("api-1", "api", 1)).await.unwrap();

    let loaded = store.deployment("ns1", "web-2").await.unwrap();
    assert_eq!(loaded, record("web-2", "web", 2));

    let mut names: Vec<String> = store
        .deployments_for_config("ns1", "web")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["web-1", "web-2"]);

    assert!(store
        .deployments_for_config("ns2", "web")
        .await
        .unwrap_or_default()
        .is_empty());

    let err = store.deployment("ns1", "web-3").await.unwrap_err();
    assert!(err.is_not_found());

    dir.delete().await.unwrap();
}
