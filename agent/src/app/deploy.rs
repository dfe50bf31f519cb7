//! Deployer run entry point

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::app::options::DeployerOptions;
use crate::deploy::{DeployReport, Deployer};
use crate::errors::AgentError;
use crate::site::{SiteApi, SiteProxyClient};
use crate::storage::records::{FileRecordStore, RecordStore};

/// Load a deployment record and drive it onto its site through that site's
/// agent.
pub async fn run_deployment(
    options: DeployerOptions,
    cancel: CancellationToken,
) -> Result<DeployReport, AgentError> {
    options.validate()?;
    let store = FileRecordStore::new(options.layout.clone());
    run_with_store(&store, &options, cancel).await
}

pub async fn run_with_store(
    store: &dyn RecordStore,
    options: &DeployerOptions,
    cancel: CancellationToken,
) -> Result<DeployReport, AgentError> {
    let record = store
        .deployment(&options.namespace, &options.deployment)
        .await?;
    info!(
        "Loaded deployment {} (version {} of {}, latest {})",
        record.label(),
        record.version,
        record.config_name,
        record.latest_version
    );

    let site_name = record
        .site
        .clone()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| {
            AgentError::ConfigError(format!("deployment {} has no site", record.label()))
        })?;
    let site = store.site(&site_name).await?;
    let client: Arc<dyn SiteApi> =
        Arc::new(SiteProxyClient::for_site(&site, options.client_timeout)?);

    let siblings = store
        .deployments_for_config(&record.namespace, &record.config_name)
        .await?;

    let mut deployer = Deployer::new(record, siblings, client, options.wait.clone());
    deployer.execute(&cancel).await
}
