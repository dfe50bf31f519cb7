//! Control plane record store

use async_trait::async_trait;
use control_api::validation::{
    prepare_for_create, prepare_for_status_update, prepare_for_update, validate_site,
    validate_site_update, FieldError,
};
use control_api::{DeploymentRecord, Site};
use tracing::{debug, warn};

use crate::errors::AgentError;
use crate::storage::layout::StorageLayout;

/// Read access to the control plane records a deployer run consumes, plus
/// the writes used to seed them.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn site(&self, name: &str) -> Result<Site, AgentError>;

    async fn deployment(&self, namespace: &str, name: &str)
        -> Result<DeploymentRecord, AgentError>;

    /// All records of one deployment config, in no particular order
    async fn deployments_for_config(
        &self,
        namespace: &str,
        config_name: &str,
    ) -> Result<Vec<DeploymentRecord>, AgentError>;

    /// Creates or updates a site spec. Validation failures are rejected and
    /// the status phase is reset to pending.
    async fn put_site(&self, site: Site) -> Result<Site, AgentError>;

    /// Replaces the status of a stored site, keeping its spec.
    async fn put_site_status(&self, site: Site) -> Result<Site, AgentError>;

    async fn put_deployment(&self, record: &DeploymentRecord) -> Result<(), AgentError>;
}

/// [`RecordStore`] over JSON files laid out by [`StorageLayout`]
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    layout: StorageLayout,
}

impl FileRecordStore {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    async fn stored_site(&self, name: &str) -> Result<Option<Site>, AgentError> {
        match self.layout.site_file(name)?.read_json::<Site>().await {
            Ok(site) => Ok(Some(site)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn validation_error(errors: Vec<FieldError>) -> Result<(), AgentError> {
    if errors.is_empty() {
        return Ok(());
    }
    let message = errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    Err(AgentError::ValidationError(message))
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn site(&self, name: &str) -> Result<Site, AgentError> {
        self.stored_site(name)
            .await?
            .ok_or_else(|| AgentError::NotFound(format!("site {}", name)))
    }

    async fn deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<DeploymentRecord, AgentError> {
        let file = self.layout.deployment_file(namespace, name)?;
        match file.read_json::<DeploymentRecord>().await {
            Err(e) if e.is_not_found() => Err(AgentError::NotFound(format!(
                "deployment {}/{}",
                namespace, name
            ))),
            other => other,
        }
    }

    async fn deployments_for_config(
        &self,
        namespace: &str,
        config_name: &str,
    ) -> Result<Vec<DeploymentRecord>, AgentError> {
        let mut records = Vec::new();
        for file in self.layout.deployments_dir(namespace)?.list_files("json").await? {
            match file.read_json::<DeploymentRecord>().await {
                Ok(record) if record.config_name == config_name => records.push(record),
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable record {}: {}", file.path().display(), e),
            }
        }
        debug!(
            "Found {} records of config {}/{}",
            records.len(),
            namespace,
            config_name
        );
        Ok(records)
    }

    async fn put_site(&self, mut site: Site) -> Result<Site, AgentError> {
        match self.stored_site(site.name()).await? {
            Some(old) => {
                validation_error(validate_site_update(&site, &old))?;
                prepare_for_update(&mut site, &old);
            }
            None => {
                validation_error(validate_site(&site))?;
                prepare_for_create(&mut site);
            }
        }
        self.layout.site_file(site.name())?.write_json(&site).await?;
        Ok(site)
    }

    async fn put_site_status(&self, mut site: Site) -> Result<Site, AgentError> {
        let old = self.site(site.name()).await?;
        prepare_for_status_update(&mut site, &old);
        self.layout.site_file(site.name())?.write_json(&site).await?;
        Ok(site)
    }

    async fn put_deployment(&self, record: &DeploymentRecord) -> Result<(), AgentError> {
        self.layout
            .deployment_file(&record.namespace, &record.name)?
            .write_json(record)
            .await
    }
}
