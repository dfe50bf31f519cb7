//! Storage layout of the record store

use std::path::PathBuf;

use crate::errors::AgentError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::utils::is_path_segment;

/// On-disk layout of the control plane records read by the deployer:
///
/// ```text
/// <base>/sites/<site>.json
/// <base>/namespaces/<namespace>/deployments/<record>.json
/// ```
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the sites directory
    pub fn sites_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("sites"))
    }

    /// Get the file of one site record
    pub fn site_file(&self, name: &str) -> Result<File, AgentError> {
        Ok(self.sites_dir().file(&record_file_name("site", name)?))
    }

    /// Get the deployment records directory of a namespace
    pub fn deployments_dir(&self, namespace: &str) -> Result<Dir, AgentError> {
        check_name("namespace", namespace)?;
        Ok(Dir::new(
            self.base_dir
                .join("namespaces")
                .join(namespace)
                .join("deployments"),
        ))
    }

    /// Get the file of one deployment record
    pub fn deployment_file(&self, namespace: &str, name: &str) -> Result<File, AgentError> {
        Ok(self
            .deployments_dir(namespace)?
            .file(&record_file_name("deployment", name)?))
    }

    /// Setup the storage layout (create directories)
    pub async fn setup(&self) -> Result<(), AgentError> {
        self.sites_dir().create().await?;
        Dir::new(self.base_dir.join("namespaces")).create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::new("/var/lib/siteagent")
    }
}

fn check_name(kind: &str, name: &str) -> Result<(), AgentError> {
    if is_path_segment(name) {
        Ok(())
    } else {
        Err(AgentError::ValidationError(format!(
            "invalid {} name: {:?}",
            kind, name
        )))
    }
}

fn record_file_name(kind: &str, name: &str) -> Result<String, AgentError> {
    check_name(kind, name)?;
    Ok(format!("{}.json", name))
}
