use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Annotation carrying a human friendly site name
pub const DISPLAY_NAME_ANNOTATION: &str = "siteagent.io/display-name";
/// Legacy spelling of [`DISPLAY_NAME_ANNOTATION`]
pub const DISPLAY_NAME_OLD_ANNOTATION: &str = "displayName";
/// Annotation carrying a free form site description
pub const DESCRIPTION_ANNOTATION: &str = "siteagent.io/description";

/// Object metadata shared by control plane records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

/// Kind of scheduler a site fronts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteType {
    #[default]
    Local,
    Marathon,
    K8s,
    Openshift,
}

impl fmt::Display for SiteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SiteType::Local => "local",
            SiteType::Marathon => "marathon",
            SiteType::K8s => "k8s",
            SiteType::Openshift => "openshift",
        };
        write!(f, "{}", s)
    }
}

/// Lifecycle phase of a site. Transitions are driven by the control plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SitePhase {
    #[default]
    Pending,
    Running,
    Offline,
    Terminated,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteAddress {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteSpec {
    #[serde(rename = "type")]
    pub site_type: SiteType,
    pub address: SiteAddress,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteStatus {
    pub phase: SitePhase,
    /// Base URL of the site agent fronting the site's scheduler
    #[serde(skip_serializing_if = "String::is_empty")]
    pub site_agent_address: String,
}

/// A remote scheduler registered with the control plane
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Site {
    pub metadata: ObjectMeta,
    pub spec: SiteSpec,
    pub status: SiteStatus,
}

impl Site {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Returns `"<display> (<name>)"` when a display name annotation differs
    /// from the site name, the plain name otherwise.
    pub fn display_name(&self) -> String {
        let annotations = &self.metadata.annotations;
        let display = annotations
            .get(DISPLAY_NAME_ANNOTATION)
            .filter(|v| !v.is_empty())
            .or_else(|| annotations.get(DISPLAY_NAME_OLD_ANNOTATION))
            .map(String::as_str)
            .unwrap_or_default();
        if !display.is_empty() && display != self.metadata.name {
            format!("{} ({})", display, self.metadata.name)
        } else {
            self.metadata.name.clone()
        }
    }
}
