//! Site record validation and the field resets applied on create and update.

use std::fmt;

use chrono::Utc;

use crate::models::{Site, SitePhase};

const DNS1123_SUBDOMAIN_MAX_LENGTH: usize = 253;
const DNS1123_LABEL_MAX_LENGTH: usize = 63;

/// A single validation failure, addressed by a dotted field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Checks that `name` is a DNS-1123 subdomain.
pub fn validate_site_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("name is required".to_string());
    }
    if name.len() > DNS1123_SUBDOMAIN_MAX_LENGTH {
        return Err(format!(
            "must be no more than {} characters",
            DNS1123_SUBDOMAIN_MAX_LENGTH
        ));
    }
    for label in name.split('.') {
        if !is_dns1123_label(label) {
            return Err(format!(
                "{:?} must consist of lower case alphanumeric characters, '-' or '.', and must start and end with an alphanumeric character",
                name
            ));
        }
    }
    Ok(())
}

fn is_dns1123_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    let alnum = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            bytes.len() <= DNS1123_LABEL_MAX_LENGTH
                && alnum(first)
                && alnum(last)
                && bytes.iter().all(|b| alnum(b) || *b == b'-')
        }
        _ => false,
    }
}

/// Validates a site record. Status fields are optional and never validated.
pub fn validate_site(site: &Site) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if let Err(message) = validate_site_name(&site.metadata.name) {
        errors.push(FieldError::new("metadata.name", message));
    }
    if site.spec.address.url.is_empty() {
        errors.push(FieldError::new("spec.address.url", "required"));
    }
    errors
}

/// Validates an update of `old` into `site`. The name is immutable.
pub fn validate_site_update(site: &Site, old: &Site) -> Vec<FieldError> {
    let mut errors = validate_site(site);
    if site.metadata.name != old.metadata.name {
        errors.push(FieldError::new("metadata.name", "field is immutable"));
    }
    errors
}

/// Resets fields a client must not set when creating a site.
pub fn prepare_for_create(site: &mut Site) {
    site.status.phase = SitePhase::Pending;
    if site.metadata.creation_timestamp.is_none() {
        site.metadata.creation_timestamp = Some(Utc::now());
    }
}

/// A spec update keeps the stored status, with the phase reset to pending.
pub fn prepare_for_update(site: &mut Site, old: &Site) {
    site.status = old.status.clone();
    site.status.phase = SitePhase::Pending;
    site.metadata.creation_timestamp = old.metadata.creation_timestamp;
}

/// A status update keeps the stored spec.
pub fn prepare_for_status_update(site: &mut Site, old: &Site) {
    site.spec = old.spec.clone();
}
