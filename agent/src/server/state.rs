//! Server state

use std::sync::Arc;

use axum::http::HeaderValue;

use crate::scheduler::Scheduler;
use crate::utils::server_header;

/// Server state shared across handlers
pub struct ServerState {
    /// Site identity every request must name
    pub site_name: String,
    pub scheduler: Arc<dyn Scheduler>,
    pub server_header: HeaderValue,
}

impl ServerState {
    pub fn new(site_name: impl Into<String>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            site_name: site_name.into(),
            scheduler,
            server_header: HeaderValue::from_str(&server_header())
                .unwrap_or_else(|_| HeaderValue::from_static("siteagent")),
        }
    }
}
