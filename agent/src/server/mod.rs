//! Tenant-isolating gateway in front of the scheduler

pub mod handlers;
pub mod routes;
pub mod serve;
pub mod state;
pub mod tenant;
