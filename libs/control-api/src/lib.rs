//! Control plane models consumed by the site agent and the deployer.

pub mod models;
pub mod validation;

pub use models::*;
