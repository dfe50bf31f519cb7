//! Deployment module

pub mod convert;
pub mod decision;
pub mod deployer;
pub mod fsm;
pub mod wait;

pub use deployer::{resolve_target, DeployReport, Deployer, DesiredState, Outcome};
