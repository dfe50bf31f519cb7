//! API models

mod application;
mod deployment;
mod group;
mod info;
mod task;

pub use application::*;
pub use deployment::*;
pub use group::*;
pub use info::*;
pub use task::*;

/// Task state reported by the scheduler for a running task
pub const TASK_RUNNING: &str = "TASK_RUNNING";
