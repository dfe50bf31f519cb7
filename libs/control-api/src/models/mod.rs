//! API models

mod deployment;
mod site;
mod template;

pub use deployment::*;
pub use site::*;
pub use template::*;
