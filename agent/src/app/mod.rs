//! Application entry points

pub mod deploy;
pub mod options;
pub mod run;
