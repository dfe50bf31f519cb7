//! Site agent library
//!
//! A tenant-checking gateway in front of a Marathon-compatible scheduler and
//! the deployer that drives deployment records through it.

pub mod app;
pub mod cli;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod scheduler;
pub mod server;
pub mod site;
pub mod storage;
pub mod utils;
