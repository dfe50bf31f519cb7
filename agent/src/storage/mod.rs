//! Settings and control plane record storage

pub mod layout;
pub mod records;
pub mod settings;
