//! Wire models of the Marathon-compatible scheduler REST API.
//!
//! Only the subset of the `/v2` surface used by the site agent is modelled.
//! Every optional field is skipped on serialization when unset so that a
//! partially filled [`models::Application`] can be sent as an update.

pub mod models;

pub use models::*;
