// common/src/models/mod.rs
pub mod auth;

pub use auth::*;
