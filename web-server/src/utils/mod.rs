// web-server/src/utils/mod.rs
pub mod client;
pub mod sanitize;
