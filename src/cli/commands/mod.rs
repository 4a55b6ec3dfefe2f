//! CLI command implementations

pub mod cache;
pub mod config;
pub mod info;
pub mod list;
pub mod transfer;
