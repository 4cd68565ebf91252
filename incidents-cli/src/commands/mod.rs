//! CLI command implementations.

pub mod common;
pub mod config;
pub mod create;
pub mod list;
pub mod show;
pub mod watch;
