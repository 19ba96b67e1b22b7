// ABOUTME: Library root for relevo - exposes public modules for testing.
// ABOUTME: The main binary is in main.rs.

pub mod cluster;
pub mod commands;
pub mod config;
pub mod deploy;
pub mod error;
pub mod health;
pub mod store;
pub mod types;
