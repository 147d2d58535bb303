//! # Casebridge Connectors Library
//!
//! Core functionality for the external-system connector subsystem of the
//! case-management dashboard: OAuth flows with PKCE, encrypted credential
//! storage, token lifecycle, remote schema/record retrieval, the mapping
//! engine and the audited sync orchestrator.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod locks;
pub mod mapping;
pub mod models;
pub mod oauth;
pub mod providers;
pub mod remote;
pub mod repositories;
pub mod server;
pub mod sync;
pub mod telemetry;
pub mod tokens;
pub mod vault;
pub use migration;
