//! Fleetdeck: agent fleet tracking dashboard.
//!
//! This crate provides the HTTP transport over the `fleetdeck-core` store,
//! plus the outbound integrations: GitHub repository sync and the remote
//! session gateway.

pub mod api;
pub mod config;
pub mod gateway;
pub mod github;

pub use config::Config;
