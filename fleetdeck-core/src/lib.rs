//! Core library for Fleetdeck.
//!
//! This crate provides the domain models and database operations for
//! Fleetdeck, independent of any transport layer.
//!
//! # Usage
//!
//! ```no_run
//! use fleetdeck_core::db::Database;
//! use fleetdeck_core::models::*;
//!
//! let db = Database::open_default()?;
//! db.migrate()?;
//!
//! let agents = db.list_agents()?;
//! # Ok::<(), fleetdeck_core::db::StorageError>(())
//! ```

pub mod db;
pub mod ids;
pub mod models;

// Re-export commonly used types at crate root
pub use db::Database;
