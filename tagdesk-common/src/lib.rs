//! # Tagdesk Common Library
//!
//! Shared code for the Tagdesk scanning station:
//! - Database models and queries
//! - Event types (StationEvent enum) and EventBus
//! - The abstract Persistence collaborator and its SQLite implementation
//! - Configuration loading

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod persistence;

pub use config::StationConfig;
pub use error::{Error, Result};
pub use events::{EventBus, LogoutReason, RejectReason, StationEvent};
pub use persistence::{Persistence, SqlitePersistence};
