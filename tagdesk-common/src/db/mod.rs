//! Database access layer
//!
//! Provides schema initialization and queries for identities, sessions, and
//! scans. Query functions are plain async functions over a `SqlitePool`; the
//! [`crate::persistence`] module packages them behind the abstract
//! collaborator trait.

pub mod init;
pub mod models;
pub mod scans;
pub mod sessions;

pub use init::{init_database, init_memory_database};
pub use models::{DecodedPayload, EndedSession, Identity, PayloadFormat, ScanRecord, Session};
