//! # Tagdesk Station Core
//!
//! The concurrency-sensitive core of the scanning station: which worker is
//! checked in, which scans count, and what the scanned payload means.
//!
//! - [`session`] — the session-switch coordinator: at most one active session,
//!   switched by identity-tag presentations through an ordered protocol.
//! - [`gate`] — the scan admission gate: duplicate suppression and per-session
//!   rate limiting for inbound scans.
//! - [`decode`] — the payload decoder: raw scanned string to structured fields.
//! - [`station`] — the facade wiring the three to the persistence collaborator
//!   and the event bus.
//!
//! Reader input, camera capture, rendering, and durable storage live outside
//! this crate; they talk to it through [`Station`] and the event bus.

pub mod decode;
pub mod gate;
pub mod session;
pub mod station;

pub use decode::decode;
pub use gate::{Admission, GateLimits, ScanAdmissionGate};
pub use session::{SessionSwitchCoordinator, SwitchTiming};
pub use station::Station;
