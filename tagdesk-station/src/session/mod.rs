//! Session ownership and the identity-switch protocol

mod coordinator;

pub use coordinator::{SessionSwitchCoordinator, SwitchTiming};
