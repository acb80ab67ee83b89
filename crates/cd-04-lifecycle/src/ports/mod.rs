//! Ports of the lifecycle subsystem.
//!
//! The manager drives implementations of [`Component`]; everything else it
//! needs (registries, workers, channels) is passed in as owned objects.

pub mod outbound;

pub use outbound::*;
