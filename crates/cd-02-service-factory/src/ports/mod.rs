//! Ports layer for the service factory.
//!
//! - Outbound (Driven) ports: the module loading mechanism

pub mod outbound;

pub use outbound::*;
