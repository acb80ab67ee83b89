//! Ports layer for the object-service registry.
//!
//! - Outbound (Driven) ports: binding change listeners

pub mod outbound;

pub use outbound::*;
