//! Domain module for the connection engine
//!
//! ## Core Modules
//! - message: payload plus feedback markers
//! - signal: signals, slots, connections and scoped blockers
//! - auto: key-driven auto-connections
//! - channel: named N:M routes

pub mod auto;
pub mod channel;
pub mod message;
pub mod signal;

pub use auto::{AutoConnections, KeyConnections, ANY_KEY};
pub use channel::ChannelRegistry;
pub use message::{Message, MAX_GENERATION};
pub use signal::{BlockGuard, Connection, ConnectionSet, Signal, Signals, Slot, Slots};
