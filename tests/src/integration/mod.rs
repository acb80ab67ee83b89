//! Integration scenarios.

pub mod config_replay;
pub mod connections;
pub mod factories;
pub mod lifecycle;
pub mod locking;
pub mod support;
