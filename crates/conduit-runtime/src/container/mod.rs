//! # Application Container
//!
//! Runtime configuration and the context that owns every registry.

pub mod config;
pub mod context;

pub use config::{ConfigError, RuntimeConfig};
pub use context::AppContext;
