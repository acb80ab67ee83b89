//! # Conduit Runtime Library
//!
//! The application root of a Conduit process. The `conduit` binary is a thin
//! shell around [`AppContext`].
//!
//! ## Modules
//!
//! - `container/` - runtime configuration and the context owning every registry
//! - `builtins/` - built-in data types and components
//! - `adapters/` - module loader backed by linked-in registration functions
//!
//! ## Startup Sequence
//!
//! 1. Read [`RuntimeConfig`] from the environment and validate it
//! 2. Apply static data-type and component registrations
//! 3. Merge built-in and on-disk module manifests
//! 4. Launch the configured application
//! 5. Run until Ctrl-C, then tear everything down in reverse order

pub mod adapters;
pub mod builtins;
pub mod container;
pub mod error;

pub use adapters::StaticModuleLoader;
pub use container::{AppContext, ConfigError, RuntimeConfig};
pub use error::{RuntimeError, RuntimeResult};
