//! Domain module for the factory registry
//!
//! - key: base-type tags, key traits and pluggable equality
//! - entry: registrable entries and their total order
//! - registry: the registry itself

pub mod entry;
pub mod key;
pub mod registry;

pub use entry::{EntryDescriptor, FactoryEntry};
pub use key::{BaseType, FactoryKey, TypeKey};
pub use registry::FactoryRegistry;
