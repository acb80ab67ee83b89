//! # cd-01-factory-registry
//!
//! Type-indexed store of constructor entries. Creates polymorphic instances
//! by key lookup.
//!
//! ## Entry Model
//!
//! | Field | Example |
//! |-------|---------|
//! | base type tag | `demo::Shape` |
//! | concrete type tag | `demo::Circle` |
//! | key type tag | `string` |
//! | key value | `"circle"` |
//!
//! No two entries share all four fields. Entries are ordered by the three
//! tag names, then by key value.
//!
//! ## Example
//!
//! ```rust,ignore
//! impl BaseType for dyn Shape {
//!     const TAG: TypeTag = TypeTag::from_static("demo::Shape");
//! }
//!
//! let registry = FactoryRegistry::new();
//! registry.add_factory(FactoryEntry::new::<dyn Shape, _, _>(
//!     "demo::Circle",
//!     "circle".to_string(),
//!     || Box::new(Circle) as Box<dyn Shape>,
//! ))?;
//!
//! assert!(registry.create::<dyn Shape, _>(&"circle".to_string()).is_some());
//! assert!(registry.create::<dyn Shape, _>(&"square".to_string()).is_none());
//! ```

pub mod domain;
pub mod error;
pub mod registration;

pub use domain::{BaseType, EntryDescriptor, FactoryEntry, FactoryKey, FactoryRegistry, TypeKey};
pub use error::{FactoryError, FactoryResult};
pub use registration::{register_static_factories, FactoryRegistration};

// Re-exported so registration macros in dependent crates resolve it.
pub use inventory;
