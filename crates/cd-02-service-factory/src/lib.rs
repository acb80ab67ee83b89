//! # cd-02-service-factory
//!
//! Specializes the factory registry for services: implementation ids mapped
//! to an interface, the data types they consume and the module that owns
//! them.
//!
//! ## Startup Sequence
//!
//! ```text
//! 1. static registrations   add_service_factory / add_object_type
//! 2. module manifests       merge_manifest (by implementation id)
//! 3. unresolved check       warn for descriptors no module declares
//! 4. run time               create() → constructor, or load module and retry once
//! ```
//!
//! ## Architecture
//!
//! - `domain/` - descriptors, manifests and the factory itself
//! - `ports/outbound` - [`ModuleLoader`], the contract of the module loading
//!   mechanism

pub mod domain;
pub mod error;
pub mod ports;

pub use domain::{ManifestService, ModuleManifest, ServiceDescriptor, ServiceFactory};
pub use error::{ServiceFactoryError, ServiceFactoryResult};
pub use ports::ModuleLoader;
