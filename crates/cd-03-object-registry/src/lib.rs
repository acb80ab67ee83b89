//! # cd-03-object-registry
//!
//! The object-service registry (OSR): which data object is bound to which
//! key of which component, and with what access mode.
//!
//! ## Guarantees
//!
//! - Both indexes (component → key and object → bindings) change together
//!   under one registry-wide lock.
//! - Every bind and unbind produces exactly one notification, delivered
//!   after the lock is released, to listeners and to the event bus.
//! - An object bound as an output is visible to every component that
//!   consumes the same identifier.
//!
//! ## Access Modes
//!
//! | Mode | Meaning |
//! |------|---------|
//! | `in` | read-only input |
//! | `inout` | read-write input |
//! | `out` | produced by the component |

pub mod domain;
pub mod error;
pub mod ports;

pub use domain::{
    Binding, BindingChange, BindingEvent, BindingEventKind, BindingOptions, BindingRef,
    ListenerId, ObjectServiceRegistry,
};
pub use error::{RegistryError, RegistryResult};
pub use ports::RegistryListener;
