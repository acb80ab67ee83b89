//! Domain layer for the object-service registry.

pub mod binding;
pub mod registry;

pub use binding::{
    Binding, BindingChange, BindingEvent, BindingEventKind, BindingOptions, BindingRef,
};
pub use registry::{ListenerId, ObjectServiceRegistry};
