//! Data types and components shipped with the runtime.

pub mod components;
pub mod data_types;

pub use components::{
    builtin_manifests, register_diagnostics, Copier, Counter, Doubler, Logger, COPIER, CORE_MODULE,
    COUNTER, DIAGNOSTICS_MODULE, DOUBLER, LOGGER,
};
pub use data_types::{Integer, Map, Text, BUILTIN_DATA_TYPES};
