//! Static factory registrations collected at link time.
//!
//! Crates declare their factories next to the types they construct:
//!
//! ```rust,ignore
//! inventory::submit! {
//!     FactoryRegistration::new("conduit::Integer", register_integer)
//! }
//! ```
//!
//! and the application root applies all of them to its own registry with
//! [`register_static_factories`].

use tracing::debug;

use crate::domain::FactoryRegistry;
use crate::error::FactoryResult;

/// One statically declared registration function.
pub struct FactoryRegistration {
    pub name: &'static str,
    pub register: fn(&FactoryRegistry) -> FactoryResult<()>,
}

impl FactoryRegistration {
    #[must_use]
    pub const fn new(name: &'static str, register: fn(&FactoryRegistry) -> FactoryResult<()>) -> Self {
        Self { name, register }
    }
}

inventory::collect!(FactoryRegistration);

/// Apply every collected registration to `registry`, in name order.
///
/// Stops at the first failure; a duplicate here is a build-level
/// configuration error.
pub fn register_static_factories(registry: &FactoryRegistry) -> FactoryResult<usize> {
    let mut registrations: Vec<&FactoryRegistration> =
        inventory::iter::<FactoryRegistration>.into_iter().collect();
    registrations.sort_by_key(|r| r.name);
    for registration in &registrations {
        (registration.register)(registry)?;
        debug!(name = registration.name, "Static factory registration applied");
    }
    Ok(registrations.len())
}
