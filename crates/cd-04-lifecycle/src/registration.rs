//! Static component registrations collected at link time.
//!
//! ```rust,ignore
//! const DOUBLER_OBJECTS: &[TypeTag] = &[Integer::TYPE];
//!
//! inventory::submit! {
//!     ComponentRegistration::new("conduit::Doubler", DOUBLER_OBJECTS, doubler)
//! }
//! ```

use cd_02_service_factory::{ServiceFactory, ServiceFactoryResult};
use shared_types::TypeTag;
use tracing::debug;

use crate::ports::{Component, COMPONENT_INTERFACE};

/// One statically declared component implementation.
pub struct ComponentRegistration {
    pub impl_id: &'static str,
    /// Data types the implementation consumes; empty accepts any object.
    pub objects: &'static [TypeTag],
    pub constructor: fn() -> Box<dyn Component>,
}

impl ComponentRegistration {
    #[must_use]
    pub const fn new(
        impl_id: &'static str,
        objects: &'static [TypeTag],
        constructor: fn() -> Box<dyn Component>,
    ) -> Self {
        Self {
            impl_id,
            objects,
            constructor,
        }
    }
}

inventory::collect!(ComponentRegistration);

/// Register every collected component with `services`, in id order.
pub fn register_static_components(services: &ServiceFactory<dyn Component>) -> ServiceFactoryResult<usize> {
    let mut registrations: Vec<&ComponentRegistration> =
        inventory::iter::<ComponentRegistration>.into_iter().collect();
    registrations.sort_by_key(|r| r.impl_id);
    for registration in &registrations {
        services.register(
            registration.impl_id,
            COMPONENT_INTERFACE,
            registration.objects,
            registration.constructor,
        )?;
        debug!(impl_id = registration.impl_id, "Static component registration applied");
    }
    Ok(registrations.len())
}
