//! Outbound (Driven) ports for the object-service registry.

use crate::domain::BindingEvent;

/// Receives binding notifications.
///
/// Called synchronously after the registry lock is released, in the order
/// the changes were made. A listener may call back into the registry.
pub trait RegistryListener: Send + Sync {
    fn on_binding_event(&self, event: &BindingEvent);
}

impl<F> RegistryListener for F
where
    F: Fn(&BindingEvent) + Send + Sync,
{
    fn on_binding_event(&self, event: &BindingEvent) {
        self(event);
    }
}
