//! The component contract driven by the lifecycle manager.

use cd_01_factory_registry::BaseType;
use cd_05_connections::{AutoConnections, Message};
use serde_json::Value;
use shared_types::{Key, TypeTag};

use crate::domain::ComponentContext;
use crate::error::ComponentResult;

/// Interface tag every component implementation is registered under.
pub const COMPONENT_INTERFACE: TypeTag = TypeTag::from_static("conduit::Component");

/// A unit of behaviour driven through configure/start/stop/update/swap.
///
/// Every method runs on the component's worker, one at a time. Errors and
/// panics are caught at the component boundary and reported through the
/// transition result.
pub trait Component: Send + 'static {
    /// Read the component's own configuration block. Runs exactly once,
    /// before the first start.
    fn configure(&mut self, _config: &Value) -> ComponentResult {
        Ok(())
    }

    fn start(&mut self, ctx: &ComponentContext) -> ComponentResult;

    fn stop(&mut self, ctx: &ComponentContext) -> ComponentResult;

    fn update(&mut self, ctx: &ComponentContext) -> ComponentResult;

    /// The object behind `key` changed while started.
    fn swap(&mut self, ctx: &ComponentContext, _key: &Key) -> ComponentResult {
        self.stop(ctx)?;
        self.start(ctx)
    }

    /// A message arrived on one of the slots declared by [`Component::slots`].
    fn receive(&mut self, _ctx: &ComponentContext, _slot: &str, _message: &Message) -> ComponentResult {
        Ok(())
    }

    /// Slots beyond the standard ones.
    fn slots(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Signals beyond the standard ones.
    fn signals(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Key → (object signal, component slot) routes applied to auto-connected
    /// bindings. Empty when the component has no auto-connections.
    fn auto_connections(&self) -> AutoConnections {
        AutoConnections::new()
    }
}

impl BaseType for dyn Component {
    const TAG: TypeTag = COMPONENT_INTERFACE;
}
