//! # Built-in Components
//!
//! | Implementation | Keys | Behaviour |
//! |----------------|------|-----------|
//! | `conduit::Doubler` | `input` (in), `output` (out) | publishes twice the input, recomputed on every input change |
//! | `conduit::Copier` | `source` (in), `target` (inout) | copies the source value into the target on update |
//! | `conduit::Logger` | none | logs whatever arrives on its `log` slot |
//! | `conduit::Counter` | `count` (out) | counts `increment` messages, emits `counted` |
//!
//! Doubler and Copier are linked in statically. Logger and Counter belong to
//! the `conduit.diagnostics` module and are loaded on first use.

use std::sync::Arc;

use cd_02_service_factory::{ModuleManifest, ServiceFactory, ServiceFactoryResult};
use cd_04_lifecycle::{
    Component, ComponentContext, ComponentError, ComponentRegistration, ComponentResult,
    COMPONENT_INTERFACE, UPDATE_SLOT,
};
use cd_05_connections::{AutoConnections, Message};
use cd_06_data_lock::{Data, DataValue, MODIFIED_SIGNAL};
use serde_json::Value;
use shared_types::{Key, TypeTag};
use tracing::info;

use super::data_types::Integer;

pub const DOUBLER: &str = "conduit::Doubler";
pub const COPIER: &str = "conduit::Copier";
pub const LOGGER: &str = "conduit::Logger";
pub const COUNTER: &str = "conduit::Counter";

/// Module owning the diagnostics components.
pub const DIAGNOSTICS_MODULE: &str = "conduit.diagnostics";
/// Module owning the statically linked components.
pub const CORE_MODULE: &str = "conduit.core";

// =============================================================================
// DOUBLER
// =============================================================================

/// `output = 2 * input`.
#[derive(Default)]
pub struct Doubler {
    output: Option<Arc<Data<Integer>>>,
}

impl Doubler {
    pub const INPUT: &'static str = "input";
    pub const OUTPUT: &'static str = "output";

    fn compute(&self, ctx: &ComponentContext) -> ComponentResult {
        let Some(output) = &self.output else {
            return Ok(());
        };
        let value = ctx.input::<Integer>(Self::INPUT)?.lock_shared()?.0;
        output.lock_exclusive()?.0 = value.saturating_mul(2);
        ctx.notify_modified(&output.as_object());
        Ok(())
    }
}

impl Component for Doubler {
    fn start(&mut self, ctx: &ComponentContext) -> ComponentResult {
        let output = Data::new(ctx.output_id(Self::OUTPUT), Integer::default());
        self.output = Some(output.clone());
        self.compute(ctx)?;
        ctx.set_output(Self::OUTPUT, Some(output.as_object()))
    }

    fn stop(&mut self, ctx: &ComponentContext) -> ComponentResult {
        self.output = None;
        ctx.set_output(Self::OUTPUT, None)
    }

    fn update(&mut self, ctx: &ComponentContext) -> ComponentResult {
        self.compute(ctx)
    }

    /// The output object survives an input swap; only its value changes.
    fn swap(&mut self, ctx: &ComponentContext, _key: &Key) -> ComponentResult {
        self.compute(ctx)
    }

    fn auto_connections(&self) -> AutoConnections {
        AutoConnections::new().with(Self::INPUT, MODIFIED_SIGNAL, UPDATE_SLOT)
    }
}

// =============================================================================
// COPIER
// =============================================================================

/// Copies `source` into `target` through their JSON views.
#[derive(Default)]
pub struct Copier;

impl Copier {
    pub const SOURCE: &'static str = "source";
    pub const TARGET: &'static str = "target";
}

impl Component for Copier {
    fn start(&mut self, ctx: &ComponentContext) -> ComponentResult {
        self.update(ctx)
    }

    fn stop(&mut self, _ctx: &ComponentContext) -> ComponentResult {
        Ok(())
    }

    fn update(&mut self, ctx: &ComponentContext) -> ComponentResult {
        let source = ctx
            .object(Self::SOURCE)
            .ok_or_else(|| ComponentError::MissingInput(Key::new(Self::SOURCE)))?;
        let target = ctx
            .object(Self::TARGET)
            .ok_or_else(|| ComponentError::MissingInput(Key::new(Self::TARGET)))?;
        if source.type_tag() != target.type_tag() {
            return Err(ComponentError::failed(format!(
                "cannot copy {} into {}",
                source.type_tag(),
                target.type_tag()
            )));
        }
        let value = source.snapshot()?;
        target.assign(&value, Some(ctx.id().clone()))?;
        Ok(())
    }

    fn swap(&mut self, ctx: &ComponentContext, _key: &Key) -> ComponentResult {
        self.update(ctx)
    }

    fn auto_connections(&self) -> AutoConnections {
        AutoConnections::new().with(Self::SOURCE, MODIFIED_SIGNAL, UPDATE_SLOT)
    }
}

// =============================================================================
// LOGGER
// =============================================================================

/// Logs every message delivered to its `log` slot.
#[derive(Default)]
pub struct Logger {
    prefix: String,
    lines: usize,
}

impl Logger {
    pub const LOG_SLOT: &'static str = "log";
}

impl Component for Logger {
    fn configure(&mut self, config: &Value) -> ComponentResult {
        if let Some(prefix) = config.get("prefix") {
            self.prefix = prefix
                .as_str()
                .ok_or_else(|| ComponentError::failed("'prefix' must be a string"))?
                .to_string();
        }
        Ok(())
    }

    fn start(&mut self, _ctx: &ComponentContext) -> ComponentResult {
        self.lines = 0;
        Ok(())
    }

    fn stop(&mut self, ctx: &ComponentContext) -> ComponentResult {
        info!(component = %ctx.id(), lines = self.lines, "Logger stopped");
        Ok(())
    }

    fn update(&mut self, _ctx: &ComponentContext) -> ComponentResult {
        Ok(())
    }

    fn receive(&mut self, ctx: &ComponentContext, _slot: &str, message: &Message) -> ComponentResult {
        self.lines += 1;
        let origin = message.origin.as_ref().map(ToString::to_string).unwrap_or_default();
        match message.as_str() {
            Some(text) => info!(component = %ctx.id(), origin = %origin, "{}{}", self.prefix, text),
            None => info!(component = %ctx.id(), origin = %origin, "{}{}", self.prefix, message.payload),
        }
        Ok(())
    }

    fn slots(&self) -> Vec<&'static str> {
        vec![Self::LOG_SLOT]
    }
}

// =============================================================================
// COUNTER
// =============================================================================

/// Publishes a running count of `increment` messages.
pub struct Counter {
    step: i64,
    count: Option<Arc<Data<Integer>>>,
}

impl Default for Counter {
    fn default() -> Self {
        Self { step: 1, count: None }
    }
}

impl Counter {
    pub const COUNT: &'static str = "count";
    pub const INCREMENT_SLOT: &'static str = "increment";
    pub const COUNTED_SIGNAL: &'static str = "counted";
}

impl Component for Counter {
    fn configure(&mut self, config: &Value) -> ComponentResult {
        if let Some(step) = config.get("step") {
            self.step = step
                .as_i64()
                .ok_or_else(|| ComponentError::failed("'step' must be an integer"))?;
        }
        Ok(())
    }

    fn start(&mut self, ctx: &ComponentContext) -> ComponentResult {
        let count = Data::new(ctx.output_id(Self::COUNT), Integer::default());
        self.count = Some(count.clone());
        ctx.set_output(Self::COUNT, Some(count.as_object()))
    }

    fn stop(&mut self, ctx: &ComponentContext) -> ComponentResult {
        self.count = None;
        ctx.set_output(Self::COUNT, None)
    }

    fn update(&mut self, _ctx: &ComponentContext) -> ComponentResult {
        Ok(())
    }

    fn receive(&mut self, ctx: &ComponentContext, _slot: &str, _message: &Message) -> ComponentResult {
        let Some(count) = &self.count else {
            return Ok(());
        };
        let value = {
            let mut token = count.lock_exclusive()?;
            token.0 = token.0.saturating_add(self.step);
            token.0
        };
        ctx.notify_modified(&count.as_object());
        ctx.emit(Self::COUNTED_SIGNAL, Value::from(value));
        Ok(())
    }

    fn slots(&self) -> Vec<&'static str> {
        vec![Self::INCREMENT_SLOT]
    }

    fn signals(&self) -> Vec<&'static str> {
        vec![Self::COUNTED_SIGNAL]
    }
}

// =============================================================================
// REGISTRATION
// =============================================================================

fn doubler() -> Box<dyn Component> {
    Box::<Doubler>::default()
}

fn copier() -> Box<dyn Component> {
    Box::new(Copier)
}

const DOUBLER_OBJECTS: &[TypeTag] = &[Integer::TYPE];
const COPIER_OBJECTS: &[TypeTag] = &[];

inventory::submit! {
    ComponentRegistration::new(DOUBLER, DOUBLER_OBJECTS, doubler)
}

inventory::submit! {
    ComponentRegistration::new(COPIER, COPIER_OBJECTS, copier)
}

/// Registration run when the diagnostics module is loaded.
pub fn register_diagnostics(services: &ServiceFactory<dyn Component>) -> ServiceFactoryResult<()> {
    services.add_service_factory(LOGGER, COMPONENT_INTERFACE, || {
        Box::<Logger>::default() as Box<dyn Component>
    })?;
    services.add_service_factory(COUNTER, COMPONENT_INTERFACE, || {
        Box::<Counter>::default() as Box<dyn Component>
    })
}

/// Manifests of the built-in modules.
#[must_use]
pub fn builtin_manifests() -> Vec<ModuleManifest> {
    let mut core = ModuleManifest::new(CORE_MODULE)
        .with_service(DOUBLER, COMPONENT_INTERFACE, &["conduit::Integer"])
        .with_service(COPIER, COMPONENT_INTERFACE, &[]);
    let mut diagnostics = ModuleManifest::new(DIAGNOSTICS_MODULE)
        .with_service(LOGGER, COMPONENT_INTERFACE, &[])
        .with_service(COUNTER, COMPONENT_INTERFACE, &[]);
    for service in core.services.iter_mut().chain(diagnostics.services.iter_mut()) {
        service.tags.push("builtin".to_string());
    }
    vec![core, diagnostics]
}
