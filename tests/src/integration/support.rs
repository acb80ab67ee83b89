//! Shared fixtures: a small data type, a recording component and fresh
//! registries.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cd_02_service_factory::ServiceFactory;
use cd_03_object_registry::ObjectServiceRegistry;
use cd_04_lifecycle::{
    Component, ComponentContext, ComponentResult, LifecycleDeps, LifecycleManager, ManagerSettings,
};
use cd_05_connections::{AutoConnections, ChannelRegistry, Message, WorkerRegistry};
use cd_06_data_lock::{Data, DataValue, ObjectRef, MODIFIED_SIGNAL};
use serde_json::Value;
use shared_types::{Key, TypeTag};

/// A plain integer value.
#[derive(Debug, Default)]
pub struct Num(pub i64);

impl DataValue for Num {
    const TYPE: TypeTag = TypeTag::from_static("it::Num");

    fn to_json(&self) -> Value {
        Value::from(self.0)
    }

    fn assign_json(&mut self, value: &Value) -> Result<(), String> {
        self.0 = value.as_i64().ok_or("expected an integer")?;
        Ok(())
    }
}

pub fn num(id: &str, value: i64) -> ObjectRef {
    Data::new(id, Num(value)).as_object()
}

/// Transition and delivery counts of a [`Recorder`].
#[derive(Debug, Default)]
pub struct Calls {
    pub start: AtomicUsize,
    pub stop: AtomicUsize,
    pub update: AtomicUsize,
    pub swap: AtomicUsize,
    pub received: AtomicUsize,
}

impl Calls {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn starts(&self) -> usize {
        self.start.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.update.load(Ordering::SeqCst)
    }

    pub fn swaps(&self) -> usize {
        self.swap.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }
}

/// Records every call; optionally publishes an output while started and
/// routes `modified` of one key to its `changed` slot.
pub struct Recorder {
    calls: Arc<Calls>,
    produces: Option<&'static str>,
    watches: Option<&'static str>,
}

impl Recorder {
    pub const CHANGED_SLOT: &'static str = "changed";

    pub fn new(calls: &Arc<Calls>) -> Box<Self> {
        Box::new(Self {
            calls: calls.clone(),
            produces: None,
            watches: None,
        })
    }

    pub fn producing(calls: &Arc<Calls>, key: &'static str) -> Box<Self> {
        Box::new(Self {
            calls: calls.clone(),
            produces: Some(key),
            watches: None,
        })
    }

    pub fn watching(calls: &Arc<Calls>, key: &'static str) -> Box<Self> {
        Box::new(Self {
            calls: calls.clone(),
            produces: None,
            watches: Some(key),
        })
    }

    fn publish(&self, ctx: &ComponentContext) -> ComponentResult {
        if let Some(key) = self.produces {
            ctx.set_output(key, Some(num(ctx.output_id(key).as_str(), 1)))?;
        }
        Ok(())
    }
}

impl Component for Recorder {
    fn start(&mut self, ctx: &ComponentContext) -> ComponentResult {
        self.calls.start.fetch_add(1, Ordering::SeqCst);
        self.publish(ctx)
    }

    fn stop(&mut self, ctx: &ComponentContext) -> ComponentResult {
        self.calls.stop.fetch_add(1, Ordering::SeqCst);
        if let Some(key) = self.produces {
            ctx.set_output(key, None)?;
        }
        Ok(())
    }

    fn update(&mut self, _ctx: &ComponentContext) -> ComponentResult {
        self.calls.update.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn swap(&mut self, ctx: &ComponentContext, _key: &Key) -> ComponentResult {
        self.calls.swap.fetch_add(1, Ordering::SeqCst);
        self.publish(ctx)
    }

    fn receive(&mut self, _ctx: &ComponentContext, _slot: &str, _message: &Message) -> ComponentResult {
        self.calls.received.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn slots(&self) -> Vec<&'static str> {
        vec![Self::CHANGED_SLOT]
    }

    fn auto_connections(&self) -> AutoConnections {
        match self.watches {
            Some(key) => AutoConnections::new().with(key, MODIFIED_SIGNAL, Self::CHANGED_SLOT),
            None => AutoConnections::new(),
        }
    }
}

/// Fresh registries with no publisher.
pub fn deps() -> LifecycleDeps {
    LifecycleDeps {
        osr: Arc::new(ObjectServiceRegistry::new()),
        services: Arc::new(ServiceFactory::new()),
        workers: Arc::new(WorkerRegistry::new().expect("default worker")),
        channels: Arc::new(ChannelRegistry::new()),
        publisher: None,
    }
}

pub fn manager() -> LifecycleManager {
    LifecycleManager::new(deps(), ManagerSettings::default()).expect("manager")
}

/// Poll `condition` for up to two seconds.
pub fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
