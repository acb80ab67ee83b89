//! # Lifecycle Manager
//!
//! Drives every managed component from the state of the object-service
//! registry.
//!
//! ## Reactive Rule
//!
//! | Requirements before → after | Component | Action |
//! |-----------------------------|-----------|--------|
//! | unmet → met | stopped, auto-start, manager started | `start()` (then `update()` if auto-update) |
//! | met → unmet | started | `stop()` before the key is unbound |
//! | met → met, object identity changed | started | `swap(key)` |
//!
//! ## Cascades
//!
//! Objects a component publishes as outputs are collected by a registry
//! listener and folded back in as `add_object` / `remove_object` during an
//! explicit re-evaluation pass:
//!
//! ```text
//! operation ──→ transitions ──→ outputs queued
//!                                    │
//!             ┌──────── round ───────┘
//!             ↓
//!   apply queued outputs ──→ transitions ──→ more outputs?  (≤ components + 1 rounds)
//! ```
//!
//! Outputs published outside a manager operation (from a slot, say) are
//! applied by a pass scheduled on the manager's own driver worker.
//!
//! Manager operations block on component workers; they must not be called
//! from inside a component.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;

use cd_02_service_factory::ServiceFactory;
use cd_03_object_registry::{
    BindingEvent, BindingEventKind, ListenerId, ObjectServiceRegistry, RegistryListener,
};
use cd_05_connections::{ChannelRegistry, ConnectionError, Worker, WorkerRegistry};
use cd_06_data_lock::ObjectRef;
use parking_lot::Mutex;
use shared_bus::EventPublisher;
use shared_types::{Access, ComponentId, Endpoint, GlobalStatus, Key, ObjectId};
use tracing::{debug, error, info, warn};

use crate::domain::{ComponentConfig, ObjectSpec, ServiceHandle, Transition};
use crate::error::{LifecycleError, LifecycleResult, TransitionResult};
use crate::ports::{Component, COMPONENT_INTERFACE};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// The owned registries a manager works against.
#[derive(Clone)]
pub struct LifecycleDeps {
    pub osr: Arc<ObjectServiceRegistry>,
    pub services: Arc<ServiceFactory<dyn Component>>,
    pub workers: Arc<WorkerRegistry>,
    pub channels: Arc<ChannelRegistry>,
    pub publisher: Option<Arc<dyn EventPublisher>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerSettings {
    /// How long the manager waits for one transition.
    pub wait_timeout: Duration,
    /// Round bound of one re-evaluation pass; `components + 1` when unset.
    pub max_cascade_rounds: Option<usize>,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_millis(5000),
            max_cascade_rounds: None,
        }
    }
}

/// Automatic transitions applied to one component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutoFlags {
    /// Start as soon as the manager is started and requirements are met.
    pub start: bool,
    /// Update after every start.
    pub update: bool,
}

impl AutoFlags {
    pub const MANUAL: Self = Self {
        start: false,
        update: false,
    };

    #[must_use]
    pub fn start() -> Self {
        Self {
            start: true,
            update: false,
        }
    }

    #[must_use]
    pub fn start_and_update() -> Self {
        Self {
            start: true,
            update: true,
        }
    }
}

/// What an application input names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Uid of an object supplied by the parent configuration.
    Object,
    /// Name of a channel shared with the parent configuration.
    Channel,
}

#[derive(Debug, Clone)]
struct RequiredInput {
    kind: InputKind,
    value: Option<String>,
    optional: bool,
}

// =============================================================================
// STATE
// =============================================================================

struct Managed {
    handle: Arc<ServiceHandle>,
    flags: AutoFlags,
}

#[derive(Default)]
struct ManagerState {
    objects: BTreeMap<ObjectId, ObjectRef>,
    /// Declaration order.
    components: Vec<Managed>,
    /// Successful starts, oldest first; stops run in reverse.
    start_order: Vec<ComponentId>,
    /// Object uid → (channel, signal) routes attached while the object exists.
    proxies: BTreeMap<ObjectId, Vec<(String, String)>>,
    inputs: BTreeMap<String, RequiredInput>,
    /// Bindings whose object was removed while the component refused to
    /// stop. Released by its next successful stop.
    held: BTreeMap<ComponentId, Vec<(Key, Access)>>,
    started: bool,
}

impl ManagerState {
    fn position(&self, id: &ComponentId) -> Option<usize> {
        self.components.iter().position(|m| m.handle.id() == id)
    }

    fn handle(&self, id: &ComponentId) -> Option<Arc<ServiceHandle>> {
        self.position(id).map(|i| self.components[i].handle.clone())
    }
}

fn same_object(a: &ObjectRef, b: &ObjectRef) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}

struct ManagerInner {
    deps: LifecycleDeps,
    settings: ManagerSettings,
    state: Mutex<ManagerState>,
    /// Output bindings waiting for the next round.
    pending: Mutex<VecDeque<BindingEvent>>,
    driver: Worker,
    listener: Mutex<Option<ListenerId>>,
    this: Weak<ManagerInner>,
}

// =============================================================================
// LIFECYCLE MANAGER
// =============================================================================

/// Owns a set of components and keeps them in step with their bindings.
#[derive(Clone)]
pub struct LifecycleManager {
    inner: Arc<ManagerInner>,
}

impl LifecycleManager {
    pub fn new(deps: LifecycleDeps, settings: ManagerSettings) -> LifecycleResult<Self> {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let driver = Worker::spawn(format!("lifecycle-{}", &suffix[..8]))?;

        let inner = Arc::new_cyclic(|this| ManagerInner {
            deps,
            settings,
            state: Mutex::new(ManagerState::default()),
            pending: Mutex::new(VecDeque::new()),
            driver,
            listener: Mutex::new(None),
            this: this.clone(),
        });

        let weak = Arc::downgrade(&inner);
        let listener: Arc<dyn RegistryListener> = Arc::new(move |event: &BindingEvent| {
            if event.access != Access::Output {
                return;
            }
            if let Some(inner) = weak.upgrade() {
                inner.on_output(event.clone());
            }
        });
        *inner.listener.lock() = Some(inner.deps.osr.add_listener(listener));

        Ok(Self { inner })
    }

    #[must_use]
    pub fn settings(&self) -> &ManagerSettings {
        &self.inner.settings
    }

    #[must_use]
    pub fn deps(&self) -> &LifecycleDeps {
        &self.inner.deps
    }

    // =========================================================================
    // OBJECTS
    // =========================================================================

    /// Register `object` under `id` and bind it wherever a component declares
    /// that uid. Re-adding the same object is ignored with a warning; a
    /// different object replaces the previous one.
    pub fn add_object(&self, id: impl Into<ObjectId>, object: ObjectRef) -> LifecycleResult<()> {
        let id = id.into();
        self.inner.with_state(|inner, state| {
            inner.insert_object(state, id, object);
            Ok(())
        })
    }

    /// Unregister the object under `id`, stopping components that can no
    /// longer run without it.
    ///
    /// A component that fails to stop keeps running on its current binding;
    /// the stop error is returned.
    pub fn remove_object(&self, id: &ObjectId) -> LifecycleResult<Option<ObjectRef>> {
        self.inner
            .with_state(|inner, state| inner.erase_object(state, id))
    }

    #[must_use]
    pub fn object(&self, id: &ObjectId) -> Option<ObjectRef> {
        self.inner.state.lock().objects.get(id).cloned()
    }

    #[must_use]
    pub fn objects(&self) -> Vec<ObjectId> {
        self.inner.state.lock().objects.keys().cloned().collect()
    }

    // =========================================================================
    // COMPONENTS
    // =========================================================================

    /// Create a component through the service factory and manage it.
    pub fn add_component(&self, config: ComponentConfig, flags: AutoFlags) -> LifecycleResult<Arc<ServiceHandle>> {
        let component = self
            .inner
            .deps
            .services
            .create(&COMPONENT_INTERFACE, &config.impl_id)?
            .ok_or_else(|| LifecycleError::UnknownImplementation(config.impl_id.clone()))?;
        self.add_instance(config, component, flags)
    }

    /// Manage an already constructed component. It is configured right away;
    /// a configuration failure is returned and nothing is registered.
    pub fn add_instance(
        &self,
        mut config: ComponentConfig,
        component: Box<dyn Component>,
        flags: AutoFlags,
    ) -> LifecycleResult<Arc<ServiceHandle>> {
        if config.uid.is_empty() {
            config.uid = ComponentId::generate(&config.impl_id);
        }
        if self.component(&config.uid).is_some() {
            return Err(LifecycleError::DuplicateComponent(config.uid));
        }

        let deps = &self.inner.deps;
        let worker = deps.workers.resolve(config.worker.as_deref())?;
        let handle = ServiceHandle::new(
            config,
            component,
            deps.osr.clone(),
            worker,
            deps.publisher.clone(),
        );
        self.inner.wait(&handle.configure())?;

        self.inner.with_state(|inner, state| {
            if state.position(handle.id()).is_some() {
                return Err(LifecycleError::DuplicateComponent(handle.id().clone()));
            }
            state.components.push(Managed {
                handle: handle.clone(),
                flags,
            });
            let index = state.components.len() - 1;
            inner.bind_existing(state, index);
            inner.try_auto_start(state, index);
            debug!(component = %handle.id(), impl_id = %handle.impl_id(), "Component added");
            Ok(handle.clone())
        })
    }

    /// Stop (if needed), unregister and forget one component.
    pub fn remove_component(&self, id: &ComponentId) -> LifecycleResult<Arc<ServiceHandle>> {
        self.inner.with_state(|inner, state| {
            let handle = state
                .handle(id)
                .ok_or_else(|| LifecycleError::UnknownComponent(id.clone()))?;
            if handle.is_started() {
                inner.stop_managed(state, &handle)?;
            }
            inner.deps.osr.unregister_component(id);
            state.held.remove(id);
            inner.settle(state)?;
            if let Some(index) = state.position(id) {
                state.components.remove(index);
            }
            debug!(component = %id, "Component removed");
            Ok(handle)
        })
    }

    #[must_use]
    pub fn component(&self, id: &ComponentId) -> Option<Arc<ServiceHandle>> {
        self.inner.state.lock().handle(id)
    }

    /// Managed component ids in declaration order.
    #[must_use]
    pub fn components(&self) -> Vec<ComponentId> {
        self.inner
            .state
            .lock()
            .components
            .iter()
            .map(|m| m.handle.id().clone())
            .collect()
    }

    #[must_use]
    pub fn status(&self, id: &ComponentId) -> Option<GlobalStatus> {
        self.component(id).map(|handle| handle.status())
    }

    /// True between `start_components` and the next stop of everything.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.inner.state.lock().started
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    /// Start every auto-start component whose requirements are met, then
    /// update the auto-update ones. Later bindings start the rest.
    pub fn start_components(&self) -> LifecycleResult<()> {
        self.inner.with_state(|inner, state| {
            state.started = true;
            let mut to_update = Vec::new();
            for index in 0..state.components.len() {
                let (handle, flags) = {
                    let managed = &state.components[index];
                    (managed.handle.clone(), managed.flags)
                };
                if !flags.start || !handle.is_stopped() || !handle.has_all_required() {
                    continue;
                }
                if inner.wait(&handle.start()).is_ok() {
                    state.start_order.push(handle.id().clone());
                    if flags.update {
                        to_update.push(handle);
                    }
                }
            }
            for handle in to_update {
                if let Err(e) = inner.wait(&handle.update()) {
                    warn!(component = %handle.id(), error = %e, "Update after start failed");
                }
            }
            info!(components = state.components.len(), "Components started");
            Ok(())
        })
    }

    /// Start one component now. Its requirements must be met.
    pub fn start_component(&self, id: &ComponentId) -> LifecycleResult<()> {
        self.inner.with_state(|inner, state| {
            let index = state
                .position(id)
                .ok_or_else(|| LifecycleError::UnknownComponent(id.clone()))?;
            if !state.components[index].handle.has_all_required() {
                return Err(LifecycleError::MissingRequirements(id.clone()));
            }
            inner.start_managed(state, index)?;
            Ok(())
        })
    }

    pub fn stop_component(&self, id: &ComponentId) -> LifecycleResult<()> {
        self.inner.with_state(|inner, state| {
            let handle = state
                .handle(id)
                .ok_or_else(|| LifecycleError::UnknownComponent(id.clone()))?;
            inner.stop_managed(state, &handle)?;
            Ok(())
        })
    }

    pub fn update_component(&self, id: &ComponentId) -> LifecycleResult<()> {
        self.inner.with_state(|inner, state| {
            let handle = state
                .handle(id)
                .ok_or_else(|| LifecycleError::UnknownComponent(id.clone()))?;
            inner.wait(&handle.update())?;
            Ok(())
        })
    }

    pub fn swap_component(&self, id: &ComponentId, key: &Key) -> LifecycleResult<()> {
        self.inner.with_state(|inner, state| {
            let handle = state
                .handle(id)
                .ok_or_else(|| LifecycleError::UnknownComponent(id.clone()))?;
            inner.wait(&handle.swap(key))?;
            Ok(())
        })
    }

    /// Stop started components in reverse start order. Failures are logged
    /// and do not stop the sweep.
    pub fn stop_components(&self) -> LifecycleResult<()> {
        self.inner.with_state(|inner, state| {
            inner.stop_all(state);
            Ok(())
        })
    }

    /// Stop everything, drop every binding and forget every component.
    pub fn stop_and_unregister_all(&self) -> LifecycleResult<()> {
        self.inner.with_state(|inner, state| {
            inner.unregister_all(state)?;
            state.components.clear();
            Ok(())
        })
    }

    /// Tear the whole graph down: stop components in reverse start order,
    /// release bindings, objects and proxies. Fails when a component is still
    /// referenced outside the manager afterwards.
    pub fn destroy(&self) -> LifecycleResult<()> {
        let handles = self.inner.with_state(|inner, state| {
            inner.unregister_all(state)?;
            let ids: Vec<ObjectId> = state.objects.keys().cloned().collect();
            for id in ids {
                if let Err(e) = inner.erase_object(state, &id) {
                    warn!(object = %id, error = %e, "Object removal failed during destroy");
                }
            }
            state.proxies.clear();
            Ok(state
                .components
                .drain(..)
                .map(|m| m.handle)
                .collect::<Vec<_>>())
        })?;

        let referenced: Vec<ComponentId> = handles
            .iter()
            .filter(|handle| Arc::strong_count(handle) > 1)
            .map(|handle| handle.id().clone())
            .collect();
        if !referenced.is_empty() {
            error!(components = ?referenced, "Components still referenced after destroy");
            return Err(LifecycleError::StillReferenced(referenced));
        }
        info!(components = handles.len(), "Lifecycle manager destroyed");
        Ok(())
    }

    // =========================================================================
    // CHANNEL PROXIES
    // =========================================================================

    /// Attach signal `endpoint.member` of object `endpoint.component` to
    /// `channel` whenever that object is registered.
    pub fn add_proxy(&self, channel: &str, endpoint: &Endpoint) -> LifecycleResult<()> {
        let uid = ObjectId::new(endpoint.component.as_str());
        let mut state = self.inner.state.lock();
        state
            .proxies
            .entry(uid.clone())
            .or_default()
            .push((channel.to_string(), endpoint.member.clone()));
        if let Some(object) = state.objects.get(&uid).cloned() {
            drop(state);
            self.inner.connect_proxy(channel, &uid, &endpoint.member, &object)?;
        }
        Ok(())
    }

    pub fn remove_proxy(&self, channel: &str, endpoint: &Endpoint) {
        let uid = ObjectId::new(endpoint.component.as_str());
        let mut state = self.inner.state.lock();
        if let Some(routes) = state.proxies.get_mut(&uid) {
            routes.retain(|(c, s)| !(c == channel && *s == endpoint.member));
        }
        if state.objects.contains_key(&uid) {
            let _ = self.inner.deps.channels.disconnect_signal(channel, endpoint);
        }
    }

    // =========================================================================
    // APPLICATION INPUTS
    // =========================================================================

    /// Declare an input the parent configuration must supply. A default
    /// makes it optional.
    pub fn require_input(&self, name: &str, kind: InputKind, default: Option<String>) {
        self.inner.state.lock().inputs.insert(
            name.to_string(),
            RequiredInput {
                kind,
                optional: default.is_some(),
                value: default,
            },
        );
    }

    pub fn replace_input(&self, name: &str, value: impl Into<String>) -> LifecycleResult<()> {
        let mut state = self.inner.state.lock();
        let input = state
            .inputs
            .get_mut(name)
            .ok_or_else(|| LifecycleError::UnknownInput(name.to_string()))?;
        input.value = Some(value.into());
        Ok(())
    }

    #[must_use]
    pub fn input(&self, name: &str) -> Option<String> {
        self.inner
            .state
            .lock()
            .inputs
            .get(name)
            .and_then(|input| input.value.clone())
    }

    /// Values of every input that has one.
    #[must_use]
    pub fn input_values(&self) -> Vec<String> {
        self.inner
            .state
            .lock()
            .inputs
            .values()
            .filter_map(|input| input.value.clone())
            .collect()
    }

    /// Every mandatory input has a value, and object inputs name an object
    /// that exists.
    pub fn check_inputs(&self) -> LifecycleResult<()> {
        let state = self.inner.state.lock();
        let missing: Vec<String> = state
            .inputs
            .iter()
            .filter(|(_, input)| !input.optional)
            .filter(|(_, input)| match (&input.value, input.kind) {
                (None, _) => true,
                (Some(value), InputKind::Object) => {
                    let id = ObjectId::new(value.as_str());
                    !state.objects.contains_key(&id) && self.inner.deps.osr.object(&id).is_none()
                }
                (Some(value), InputKind::Channel) => value.is_empty(),
            })
            .map(|(name, _)| name.clone())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::MissingInputs(missing))
        }
    }
}

// =============================================================================
// PASSES
// =============================================================================

impl ManagerInner {
    /// Run `body` under the state lock, then settle queued outputs.
    fn with_state<R, F>(&self, body: F) -> LifecycleResult<R>
    where
        F: FnOnce(&Self, &mut ManagerState) -> LifecycleResult<R>,
    {
        let mut state = self.state.lock();
        let result = body(self, &mut state);
        let settled = self.settle(&mut state);
        drop(state);
        if !self.pending.lock().is_empty() {
            self.kick();
        }
        let value = result?;
        settled?;
        Ok(value)
    }

    fn on_output(&self, event: BindingEvent) {
        self.pending.lock().push_back(event);
        let this = self.this.clone();
        self.driver.defer(move || {
            if let Some(inner) = this.upgrade() {
                inner.kick();
            }
        });
    }

    /// Settle queued outputs unless another thread is already doing so.
    fn kick(&self) {
        loop {
            let Some(mut state) = self.state.try_lock() else {
                return;
            };
            if let Err(e) = self.settle(&mut state) {
                error!(error = %e, "Background re-evaluation pass aborted");
            }
            drop(state);
            if self.pending.lock().is_empty() {
                return;
            }
        }
    }

    /// Apply queued outputs round by round until none are left.
    fn settle(&self, state: &mut ManagerState) -> LifecycleResult<()> {
        let limit = self
            .settings
            .max_cascade_rounds
            .unwrap_or(state.components.len() + 1);
        let mut rounds = 0;
        loop {
            let batch: Vec<BindingEvent> = self.pending.lock().drain(..).collect();
            if batch.is_empty() {
                return Ok(());
            }
            rounds += 1;
            if rounds > limit {
                let dropped = {
                    let mut pending = self.pending.lock();
                    let count = pending.len();
                    pending.clear();
                    count
                } + batch.len();
                error!(rounds = limit, dropped, "Cascade did not settle, pass aborted");
                return Err(LifecycleError::CascadeLimit { rounds: limit });
            }
            debug!(round = rounds, events = batch.len(), "Re-evaluation round");
            for event in coalesce(batch) {
                self.apply_output(state, event);
            }
        }
    }

    fn apply_output(&self, state: &mut ManagerState, event: BindingEvent) {
        let Some(index) = state.position(&event.component) else {
            return;
        };
        let uid = state.components[index]
            .handle
            .config()
            .output_uid(&event.key)
            .unwrap_or_else(|| event.object.id().clone());
        match event.kind {
            BindingEventKind::Bound => {
                debug!(component = %event.component, object = %uid, "Output published");
                self.insert_object(state, uid, event.object);
            }
            BindingEventKind::Unbound => {
                let current = state
                    .objects
                    .get(&uid)
                    .is_some_and(|object| same_object(object, &event.object));
                if current {
                    debug!(component = %event.component, object = %uid, "Output withdrawn");
                    if let Err(e) = self.erase_object(state, &uid) {
                        warn!(object = %uid, error = %e, "Withdrawn output is still in use");
                    }
                }
            }
        }
    }

    fn insert_object(&self, state: &mut ManagerState, id: ObjectId, object: ObjectRef) {
        if let Some(existing) = state.objects.get(&id) {
            if same_object(existing, &object) {
                warn!(object = %id, "Object already registered, ignored");
                return;
            }
            warn!(object = %id, "Another object registered under the same id, replacing it");
            self.disconnect_proxies(state, &id);
        }
        state.objects.insert(id.clone(), object.clone());
        self.connect_proxies(state, &id, &object);

        for index in 0..state.components.len() {
            let handle = state.components[index].handle.clone();
            let specs: Vec<ObjectSpec> = handle.config().consumers_of(&id).cloned().collect();
            if specs.is_empty() {
                continue;
            }
            for spec in &specs {
                let key = spec.binding_key();
                let options = spec.options(handle.config().auto_connect);
                match self
                    .deps
                    .osr
                    .set_object(handle.id(), &key, Some(object.clone()), options)
                {
                    Ok(change) => {
                        if let Some(held) = state.held.get_mut(handle.id()) {
                            held.retain(|(k, _)| k != &key);
                        }
                        if change.is_change() && handle.is_started() {
                            self.swap_managed(&handle, &key);
                        }
                    }
                    Err(e) => {
                        error!(component = %handle.id(), key = %key, error = %e, "Failed to bind object");
                    }
                }
            }
            self.try_auto_start(state, index);
        }
    }

    /// Unbind the object under `id` everywhere. A component that loses a
    /// mandatory key is stopped first; when that stop fails the component
    /// keeps the binding and the first such failure is returned.
    fn erase_object(&self, state: &mut ManagerState, id: &ObjectId) -> LifecycleResult<Option<ObjectRef>> {
        let Some(object) = state.objects.remove(id) else {
            return Ok(None);
        };
        self.disconnect_proxies(state, id);

        let mut failure = None;
        for index in 0..state.components.len() {
            let handle = state.components[index].handle.clone();
            let specs: Vec<ObjectSpec> = handle.config().consumers_of(id).cloned().collect();
            for spec in &specs {
                let key = spec.binding_key();
                let bound = self
                    .deps
                    .osr
                    .get_registered(handle.id(), &key)
                    .is_some_and(|current| same_object(&current, &object));
                if !bound {
                    continue;
                }
                if handle.is_started() && !handle.has_all_required_without(&key) {
                    if let Err(e) = self.stop_managed(state, &handle) {
                        warn!(component = %handle.id(), key = %key, error = %e, "Stop failed, binding kept");
                        state
                            .held
                            .entry(handle.id().clone())
                            .or_default()
                            .push((key, spec.access));
                        failure.get_or_insert(e);
                        continue;
                    }
                }
                if let Err(e) = self.deps.osr.unset_object(handle.id(), &key, spec.access) {
                    error!(component = %handle.id(), key = %key, error = %e, "Failed to unbind object");
                }
                if handle.is_started() {
                    self.swap_managed(&handle, &key);
                }
            }
        }
        debug!(object = %id, "Object removed");
        match failure {
            Some(e) => Err(e.into()),
            None => Ok(Some(object)),
        }
    }

    /// Bind already registered objects to a newly added component.
    fn bind_existing(&self, state: &ManagerState, index: usize) {
        let handle = &state.components[index].handle;
        for spec in handle.config().objects.iter().filter(|s| s.access.is_consumed()) {
            let Some(object) = state.objects.get(&spec.object_id()) else {
                continue;
            };
            if let Err(e) = self.deps.osr.set_object(
                handle.id(),
                &spec.binding_key(),
                Some(object.clone()),
                spec.options(handle.config().auto_connect),
            ) {
                error!(component = %handle.id(), key = %spec.key, error = %e, "Failed to bind object");
            }
        }
    }

    fn try_auto_start(&self, state: &mut ManagerState, index: usize) {
        let managed = &state.components[index];
        if state.started
            && managed.flags.start
            && managed.handle.is_stopped()
            && managed.handle.has_all_required()
        {
            let _ = self.start_managed(state, index);
        }
    }

    fn start_managed(&self, state: &mut ManagerState, index: usize) -> TransitionResult {
        let handle = state.components[index].handle.clone();
        let flags = state.components[index].flags;
        self.wait(&handle.start())?;
        state.start_order.retain(|id| id != handle.id());
        state.start_order.push(handle.id().clone());
        if flags.update {
            if let Err(e) = self.wait(&handle.update()) {
                warn!(component = %handle.id(), error = %e, "Update after start failed");
            }
        }
        Ok(())
    }

    fn stop_managed(&self, state: &mut ManagerState, handle: &ServiceHandle) -> TransitionResult {
        self.wait(&handle.stop())?;
        state.start_order.retain(|id| id != handle.id());
        self.release_held(state, handle.id());
        Ok(())
    }

    fn release_held(&self, state: &mut ManagerState, id: &ComponentId) {
        for (key, access) in state.held.remove(id).unwrap_or_default() {
            if let Err(e) = self.deps.osr.unset_object(id, &key, access) {
                error!(component = %id, key = %key, error = %e, "Failed to unbind object");
            }
        }
    }

    fn swap_managed(&self, handle: &ServiceHandle, key: &Key) {
        if let Err(e) = self.wait(&handle.swap(key)) {
            warn!(component = %handle.id(), key = %key, error = %e, "Swap failed");
        }
    }

    fn stop_all(&self, state: &mut ManagerState) {
        let mut order: Vec<Arc<ServiceHandle>> = state
            .start_order
            .iter()
            .rev()
            .filter_map(|id| state.handle(id))
            .collect();
        for managed in state.components.iter().rev() {
            if !order.iter().any(|h| h.id() == managed.handle.id()) {
                order.push(managed.handle.clone());
            }
        }
        for handle in order {
            if handle.is_started() {
                match self.wait(&handle.stop()) {
                    Ok(()) => self.release_held(state, handle.id()),
                    Err(e) => warn!(component = %handle.id(), error = %e, "Stop failed during shutdown"),
                }
            }
        }
        state.start_order.clear();
        state.started = false;
    }

    fn unregister_all(&self, state: &mut ManagerState) -> LifecycleResult<()> {
        self.stop_all(state);
        for managed in &state.components {
            self.deps.osr.unregister_component(managed.handle.id());
        }
        state.held.clear();
        self.settle(state)
    }

    fn wait(&self, transition: &Transition) -> TransitionResult {
        let result = transition.wait_timeout(self.settings.wait_timeout);
        if let Err(e) = &result {
            debug!(transition = transition.name(), error = %e, "Transition did not succeed");
        }
        result
    }

    // =========================================================================
    // PROXIES
    // =========================================================================

    fn connect_proxy(&self, channel: &str, uid: &ObjectId, signal: &str, object: &ObjectRef) -> LifecycleResult<()> {
        let emitter = object
            .signals()
            .get(signal)
            .ok_or_else(|| ConnectionError::MissingSignal {
                key: uid.to_string(),
                signal: signal.to_string(),
            })?;
        self.deps
            .channels
            .connect_signal(channel, Endpoint::new(uid.as_str(), signal), emitter)?;
        Ok(())
    }

    fn connect_proxies(&self, state: &ManagerState, uid: &ObjectId, object: &ObjectRef) {
        let Some(routes) = state.proxies.get(uid) else {
            return;
        };
        for (channel, signal) in routes {
            if let Err(e) = self.connect_proxy(channel, uid, signal, object) {
                warn!(object = %uid, channel = %channel, error = %e, "Proxy connection failed");
            }
        }
    }

    fn disconnect_proxies(&self, state: &ManagerState, uid: &ObjectId) {
        let Some(routes) = state.proxies.get(uid) else {
            return;
        };
        for (channel, signal) in routes {
            let endpoint = Endpoint::new(uid.as_str(), signal.as_str());
            if let Err(e) = self.deps.channels.disconnect_signal(channel, &endpoint) {
                debug!(object = %uid, channel = %channel, error = %e, "Proxy was not connected");
            }
        }
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        if let Some(id) = self.listener.lock().take() {
            self.deps.osr.remove_listener(id);
        }
    }
}

/// Drop an unbind immediately followed by a bind of the same key: that pair
/// is one replacement.
fn coalesce(batch: Vec<BindingEvent>) -> Vec<BindingEvent> {
    let mut out = Vec::with_capacity(batch.len());
    let mut events = batch.into_iter().peekable();
    while let Some(event) = events.next() {
        if event.kind == BindingEventKind::Unbound {
            if let Some(next) = events.peek() {
                if next.kind == BindingEventKind::Bound
                    && next.component == event.component
                    && next.key == event.key
                {
                    continue;
                }
            }
        }
        out.push(event);
    }
    out
}
