//! # Object-Service Registry
//!
//! Two mutually consistent indexes behind one lock:
//!
//! ```text
//!   component → key → Binding { access, flags, object }
//!   object id → { (component, key, access) }
//! ```
//!
//! Mutations collect their notifications while holding the lock; listeners
//! and the event bus receive them after the lock is released, in order.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cd_06_data_lock::ObjectRef;
use conduit_telemetry::BINDINGS;
use parking_lot::{Mutex, RwLock};
use shared_bus::{EventPublisher, RuntimeEvent};
use shared_types::{Access, ComponentId, Key, ObjectId, MAX_GROUP_INDEX};
use tracing::debug;

use super::binding::{
    Binding, BindingChange, BindingEvent, BindingEventKind, BindingOptions, BindingRef,
};
use crate::error::{RegistryError, RegistryResult};
use crate::ports::RegistryListener;

/// Handle returned by [`ObjectServiceRegistry::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

fn same_object(a: &ObjectRef, b: &ObjectRef) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a).cast::<()>(),
        Arc::as_ptr(b).cast::<()>(),
    )
}

#[derive(Default)]
struct RegistryState {
    by_component: HashMap<ComponentId, BTreeMap<Key, Binding>>,
    by_object: HashMap<ObjectId, BTreeSet<BindingRef>>,
    total: usize,
}

impl RegistryState {
    fn insert(&mut self, component: &ComponentId, binding: Binding) -> BindingEvent {
        let event = BindingEvent {
            kind: BindingEventKind::Bound,
            component: component.clone(),
            key: binding.key.clone(),
            access: binding.access,
            object: binding.object.clone(),
        };
        self.by_object
            .entry(binding.object_id().clone())
            .or_default()
            .insert(BindingRef {
                component: component.clone(),
                key: binding.key.clone(),
                access: binding.access,
            });
        self.by_component
            .entry(component.clone())
            .or_default()
            .insert(binding.key.clone(), binding);
        self.total += 1;
        BINDINGS.inc();
        event
    }

    fn remove(&mut self, component: &ComponentId, key: &Key) -> Option<BindingEvent> {
        let bindings = self.by_component.get_mut(component)?;
        let binding = bindings.remove(key)?;
        if bindings.is_empty() {
            self.by_component.remove(component);
        }
        self.forget_reverse(component, &binding);
        Some(unbound_event(component, binding))
    }

    fn forget_reverse(&mut self, component: &ComponentId, binding: &Binding) {
        let object_id = binding.object_id();
        if let Some(refs) = self.by_object.get_mut(object_id) {
            refs.remove(&BindingRef {
                component: component.clone(),
                key: binding.key.clone(),
                access: binding.access,
            });
            if refs.is_empty() {
                self.by_object.remove(object_id);
            }
        }
        self.total -= 1;
        BINDINGS.dec();
    }

    fn set(
        &mut self,
        component: &ComponentId,
        key: &Key,
        object: Option<ObjectRef>,
        options: BindingOptions,
    ) -> RegistryResult<(BindingChange, Vec<BindingEvent>)> {
        let existing = self
            .by_component
            .get_mut(component)
            .and_then(|bindings| bindings.get_mut(key));

        if let Some(existing) = &existing {
            if existing.access != options.access {
                return Err(RegistryError::AccessConflict {
                    component: component.clone(),
                    key: key.clone(),
                    existing: existing.access,
                    requested: options.access,
                });
            }
        }

        match (existing, object) {
            (None, None) => Ok((BindingChange::Unchanged, Vec::new())),
            (Some(existing), Some(object)) if same_object(&existing.object, &object) => {
                existing.optional = options.optional;
                existing.auto_connect = options.auto_connect;
                Ok((BindingChange::Unchanged, Vec::new()))
            }
            (Some(existing), None) => {
                let previous = existing.object_id().clone();
                let events = self.remove(component, key).into_iter().collect();
                Ok((BindingChange::Removed { previous }, events))
            }
            (Some(existing), Some(object)) => {
                let previous = existing.object_id().clone();
                let mut events: Vec<_> = self.remove(component, key).into_iter().collect();
                events.push(self.insert(component, new_binding(key, object, options)));
                Ok((BindingChange::Replaced { previous }, events))
            }
            (None, Some(object)) => {
                let event = self.insert(component, new_binding(key, object, options));
                Ok((BindingChange::Added, vec![event]))
            }
        }
    }
}

fn new_binding(key: &Key, object: ObjectRef, options: BindingOptions) -> Binding {
    Binding {
        key: key.clone(),
        access: options.access,
        optional: options.optional,
        auto_connect: options.auto_connect,
        object,
    }
}

fn unbound_event(component: &ComponentId, binding: Binding) -> BindingEvent {
    BindingEvent {
        kind: BindingEventKind::Unbound,
        component: component.clone(),
        key: binding.key,
        access: binding.access,
        object: binding.object,
    }
}

/// Bidirectional index between data objects and component bindings.
///
/// Owned by the application root and shared by reference.
pub struct ObjectServiceRegistry {
    state: Mutex<RegistryState>,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn RegistryListener>)>>,
    next_listener: AtomicU64,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl Default for ObjectServiceRegistry {
    fn default() -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            publisher: None,
        }
    }
}

impl ObjectServiceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also publish `Bound` / `Unbound` events on the given bus.
    #[must_use]
    pub fn with_publisher(publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            publisher: Some(publisher),
            ..Self::default()
        }
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Bind `object` to `key` of `component`, replace the bound object, or
    /// unbind the key when `object` is `None`.
    pub fn set_object(
        &self,
        component: &ComponentId,
        key: &Key,
        object: Option<ObjectRef>,
        options: BindingOptions,
    ) -> RegistryResult<BindingChange> {
        if component.is_empty() {
            return Err(RegistryError::EmptyComponentId);
        }
        if key.index().is_some_and(|index| index > MAX_GROUP_INDEX) {
            return Err(RegistryError::GroupIndexOutOfRange {
                component: component.clone(),
                key: key.clone(),
                max: MAX_GROUP_INDEX,
            });
        }
        let (change, events) = self.state.lock().set(component, key, object, options)?;
        self.dispatch(events);
        Ok(change)
    }

    /// Shorthand for unbinding one key.
    pub fn unset_object(
        &self,
        component: &ComponentId,
        key: &Key,
        access: Access,
    ) -> RegistryResult<BindingChange> {
        self.set_object(component, key, None, BindingOptions::new(access))
    }

    /// Remove every binding of `component`, notifying each removal.
    /// Returns the number of bindings removed.
    pub fn unregister_component(&self, component: &ComponentId) -> usize {
        let events: Vec<BindingEvent> = {
            let mut state = self.state.lock();
            match state.by_component.remove(component) {
                Some(bindings) => bindings
                    .into_values()
                    .map(|binding| {
                        state.forget_reverse(component, &binding);
                        unbound_event(component, binding)
                    })
                    .collect(),
                None => Vec::new(),
            }
        };
        let count = events.len();
        if count > 0 {
            debug!(component = %component, count, "Component unregistered");
        }
        self.dispatch(events);
        count
    }

    // =========================================================================
    // NOTIFICATION
    // =========================================================================

    pub fn add_listener(&self, listener: Arc<dyn RegistryListener>) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    fn dispatch(&self, events: Vec<BindingEvent>) {
        if events.is_empty() {
            return;
        }
        let listeners: Vec<Arc<dyn RegistryListener>> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for event in events {
            debug!(
                component = %event.component,
                key = %event.key,
                object = %event.object.id(),
                access = %event.access,
                kind = ?event.kind,
                "Binding changed"
            );
            if let Some(publisher) = &self.publisher {
                publisher.publish(to_runtime_event(&event));
            }
            for listener in &listeners {
                listener.on_binding_event(&event);
            }
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[must_use]
    pub fn get_binding(&self, component: &ComponentId, key: &Key) -> Option<Binding> {
        self.state
            .lock()
            .by_component
            .get(component)
            .and_then(|bindings| bindings.get(key))
            .cloned()
    }

    /// The object bound to `key`, if any.
    #[must_use]
    pub fn get_registered(&self, component: &ComponentId, key: &Key) -> Option<ObjectRef> {
        self.get_binding(component, key).map(|b| b.object)
    }

    /// True when `key` is bound with the given access mode.
    #[must_use]
    pub fn is_registered(&self, component: &ComponentId, key: &Key, access: Access) -> bool {
        self.get_binding(component, key)
            .is_some_and(|b| b.access == access)
    }

    /// Bindings of a component, in key order.
    #[must_use]
    pub fn bindings(&self, component: &ComponentId) -> Vec<Binding> {
        self.state
            .lock()
            .by_component
            .get(component)
            .map(|bindings| bindings.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Slots of a key group, index-addressed. The group is as long as its
    /// highest bound index plus one; gaps are `None`.
    #[must_use]
    pub fn group(&self, component: &ComponentId, name: &str) -> Vec<Option<ObjectRef>> {
        let state = self.state.lock();
        let Some(bindings) = state.by_component.get(component) else {
            return Vec::new();
        };
        let slots: Vec<(usize, ObjectRef)> = bindings
            .values()
            .filter(|b| b.key.name() == name)
            .filter_map(|b| b.key.index().map(|i| (i, b.object.clone())))
            .collect();
        let len = slots
            .iter()
            .filter_map(|(i, _)| i.checked_add(1))
            .max()
            .unwrap_or(0);
        let mut group = vec![None; len];
        for (index, object) in slots {
            group[index] = Some(object);
        }
        group
    }

    /// Every (component, key, access) referencing an object.
    #[must_use]
    pub fn components_for(&self, object: &ObjectId) -> Vec<BindingRef> {
        self.state
            .lock()
            .by_object
            .get(object)
            .map(|refs| refs.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// An object referenced by any binding.
    #[must_use]
    pub fn object(&self, id: &ObjectId) -> Option<ObjectRef> {
        let state = self.state.lock();
        let binding_ref = state.by_object.get(id)?.iter().next()?;
        state
            .by_component
            .get(&binding_ref.component)?
            .get(&binding_ref.key)
            .map(|b| b.object.clone())
    }

    /// An object currently produced as an output by some component.
    ///
    /// Outputs are how deferred objects become visible to the components
    /// consuming the same identifier.
    #[must_use]
    pub fn output(&self, id: &ObjectId) -> Option<ObjectRef> {
        let state = self.state.lock();
        let binding_ref = state
            .by_object
            .get(id)?
            .iter()
            .find(|r| r.access == Access::Output)?;
        state
            .by_component
            .get(&binding_ref.component)?
            .get(&binding_ref.key)
            .map(|b| b.object.clone())
    }

    #[must_use]
    pub fn contains_component(&self, component: &ComponentId) -> bool {
        self.state.lock().by_component.contains_key(component)
    }

    /// Components with at least one binding.
    #[must_use]
    pub fn components(&self) -> Vec<ComponentId> {
        let mut components: Vec<_> = self.state.lock().by_component.keys().cloned().collect();
        components.sort();
        components
    }

    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.state.lock().total
    }
}

fn to_runtime_event(event: &BindingEvent) -> RuntimeEvent {
    let object = event.object.id().clone();
    let component = event.component.clone();
    let key = event.key.clone();
    let access = event.access;
    match event.kind {
        BindingEventKind::Bound => RuntimeEvent::Bound {
            object,
            component,
            key,
            access,
        },
        BindingEventKind::Unbound => RuntimeEvent::Unbound {
            object,
            component,
            key,
            access,
        },
    }
}
