//! Bindings between components and data objects.

use std::fmt;

use cd_06_data_lock::ObjectRef;
use shared_types::{Access, ComponentId, Key, ObjectId};

/// One key of a component bound to an object.
#[derive(Clone)]
pub struct Binding {
    pub key: Key,
    pub access: Access,
    pub optional: bool,
    pub auto_connect: bool,
    pub object: ObjectRef,
}

impl Binding {
    #[must_use]
    pub fn object_id(&self) -> &ObjectId {
        self.object.id()
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("key", &self.key)
            .field("access", &self.access)
            .field("optional", &self.optional)
            .field("auto_connect", &self.auto_connect)
            .field("object", self.object.id())
            .finish()
    }
}

/// Flags of a binding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingOptions {
    pub access: Access,
    pub optional: bool,
    pub auto_connect: bool,
}

impl BindingOptions {
    #[must_use]
    pub fn new(access: Access) -> Self {
        Self {
            access,
            optional: false,
            auto_connect: false,
        }
    }

    #[must_use]
    pub fn input() -> Self {
        Self::new(Access::Input)
    }

    #[must_use]
    pub fn inout() -> Self {
        Self::new(Access::InOut)
    }

    #[must_use]
    pub fn output() -> Self {
        Self::new(Access::Output)
    }

    #[must_use]
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    #[must_use]
    pub fn auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }
}

/// The reverse index entry: who references an object, and how.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindingRef {
    pub component: ComponentId,
    pub key: Key,
    pub access: Access,
}

/// Effect of a `set_object` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingChange {
    Added,
    /// A different object was bound before.
    Replaced { previous: ObjectId },
    /// The key was unbound.
    Removed { previous: ObjectId },
    /// Same object, or unbinding a key that was not bound.
    Unchanged,
}

impl BindingChange {
    /// True when the object identity behind the key changed.
    #[must_use]
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingEventKind {
    Bound,
    Unbound,
}

/// Notification delivered to registry listeners.
#[derive(Clone)]
pub struct BindingEvent {
    pub kind: BindingEventKind,
    pub component: ComponentId,
    pub key: Key,
    pub access: Access,
    pub object: ObjectRef,
}

impl fmt::Debug for BindingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingEvent")
            .field("kind", &self.kind)
            .field("component", &self.component)
            .field("key", &self.key)
            .field("access", &self.access)
            .field("object", self.object.id())
            .finish()
    }
}
