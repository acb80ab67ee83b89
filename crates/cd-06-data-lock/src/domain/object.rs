//! # Data Objects
//!
//! Lockable, identity-bearing values shared between components.
//!
//! ```text
//!   ObjectRef (Arc<dyn DataObject>) ──downcast──→ Arc<Data<T>>
//!        │                                           │
//!     WeakObject                          lock_shared / lock_exclusive
//!                                                    │
//!                                      SharedToken<T> / ExclusiveToken<T>
//! ```

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use cd_01_factory_registry::{BaseType, FactoryEntry, FactoryRegistry, TypeKey};
use cd_05_connections::{Message, Signals};
use parking_lot::RwLock;
use serde_json::Value;
use shared_types::{ComponentId, ObjectId, TypeTag};

use super::buffer::BufferPin;
use super::token::{ExclusiveToken, LockMode, SharedToken};
use crate::error::{BufferError, LockError, LockResult};

/// Signal every data object emits after a change.
pub const MODIFIED_SIGNAL: &str = "modified";

/// A value type that can live inside a [`Data`] object.
pub trait DataValue: Send + Sync + 'static {
    /// Stable type tag of the value.
    const TYPE: TypeTag;

    /// Pin backing storage for the lifetime of a lock token.
    fn pin(&self) -> Result<Option<BufferPin>, BufferError> {
        Ok(None)
    }

    /// Generic JSON view, used by type-agnostic components.
    fn to_json(&self) -> Value {
        Value::Null
    }

    /// Replace the value from a JSON view.
    fn assign_json(&mut self, _value: &Value) -> Result<(), String> {
        Err(format!("{} cannot be assigned from JSON", Self::TYPE))
    }
}

/// Type-erased view of a data object.
pub trait DataObject: Send + Sync + 'static {
    fn id(&self) -> &ObjectId;

    fn type_tag(&self) -> TypeTag;

    fn signals(&self) -> &Signals;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    /// JSON snapshot taken under a shared lock.
    fn snapshot(&self) -> LockResult<Value>;

    /// Replace the value under an exclusive lock and emit `modified`.
    fn assign(&self, value: &Value, origin: Option<ComponentId>) -> LockResult<()>;
}

/// Shared handle to a data object.
pub type ObjectRef = Arc<dyn DataObject>;

impl fmt::Debug for dyn DataObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataObject")
            .field("id", self.id())
            .field("type", &self.type_tag())
            .finish()
    }
}

/// A typed data object.
pub struct Data<T: DataValue> {
    id: ObjectId,
    signals: Signals,
    value: Arc<RwLock<T>>,
}

impl<T: DataValue> Data<T> {
    #[must_use]
    pub fn new(id: impl Into<ObjectId>, value: T) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            signals: Signals::with_names(&[MODIFIED_SIGNAL]),
            value: Arc::new(RwLock::new(value)),
        })
    }

    /// Type-erased handle to the same object.
    #[must_use]
    pub fn as_object(self: &Arc<Self>) -> ObjectRef {
        self.clone()
    }

    #[must_use]
    pub fn downgrade(self: &Arc<Self>) -> WeakData<T> {
        WeakData {
            inner: Arc::downgrade(self),
            id: self.id.clone(),
        }
    }

    /// Block until shared access is available.
    pub fn lock_shared(&self) -> LockResult<SharedToken<T>> {
        let guard = self.value.read_arc();
        let pin = DataValue::pin(&*guard)?;
        Ok(SharedToken::new(guard, pin, self.id.clone()))
    }

    /// Block until exclusive access is available.
    pub fn lock_exclusive(&self) -> LockResult<ExclusiveToken<T>> {
        let guard = self.value.write_arc();
        let pin = DataValue::pin(&*guard)?;
        Ok(ExclusiveToken::new(guard, pin, self.id.clone()))
    }

    /// Shared access, giving up after `timeout`.
    pub fn try_lock_shared_for(&self, timeout: Duration) -> LockResult<SharedToken<T>> {
        let guard = self
            .value
            .try_read_arc_for(timeout)
            .ok_or_else(|| LockError::Timeout {
                object: self.id.clone(),
                mode: LockMode::Shared,
            })?;
        let pin = DataValue::pin(&*guard)?;
        Ok(SharedToken::new(guard, pin, self.id.clone()))
    }

    /// Exclusive access, giving up after `timeout`.
    pub fn try_lock_exclusive_for(&self, timeout: Duration) -> LockResult<ExclusiveToken<T>> {
        let guard = self
            .value
            .try_write_arc_for(timeout)
            .ok_or_else(|| LockError::Timeout {
                object: self.id.clone(),
                mode: LockMode::Exclusive,
            })?;
        let pin = DataValue::pin(&*guard)?;
        Ok(ExclusiveToken::new(guard, pin, self.id.clone()))
    }

    /// Emit `modified` on behalf of `origin`; the origin's own slots skip it.
    pub fn notify_modified(&self, origin: Option<ComponentId>) -> usize {
        let message = match origin {
            Some(origin) => Message::from_component(origin, Value::Null).without_echo(),
            None => Message::empty(),
        };
        self.signals.emit(MODIFIED_SIGNAL, message)
    }
}

impl<T: DataValue> DataObject for Data<T> {
    fn id(&self) -> &ObjectId {
        &self.id
    }

    fn type_tag(&self) -> TypeTag {
        T::TYPE
    }

    fn signals(&self) -> &Signals {
        &self.signals
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn snapshot(&self) -> LockResult<Value> {
        Ok(self.lock_shared()?.to_json())
    }

    fn assign(&self, value: &Value, origin: Option<ComponentId>) -> LockResult<()> {
        {
            let mut token = self.lock_exclusive()?;
            token
                .assign_json(value)
                .map_err(|_| LockError::Unsupported {
                    object: self.id.clone(),
                    type_tag: T::TYPE.to_string(),
                    operation: "assign",
                })?;
        }
        self.notify_modified(origin);
        Ok(())
    }
}

/// Typed view of an erased object; a different value type is a
/// [`LockError::TypeMismatch`].
pub fn downcast<T: DataValue>(object: &ObjectRef) -> LockResult<Arc<Data<T>>> {
    let id = object.id().clone();
    let actual = object.type_tag();
    object
        .clone()
        .into_any()
        .downcast::<Data<T>>()
        .map_err(|_| LockError::TypeMismatch {
            object: id,
            expected: T::TYPE.to_string(),
            actual: actual.to_string(),
        })
}

// =============================================================================
// WEAK REFERENCES
// =============================================================================

/// Non-owning typed reference.
pub struct WeakData<T: DataValue> {
    inner: Weak<Data<T>>,
    id: ObjectId,
}

impl<T: DataValue> Clone for WeakData<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            id: self.id.clone(),
        }
    }
}

impl<T: DataValue> WeakData<T> {
    #[must_use]
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    #[must_use]
    pub fn upgrade(&self) -> Option<Arc<Data<T>>> {
        self.inner.upgrade()
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.inner.strong_count() == 0
    }

    /// Shared token, or `Ok(None)` when the object is gone.
    ///
    /// The token keeps the value alive even if the last owner drops.
    pub fn lock_shared(&self) -> LockResult<Option<SharedToken<T>>> {
        self.upgrade().map(|data| data.lock_shared()).transpose()
    }

    /// Exclusive token, or `Ok(None)` when the object is gone.
    pub fn lock_exclusive(&self) -> LockResult<Option<ExclusiveToken<T>>> {
        self.upgrade().map(|data| data.lock_exclusive()).transpose()
    }
}

/// Non-owning erased reference.
#[derive(Clone)]
pub struct WeakObject {
    inner: Weak<dyn DataObject>,
    id: ObjectId,
}

impl WeakObject {
    #[must_use]
    pub fn new(object: &ObjectRef) -> Self {
        Self {
            inner: Arc::downgrade(object),
            id: object.id().clone(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    #[must_use]
    pub fn upgrade(&self) -> Option<ObjectRef> {
        self.inner.upgrade()
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.inner.strong_count() == 0
    }
}

impl fmt::Debug for WeakObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObject")
            .field("id", &self.id)
            .field("expired", &self.is_expired())
            .finish()
    }
}

// =============================================================================
// DATA-TYPE FACTORY SUPPORT
// =============================================================================

/// A freshly constructed value waiting for its identity.
pub trait ObjectValue: Send {
    fn type_tag(&self) -> TypeTag;

    fn into_object(self: Box<Self>, id: ObjectId) -> ObjectRef;
}

impl<T: DataValue> ObjectValue for T {
    fn type_tag(&self) -> TypeTag {
        T::TYPE
    }

    fn into_object(self: Box<Self>, id: ObjectId) -> ObjectRef {
        Data::new(id, *self)
    }
}

impl BaseType for dyn ObjectValue {
    const TAG: TypeTag = TypeTag::from_static("conduit::ObjectValue");
}

/// Factory entry constructing default `T` values keyed by `T::TYPE`.
#[must_use]
pub fn data_type_entry<T: DataValue + Default>() -> FactoryEntry {
    FactoryEntry::new::<dyn ObjectValue, _, _>(T::TYPE, TypeKey(T::TYPE), || {
        Box::new(T::default()) as Box<dyn ObjectValue>
    })
}

/// Create an object of type `type_tag` from a data-type factory.
pub fn create_object(factory: &FactoryRegistry, type_tag: &TypeTag, id: ObjectId) -> Option<ObjectRef> {
    factory
        .create::<dyn ObjectValue, _>(&TypeKey(type_tag.clone()))
        .map(|value| value.into_object(id))
}

/// True when a data-type factory can build `type_tag`.
#[must_use]
pub fn has_data_type(factory: &FactoryRegistry, type_tag: &TypeTag) -> bool {
    factory.contains::<dyn ObjectValue, _>(&TypeKey(type_tag.clone()))
}
