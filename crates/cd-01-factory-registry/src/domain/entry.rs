//! Factory entries: (base, concrete, key type, key value) → constructor.

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use shared_types::TypeTag;

use super::key::{BaseType, ErasedKey, FactoryKey};

pub(crate) type Constructor<B> = Arc<dyn Fn() -> Box<B> + Send + Sync>;

/// Sort key of an entry.
///
/// Ordered by base, concrete and key-type names; the key values are only
/// compared when all three names are identical.
pub(crate) struct EntryKey {
    pub base: TypeTag,
    pub concrete: TypeTag,
    pub key_type: TypeTag,
    pub key: Box<dyn ErasedKey>,
}

impl Ord for EntryKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.base
            .cmp(&other.base)
            .then_with(|| self.concrete.cmp(&other.concrete))
            .then_with(|| self.key_type.cmp(&other.key_type))
            .then_with(|| self.key.cmp_erased(other.key.as_ref()))
    }
}

impl PartialOrd for EntryKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for EntryKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EntryKey {}

impl EntryKey {
    /// True when the entry serves `B` for a key equal to `key`.
    pub(crate) fn matches<B, K>(&self, key: &K) -> bool
    where
        B: BaseType + ?Sized,
        K: FactoryKey,
    {
        self.base == B::TAG
            && self.key_type == K::KEY_TYPE
            && self
                .key
                .as_any()
                .downcast_ref::<K>()
                .is_some_and(|k| k.key_eq(key))
    }

    pub(crate) fn descriptor(&self) -> EntryDescriptor {
        EntryDescriptor {
            base: self.base.clone(),
            concrete: self.concrete.clone(),
            key_type: self.key_type.clone(),
            key: self.key.describe(),
        }
    }
}

/// Type-erased constructor as stored in the registry.
#[derive(Clone)]
pub(crate) struct StoredConstructor(pub Arc<dyn Any + Send + Sync>);

impl StoredConstructor {
    pub(crate) fn get<B: BaseType + ?Sized>(&self) -> Option<Constructor<B>> {
        self.0.downcast_ref::<Constructor<B>>().cloned()
    }
}

/// A registrable constructor entry.
pub struct FactoryEntry {
    pub(crate) key: EntryKey,
    pub(crate) constructor: StoredConstructor,
}

impl FactoryEntry {
    /// Build an entry creating `B` instances of the concrete type `concrete`
    /// when asked for `key`.
    pub fn new<B, K, F>(concrete: impl Into<TypeTag>, key: K, constructor: F) -> Self
    where
        B: BaseType + ?Sized,
        K: FactoryKey,
        F: Fn() -> Box<B> + Send + Sync + 'static,
    {
        let constructor: Constructor<B> = Arc::new(constructor);
        Self {
            key: EntryKey {
                base: B::TAG,
                concrete: concrete.into(),
                key_type: K::KEY_TYPE,
                key: Box::new(key),
            },
            constructor: StoredConstructor(Arc::new(constructor)),
        }
    }

    #[must_use]
    pub fn descriptor(&self) -> EntryDescriptor {
        self.key.descriptor()
    }
}

impl fmt::Debug for FactoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.descriptor(), f)
    }
}

/// Printable description of an entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntryDescriptor {
    pub base: TypeTag,
    pub concrete: TypeTag,
    pub key_type: TypeTag,
    pub key: String,
}

impl fmt::Display for EntryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <- {} [{}={}]",
            self.base, self.concrete, self.key_type, self.key
        )
    }
}
