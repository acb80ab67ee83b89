//! # Factory Registry
//!
//! Ordered store of constructor entries behind one lock. Constructors are
//! cloned out and run after the lock is released, so a constructor may use
//! the registry itself.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use shared_types::TypeTag;
use tracing::debug;

use super::entry::{EntryDescriptor, EntryKey, FactoryEntry, StoredConstructor};
use super::key::{BaseType, FactoryKey};
use crate::error::{FactoryError, FactoryResult};

/// Type-indexed constructor registry.
///
/// Owned by the application root; there is no global instance.
#[derive(Default)]
pub struct FactoryRegistry {
    entries: RwLock<BTreeMap<EntryKey, StoredConstructor>>,
}

impl FactoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry. An identical entry is a configuration error.
    pub fn add_factory(&self, entry: FactoryEntry) -> FactoryResult<()> {
        let FactoryEntry { key, constructor } = entry;
        let descriptor = key.descriptor();
        let mut entries = self.entries.write();
        if entries.contains_key(&key) {
            return Err(FactoryError::Duplicate {
                base: descriptor.base.to_string(),
                concrete: descriptor.concrete.to_string(),
                key_type: descriptor.key_type.to_string(),
                key: descriptor.key,
            });
        }
        entries.insert(key, constructor);
        debug!(
            base = %descriptor.base,
            concrete = %descriptor.concrete,
            key = %descriptor.key,
            "Factory registered"
        );
        Ok(())
    }

    fn find<B, K>(&self, key: &K) -> Option<(TypeTag, StoredConstructor)>
    where
        B: BaseType + ?Sized,
        K: FactoryKey,
    {
        let base = B::TAG;
        self.entries
            .read()
            .iter()
            .skip_while(|(k, _)| k.base < base)
            .take_while(|(k, _)| k.base == base)
            .find(|(k, _)| k.matches::<B, K>(key))
            .map(|(k, constructor)| (k.concrete.clone(), constructor.clone()))
    }

    /// Create a new `B` for `key`, or `None` when nothing matches.
    pub fn create<B, K>(&self, key: &K) -> Option<Box<B>>
    where
        B: BaseType + ?Sized,
        K: FactoryKey,
    {
        self.create_tagged::<B, K>(key).map(|(_, instance)| instance)
    }

    /// Like [`create`](Self::create), also reporting the concrete type tag.
    pub fn create_tagged<B, K>(&self, key: &K) -> Option<(TypeTag, Box<B>)>
    where
        B: BaseType + ?Sized,
        K: FactoryKey,
    {
        let (concrete, stored) = self.find::<B, K>(key)?;
        let constructor = stored.get::<B>()?;
        Some((concrete, constructor()))
    }

    /// True when `create::<B, K>(key)` would produce an instance.
    #[must_use]
    pub fn contains<B, K>(&self, key: &K) -> bool
    where
        B: BaseType + ?Sized,
        K: FactoryKey,
    {
        self.find::<B, K>(key).is_some()
    }

    /// Entries serving base type `B`, in entry order.
    #[must_use]
    pub fn descriptors_for<B: BaseType + ?Sized>(&self) -> Vec<EntryDescriptor> {
        let base = B::TAG;
        self.entries
            .read()
            .keys()
            .filter(|k| k.base == base)
            .map(EntryKey::descriptor)
            .collect()
    }

    /// All entries, in total order.
    #[must_use]
    pub fn entries(&self) -> Vec<EntryDescriptor> {
        self.entries.read().keys().map(EntryKey::descriptor).collect()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
        debug!("Factory registry cleared");
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::key::TypeKey;

    trait Shape: Send {
        fn name(&self) -> &'static str;
    }

    impl BaseType for dyn Shape {
        const TAG: TypeTag = TypeTag::from_static("test::Shape");
    }

    struct Circle;
    impl Shape for Circle {
        fn name(&self) -> &'static str {
            "Circle"
        }
    }

    struct Square;
    impl Shape for Square {
        fn name(&self) -> &'static str {
            "Square"
        }
    }

    trait Other {}
    impl BaseType for dyn Other {
        const TAG: TypeTag = TypeTag::from_static("test::Other");
    }

    fn circle_entry() -> FactoryEntry {
        FactoryEntry::new::<dyn Shape, _, _>("test::Circle", "circle".to_string(), || {
            Box::new(Circle) as Box<dyn Shape>
        })
    }

    #[test]
    fn test_create_registered() {
        let registry = FactoryRegistry::new();
        registry.add_factory(circle_entry()).unwrap();

        let shape = registry.create::<dyn Shape, _>(&"circle".to_string()).unwrap();
        assert_eq!(shape.name(), "Circle");
    }

    #[test]
    fn test_create_unregistered_is_none() {
        let registry = FactoryRegistry::new();
        registry.add_factory(circle_entry()).unwrap();

        assert!(registry.create::<dyn Shape, _>(&"square".to_string()).is_none());
        assert!(registry.create::<dyn Shape, _>(&7u32).is_none());
        assert!(registry.create::<dyn Other, _>(&"circle".to_string()).is_none());
    }

    #[test]
    fn test_duplicate_is_error() {
        let registry = FactoryRegistry::new();
        registry.add_factory(circle_entry()).unwrap();
        let err = registry.add_factory(circle_entry()).unwrap_err();
        assert!(matches!(err, FactoryError::Duplicate { ref key, .. } if key.contains("circle")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_same_key_different_concrete_is_allowed() {
        let registry = FactoryRegistry::new();
        registry.add_factory(circle_entry()).unwrap();
        registry
            .add_factory(FactoryEntry::new::<dyn Shape, _, _>(
                "test::Square",
                "square".to_string(),
                || Box::new(Square) as Box<dyn Shape>,
            ))
            .unwrap();
        registry
            .add_factory(FactoryEntry::new::<dyn Shape, _, _>("test::Square", 4u32, || {
                Box::new(Square) as Box<dyn Shape>
            }))
            .unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.create::<dyn Shape, _>(&4u32).unwrap().name(), "Square");
        let (tag, _) = registry
            .create_tagged::<dyn Shape, _>(&"square".to_string())
            .unwrap();
        assert_eq!(tag.as_str(), "test::Square");
    }

    #[test]
    fn test_entries_are_totally_ordered() {
        let registry = FactoryRegistry::new();
        for key in ["b", "a", "c"] {
            registry
                .add_factory(FactoryEntry::new::<dyn Shape, _, _>(
                    "test::Circle",
                    key.to_string(),
                    || Box::new(Circle) as Box<dyn Shape>,
                ))
                .unwrap();
        }
        let keys: Vec<_> = registry.entries().into_iter().map(|d| d.key).collect();
        assert_eq!(keys, vec!["\"a\"", "\"b\"", "\"c\""]);
    }

    #[test]
    fn test_type_key_lookup() {
        let registry = FactoryRegistry::new();
        registry
            .add_factory(FactoryEntry::new::<dyn Shape, _, _>(
                "test::Circle",
                TypeKey::new("geo::Round"),
                || Box::new(Circle) as Box<dyn Shape>,
            ))
            .unwrap();
        let key = TypeKey::new(String::from("geo::Round"));
        assert!(registry.contains::<dyn Shape, _>(&key));
        assert_eq!(registry.descriptors_for::<dyn Shape>().len(), 1);
    }

    #[test]
    fn test_clear() {
        let registry = FactoryRegistry::new();
        registry.add_factory(circle_entry()).unwrap();
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.create::<dyn Shape, _>(&"circle".to_string()).is_none());
    }
}
