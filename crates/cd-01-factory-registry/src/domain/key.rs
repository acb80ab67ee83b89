//! Base-type tags and pluggable key equality.

use std::any::Any;
use std::cmp::Ordering;
use std::fmt::{self, Debug};

use shared_types::TypeTag;

/// A polymorphic base type instances are created as (usually `dyn Trait`).
///
/// ```rust,ignore
/// impl BaseType for dyn Shape {
///     const TAG: TypeTag = TypeTag::from_static("demo::Shape");
/// }
/// ```
pub trait BaseType: 'static {
    const TAG: TypeTag;
}

/// A value usable as a factory key.
///
/// Equality is pluggable: ordinary keys compare by value, type-identity keys
/// compare by type name.
pub trait FactoryKey: Debug + Send + Sync + 'static {
    const KEY_TYPE: TypeTag;

    fn key_eq(&self, other: &Self) -> bool;

    fn key_cmp(&self, other: &Self) -> Ordering;
}

macro_rules! value_key {
    ($($ty:ty => $tag:literal),* $(,)?) => {
        $(
            impl FactoryKey for $ty {
                const KEY_TYPE: TypeTag = TypeTag::from_static($tag);

                fn key_eq(&self, other: &Self) -> bool {
                    self == other
                }

                fn key_cmp(&self, other: &Self) -> Ordering {
                    self.cmp(other)
                }
            }
        )*
    };
}

value_key! {
    String => "string",
    u32 => "u32",
    u64 => "u64",
    i32 => "i32",
    i64 => "i64",
    usize => "usize",
}

/// A key naming a type; two keys are equal when their names are.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeKey(pub TypeTag);

impl TypeKey {
    pub fn new(tag: impl Into<TypeTag>) -> Self {
        Self(tag.into())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FactoryKey for TypeKey {
    const KEY_TYPE: TypeTag = TypeTag::from_static("type");

    fn key_eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }

    fn key_cmp(&self, other: &Self) -> Ordering {
        self.name().cmp(other.name())
    }
}

/// Object-safe view of a [`FactoryKey`].
pub(crate) trait ErasedKey: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn cmp_erased(&self, other: &dyn ErasedKey) -> Ordering;
    fn describe(&self) -> String;
}

impl<K: FactoryKey> ErasedKey for K {
    fn as_any(&self) -> &dyn Any {
        self
    }

    // Only called once the key-type tags compared equal.
    fn cmp_erased(&self, other: &dyn ErasedKey) -> Ordering {
        match other.as_any().downcast_ref::<K>() {
            Some(other) => self.key_cmp(other),
            None => self.describe().cmp(&other.describe()),
        }
    }

    fn describe(&self) -> String {
        format!("{:?}", self)
    }
}
