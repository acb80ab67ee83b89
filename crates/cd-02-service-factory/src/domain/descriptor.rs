//! Service descriptors: what an implementation is and where it comes from.

use serde::{Deserialize, Serialize};
use shared_types::{ModuleId, TypeTag};

/// Everything known about one implementation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Interface the implementation is created as.
    pub interface: TypeTag,
    pub impl_id: String,
    /// Consumed data types, in declaration order. Duplicates are kept.
    pub objects: Vec<TypeTag>,
    /// When true the module manifest fixed `objects`; registrations may
    /// only name types already listed.
    pub objects_from_module: bool,
    pub module: Option<ModuleId>,
    pub description: String,
    pub tags: Vec<String>,
    /// An in-memory constructor is registered.
    pub has_constructor: bool,
}

impl ServiceDescriptor {
    pub fn new(impl_id: impl Into<String>, interface: impl Into<TypeTag>) -> Self {
        Self {
            interface: interface.into(),
            impl_id: impl_id.into(),
            objects: Vec::new(),
            objects_from_module: false,
            module: None,
            description: String::new(),
            tags: Vec::new(),
            has_constructor: false,
        }
    }

    /// True when the implementation consumes `data_type`, directly or via
    /// the catch-all object type.
    #[must_use]
    pub fn accepts(&self, data_type: &TypeTag) -> bool {
        self.objects
            .iter()
            .any(|t| t.is_any_object() || t == data_type)
    }

    /// True when the implementation names `data_type` explicitly.
    #[must_use]
    pub fn accepts_specifically(&self, data_type: &TypeTag) -> bool {
        self.objects.iter().any(|t| t == data_type)
    }

    #[must_use]
    pub fn accepts_any_object(&self) -> bool {
        self.objects.iter().any(TypeTag::is_any_object)
    }

    /// Reachable by lookup but never instantiable.
    #[must_use]
    pub fn is_orphan(&self) -> bool {
        !self.has_constructor && self.module.is_none()
    }

    /// Instantiable now or after loading the owning module.
    #[must_use]
    pub fn is_instantiable(&self) -> bool {
        !self.is_orphan()
    }
}
