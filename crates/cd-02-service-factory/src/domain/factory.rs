//! # Service Factory
//!
//! Maps implementation ids to descriptors and creates instances of the base
//! type `C` (usually `dyn Component`).
//!
//! ## Where descriptors come from
//!
//! | Source | Sets |
//! |--------|------|
//! | static registration | interface, constructor, consumed data types |
//! | module manifest | interface, owning module, description, tags, data types |
//!
//! Both sources are merged by implementation id.
//!
//! ## Creation
//!
//! ```text
//! create(impl) ──constructor?──yes──→ instance
//!                    │ no
//!                    ▼
//!             owning module? ──no──→ ModuleMissing
//!                    │ yes
//!                    ▼
//!             already loaded? ──yes──→ ModuleAlreadyLoaded
//!                    │ no
//!                    ▼
//!             load (lock released) ──→ constructor? ──no──→ StillMissingAfterLoad
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::marker::PhantomData;
use std::sync::Arc;

use cd_01_factory_registry::{BaseType, FactoryEntry, FactoryRegistry};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use shared_types::{ModuleId, TypeTag};
use tracing::{debug, info, warn};

use super::descriptor::ServiceDescriptor;
use super::manifest::ModuleManifest;
use crate::error::{ServiceFactoryError, ServiceFactoryResult};
use crate::ports::ModuleLoader;

/// Registry of service implementations creating `C` instances.
pub struct ServiceFactory<C: BaseType + ?Sized> {
    descriptors: RwLock<BTreeMap<String, ServiceDescriptor>>,
    constructors: FactoryRegistry,
    loader: RwLock<Option<Arc<dyn ModuleLoader<C>>>>,
    loaded_modules: Mutex<BTreeSet<ModuleId>>,
    /// Serializes module loads; reentrant so a module may create services
    /// while it loads.
    loading: ReentrantMutex<()>,
    /// (data type, interface) → supported
    support_cache: Mutex<HashMap<(TypeTag, TypeTag), bool>>,
    _base: PhantomData<fn() -> Box<C>>,
}

impl<C: BaseType + ?Sized> Default for ServiceFactory<C> {
    fn default() -> Self {
        Self {
            descriptors: RwLock::new(BTreeMap::new()),
            constructors: FactoryRegistry::new(),
            loader: RwLock::new(None),
            loaded_modules: Mutex::new(BTreeSet::new()),
            loading: ReentrantMutex::new(()),
            support_cache: Mutex::new(HashMap::new()),
            _base: PhantomData,
        }
    }
}

impl<C: BaseType + ?Sized> ServiceFactory<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_loader(loader: Arc<dyn ModuleLoader<C>>) -> Self {
        let factory = Self::default();
        factory.set_module_loader(loader);
        factory
    }

    pub fn set_module_loader(&self, loader: Arc<dyn ModuleLoader<C>>) {
        *self.loader.write() = Some(loader);
    }

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    /// Register the in-memory constructor of an implementation.
    ///
    /// An existing descriptor (from a manifest) must declare the same
    /// interface and must not have a constructor yet.
    pub fn add_service_factory<F>(
        &self,
        impl_id: &str,
        interface: impl Into<TypeTag>,
        constructor: F,
    ) -> ServiceFactoryResult<()>
    where
        F: Fn() -> Box<C> + Send + Sync + 'static,
    {
        let interface = interface.into();
        let mut descriptors = self.descriptors.write();

        if let Some(existing) = descriptors.get(impl_id) {
            if existing.has_constructor {
                return Err(ServiceFactoryError::DuplicateConstructor(impl_id.to_string()));
            }
            if existing.interface != interface {
                return Err(ServiceFactoryError::InterfaceConflict {
                    impl_id: impl_id.to_string(),
                    existing: existing.interface.clone(),
                    requested: interface,
                });
            }
        }

        self.constructors
            .add_factory(FactoryEntry::new::<C, _, _>(
                TypeTag::new(impl_id),
                impl_id.to_string(),
                constructor,
            ))
            .map_err(|_| ServiceFactoryError::DuplicateConstructor(impl_id.to_string()))?;

        descriptors
            .entry(impl_id.to_string())
            .or_insert_with(|| ServiceDescriptor::new(impl_id, interface.clone()))
            .has_constructor = true;
        drop(descriptors);

        self.support_cache.lock().clear();
        debug!(impl_id = %impl_id, interface = %interface, "Service constructor registered");
        Ok(())
    }

    /// Declare that an implementation consumes `data_type`.
    ///
    /// When the owning module's manifest listed the data types, they are
    /// authoritative and `data_type` must be one of them.
    pub fn add_object_type(
        &self,
        impl_id: &str,
        data_type: impl Into<TypeTag>,
    ) -> ServiceFactoryResult<()> {
        let data_type = data_type.into();
        let mut descriptors = self.descriptors.write();
        let descriptor = descriptors
            .get_mut(impl_id)
            .ok_or_else(|| ServiceFactoryError::UnknownImplementation(impl_id.to_string()))?;

        if descriptor.objects_from_module {
            if !descriptor.objects.is_empty() && !descriptor.objects.contains(&data_type) {
                return Err(ServiceFactoryError::ObjectNotDeclared {
                    impl_id: impl_id.to_string(),
                    data_type,
                });
            }
        } else {
            descriptor.objects.push(data_type.clone());
            drop(descriptors);
            self.support_cache.lock().clear();
        }
        debug!(impl_id = %impl_id, data_type = %data_type, "Service data type registered");
        Ok(())
    }

    /// Constructor plus consumed data types in one call.
    pub fn register<F>(
        &self,
        impl_id: &str,
        interface: impl Into<TypeTag>,
        objects: &[TypeTag],
        constructor: F,
    ) -> ServiceFactoryResult<()>
    where
        F: Fn() -> Box<C> + Send + Sync + 'static,
    {
        self.add_service_factory(impl_id, interface, constructor)?;
        for object in objects {
            self.add_object_type(impl_id, object.clone())?;
        }
        Ok(())
    }

    /// Merge a module manifest into the descriptors.
    ///
    /// Every service is checked before anything is changed, so a rejected
    /// manifest leaves the factory untouched.
    pub fn merge_manifest(&self, manifest: &ModuleManifest) -> ServiceFactoryResult<()> {
        let mut descriptors = self.descriptors.write();

        for service in &manifest.services {
            let Some(existing) = descriptors.get(&service.impl_id) else {
                continue;
            };
            if let Some(module) = existing.module.as_ref().filter(|m| **m != manifest.id) {
                return Err(ServiceFactoryError::ModuleConflict {
                    impl_id: service.impl_id.clone(),
                    existing: module.clone(),
                    requested: manifest.id.clone(),
                });
            }
            if existing.interface != service.interface {
                return Err(ServiceFactoryError::InterfaceConflict {
                    impl_id: service.impl_id.clone(),
                    existing: existing.interface.clone(),
                    requested: service.interface.clone(),
                });
            }
            if !service.objects.is_empty()
                && !existing.objects.is_empty()
                && service.objects != existing.objects
            {
                return Err(ServiceFactoryError::ObjectsMismatch {
                    impl_id: service.impl_id.clone(),
                    module: manifest.id.clone(),
                });
            }
        }

        for service in &manifest.services {
            let descriptor = descriptors
                .entry(service.impl_id.clone())
                .or_insert_with(|| {
                    ServiceDescriptor::new(service.impl_id.clone(), service.interface.clone())
                });
            descriptor.module = Some(manifest.id.clone());
            descriptor.description = service.description.clone();
            descriptor.tags = service.tags.clone();
            descriptor.objects_from_module = !service.objects.is_empty();
            if descriptor.objects_from_module {
                descriptor.objects = service.objects.clone();
            }
        }
        drop(descriptors);

        self.support_cache.lock().clear();
        info!(
            module = %manifest.id,
            services = manifest.services.len(),
            "Module manifest merged"
        );
        Ok(())
    }

    /// Merge several manifests, then warn about descriptors no module
    /// declares. Returns those implementation ids.
    pub fn merge_manifests(&self, manifests: &[ModuleManifest]) -> ServiceFactoryResult<Vec<String>> {
        for manifest in manifests {
            self.merge_manifest(manifest)?;
        }
        let unresolved = self.unresolved();
        for impl_id in &unresolved {
            warn!(impl_id = %impl_id, "Service is not declared by any module manifest");
        }
        Ok(unresolved)
    }

    /// Implementations without an owning module. They are usable only
    /// through their in-memory constructor.
    #[must_use]
    pub fn unresolved(&self) -> Vec<String> {
        self.descriptors
            .read()
            .values()
            .filter(|d| d.module.is_none())
            .map(|d| d.impl_id.clone())
            .collect()
    }

    // =========================================================================
    // CREATION
    // =========================================================================

    /// Create `impl_id`, checking it implements `interface`.
    ///
    /// An unknown implementation is `Ok(None)`.
    pub fn create(&self, interface: &TypeTag, impl_id: &str) -> ServiceFactoryResult<Option<Box<C>>> {
        match self.interface_of(impl_id) {
            None => Ok(None),
            Some(actual) if actual != *interface => Err(ServiceFactoryError::InterfaceMismatch {
                impl_id: impl_id.to_string(),
                expected: interface.clone(),
                actual,
            }),
            Some(_) => self.create_impl(impl_id),
        }
    }

    /// Create `impl_id` whatever its interface, loading its module on a miss.
    pub fn create_impl(&self, impl_id: &str) -> ServiceFactoryResult<Option<Box<C>>> {
        let Some(module) = self.descriptors.read().get(impl_id).map(|d| d.module.clone()) else {
            return Ok(None);
        };

        let key = impl_id.to_string();
        if let Some(instance) = self.constructors.create::<C, _>(&key) {
            debug!(impl_id = %impl_id, "Service created");
            return Ok(Some(instance));
        }

        let module = module.ok_or_else(|| ServiceFactoryError::ModuleMissing(key.clone()))?;
        self.load_owning_module(impl_id, &module)?;

        self.constructors
            .create::<C, _>(&key)
            .map(Some)
            .ok_or(ServiceFactoryError::StillMissingAfterLoad {
                impl_id: key,
                module,
            })
    }

    fn load_owning_module(&self, impl_id: &str, module: &ModuleId) -> ServiceFactoryResult<()> {
        let _loading = self.loading.lock();

        // Another caller may have loaded it while we waited.
        if self.constructors.contains::<C, _>(&impl_id.to_string()) {
            return Ok(());
        }
        if self.loaded_modules.lock().contains(module) {
            return Err(ServiceFactoryError::ModuleAlreadyLoaded {
                impl_id: impl_id.to_string(),
                module: module.clone(),
            });
        }

        let loader = self
            .loader
            .read()
            .clone()
            .ok_or_else(|| ServiceFactoryError::NoModuleLoader {
                impl_id: impl_id.to_string(),
                module: module.clone(),
            })?;

        info!(module = %module, impl_id = %impl_id, "Loading module");
        loader.load(module, self)?;
        self.loaded_modules.lock().insert(module.clone());
        Ok(())
    }

    #[must_use]
    pub fn is_module_loaded(&self, module: &ModuleId) -> bool {
        self.loaded_modules.lock().contains(module)
    }

    #[must_use]
    pub fn loaded_modules(&self) -> Vec<ModuleId> {
        self.loaded_modules.lock().iter().cloned().collect()
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[must_use]
    pub fn descriptor(&self, impl_id: &str) -> Option<ServiceDescriptor> {
        self.descriptors.read().get(impl_id).cloned()
    }

    #[must_use]
    pub fn interface_of(&self, impl_id: &str) -> Option<TypeTag> {
        self.descriptors.read().get(impl_id).map(|d| d.interface.clone())
    }

    /// Consumed data types of an implementation, in declaration order.
    #[must_use]
    pub fn get_service_objects(&self, impl_id: &str) -> Option<Vec<TypeTag>> {
        self.descriptors.read().get(impl_id).map(|d| d.objects.clone())
    }

    #[must_use]
    pub fn description(&self, impl_id: &str) -> Option<String> {
        self.descriptors.read().get(impl_id).map(|d| d.description.clone())
    }

    #[must_use]
    pub fn tags(&self, impl_id: &str) -> Option<Vec<String>> {
        self.descriptors.read().get(impl_id).map(|d| d.tags.clone())
    }

    /// Implementations of `interface` accepting `data_type`.
    #[must_use]
    pub fn implementations_for(&self, data_type: &TypeTag, interface: &TypeTag) -> Vec<String> {
        self.descriptors
            .read()
            .values()
            .filter(|d| d.interface == *interface && d.accepts(data_type))
            .map(|d| d.impl_id.clone())
            .collect()
    }

    /// The implementation of `interface` to use for `data_type`: one naming
    /// the type explicitly wins over one accepting any object.
    #[must_use]
    pub fn default_implementation(&self, data_type: &TypeTag, interface: &TypeTag) -> Option<String> {
        let descriptors = self.descriptors.read();
        let candidates = || descriptors.values().filter(|d| d.interface == *interface);

        let mut specific = candidates().filter(|d| d.accepts_specifically(data_type));
        if let Some(found) = specific.next() {
            if let Some(other) = specific.next() {
                warn!(
                    data_type = %data_type,
                    interface = %interface,
                    chosen = %found.impl_id,
                    other = %other.impl_id,
                    "Several specific implementations, using the first"
                );
            }
            return Some(found.impl_id.clone());
        }
        candidates()
            .find(|d| d.accepts_any_object())
            .map(|d| d.impl_id.clone())
    }

    /// True when `impl_id` implements `interface` and accepts `data_type`.
    #[must_use]
    pub fn supports(&self, data_type: &TypeTag, interface: &TypeTag, impl_id: &str) -> bool {
        self.descriptors
            .read()
            .get(impl_id)
            .is_some_and(|d| d.interface == *interface && d.accepts(data_type))
    }

    /// True when any implementation of `interface` accepts `data_type`.
    pub fn supports_interface(&self, data_type: &TypeTag, interface: &TypeTag) -> bool {
        let key = (data_type.clone(), interface.clone());
        if let Some(cached) = self.support_cache.lock().get(&key) {
            return *cached;
        }
        let supported = self
            .descriptors
            .read()
            .values()
            .any(|d| d.interface == *interface && d.accepts(data_type));
        self.support_cache.lock().insert(key, supported);
        supported
    }

    /// True when `impl_id` exists and accepts `data_type`.
    #[must_use]
    pub fn check_validity(&self, data_type: &TypeTag, impl_id: &str) -> bool {
        self.descriptors
            .read()
            .get(impl_id)
            .is_some_and(|d| d.accepts(data_type))
    }

    /// All implementation ids, sorted.
    #[must_use]
    pub fn implementations(&self) -> Vec<String> {
        self.descriptors.read().keys().cloned().collect()
    }

    /// Forget every descriptor and constructor. Loaded modules stay loaded.
    pub fn clear(&self) {
        self.descriptors.write().clear();
        self.constructors.clear();
        self.support_cache.lock().clear();
        debug!("Service factory cleared");
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.read().is_empty()
    }
}
