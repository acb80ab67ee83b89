//! # Factory Integration
//!
//! Typed construction by key through the factory registry, and service
//! creation through the service factory including on-demand module loads.

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::sync::Arc;

    use cd_01_factory_registry::{BaseType, FactoryEntry, FactoryRegistry, TypeKey};
    use cd_02_service_factory::{ServiceFactory, ServiceFactoryError};
    use cd_04_lifecycle::{register_static_components, Component, COMPONENT_INTERFACE};
    use cd_06_data_lock::DataValue;
    use conduit_runtime::builtins::{
        builtin_manifests, register_diagnostics, Integer, COUNTER, DIAGNOSTICS_MODULE, DOUBLER, LOGGER,
    };
    use conduit_runtime::StaticModuleLoader;
    use shared_types::{ModuleId, TypeTag};

    trait Shape: Send {
        fn sides(&self) -> u32;
        fn as_any(&self) -> &dyn Any;
    }

    impl BaseType for dyn Shape {
        const TAG: TypeTag = TypeTag::from_static("it::Shape");
    }

    struct Circle;
    struct Triangle;
    struct Square;

    impl Shape for Circle {
        fn sides(&self) -> u32 {
            0
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    impl Shape for Triangle {
        fn sides(&self) -> u32 {
            3
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    impl Shape for Square {
        fn sides(&self) -> u32 {
            4
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn shapes() -> FactoryRegistry {
        let registry = FactoryRegistry::new();
        registry
            .add_factory(FactoryEntry::new::<dyn Shape, _, _>("it::Circle", "circle".to_string(), || {
                Box::new(Circle) as Box<dyn Shape>
            }))
            .unwrap();
        registry
            .add_factory(FactoryEntry::new::<dyn Shape, _, _>("it::Triangle", 3u32, || {
                Box::new(Triangle) as Box<dyn Shape>
            }))
            .unwrap();
        registry
            .add_factory(FactoryEntry::new::<dyn Shape, _, _>(
                "it::Square",
                TypeKey::new("it::Square"),
                || Box::new(Square) as Box<dyn Shape>,
            ))
            .unwrap();
        registry
    }

    // =========================================================================
    // TYPED FACTORIES
    // =========================================================================

    #[test]
    fn test_registered_circle_is_created() {
        let registry = shapes();
        let shape = registry.create::<dyn Shape, _>(&"circle".to_string()).unwrap();
        assert!(shape.as_any().is::<Circle>());
    }

    #[test]
    fn test_unregistered_square_key_is_empty() {
        let registry = shapes();
        assert!(registry.create::<dyn Shape, _>(&"square".to_string()).is_none());
    }

    #[test]
    fn test_every_registered_triple_creates_its_concrete_type() {
        let registry = shapes();

        let (tag, circle) = registry.create_tagged::<dyn Shape, _>(&"circle".to_string()).unwrap();
        assert_eq!(tag.as_str(), "it::Circle");
        assert_eq!(circle.sides(), 0);

        let (tag, triangle) = registry.create_tagged::<dyn Shape, _>(&3u32).unwrap();
        assert_eq!(tag.as_str(), "it::Triangle");
        assert!(triangle.as_any().is::<Triangle>());

        let (tag, square) = registry
            .create_tagged::<dyn Shape, _>(&TypeKey::new("it::Square"))
            .unwrap();
        assert_eq!(tag.as_str(), "it::Square");
        assert_eq!(square.sides(), 4);
    }

    #[test]
    fn test_unregistered_keys_never_fail() {
        let registry = shapes();
        assert!(registry.create::<dyn Shape, _>(&4u32).is_none());
        assert!(registry.create::<dyn Shape, _>(&7u64).is_none());
        assert!(registry.create::<dyn Shape, _>(&TypeKey::new("it::Hexagon")).is_none());
        assert!(registry.create::<dyn Component, _>(&"circle".to_string()).is_none());
        assert!(FactoryRegistry::new().create::<dyn Shape, _>(&"circle".to_string()).is_none());
    }

    // =========================================================================
    // SERVICE FACTORY
    // =========================================================================

    fn services_with_builtins() -> ServiceFactory<dyn Component> {
        let loader = StaticModuleLoader::new().with_module(DIAGNOSTICS_MODULE, register_diagnostics);
        let services = ServiceFactory::<dyn Component>::with_loader(Arc::new(loader));
        register_static_components(&services).unwrap();
        services.merge_manifests(&builtin_manifests()).unwrap();
        services
    }

    #[test]
    fn test_static_components_are_known_without_loading() {
        let services = services_with_builtins();
        assert!(services.create(&COMPONENT_INTERFACE, DOUBLER).unwrap().is_some());
        assert!(services.supports(&Integer::TYPE, &COMPONENT_INTERFACE, DOUBLER));
        assert!(!services.is_module_loaded(&ModuleId::from(DIAGNOSTICS_MODULE)));
    }

    #[test]
    fn test_module_is_loaded_on_first_creation() {
        let services = services_with_builtins();
        assert!(services.descriptor(COUNTER).is_some());

        assert!(services.create(&COMPONENT_INTERFACE, COUNTER).unwrap().is_some());
        assert!(services.is_module_loaded(&ModuleId::from(DIAGNOSTICS_MODULE)));

        // the same module also provides the logger
        assert!(services.create(&COMPONENT_INTERFACE, LOGGER).unwrap().is_some());
        assert_eq!(services.loaded_modules().len(), 1);
    }

    #[test]
    fn test_wrong_interface_and_unknown_implementation() {
        let services = services_with_builtins();
        let other = TypeTag::from_static("it::Other");
        assert!(matches!(
            services.create(&other, DOUBLER),
            Err(ServiceFactoryError::InterfaceMismatch { .. })
        ));
        assert!(services.create(&COMPONENT_INTERFACE, "it::Nothing").unwrap().is_none());
    }

    #[test]
    fn test_missing_loader_is_reported() {
        let services: ServiceFactory<dyn Component> = ServiceFactory::new();
        services.merge_manifests(&builtin_manifests()).unwrap();
        assert!(matches!(
            services.create(&COMPONENT_INTERFACE, COUNTER),
            Err(ServiceFactoryError::NoModuleLoader { .. })
        ));
    }
}
