//! # Lifecycle Integration
//!
//! Requirement-driven start/stop/swap through the lifecycle manager with
//! real registries underneath.
//!
//! ```text
//! add_object ──► OSR binding ──► manager re-evaluates ──► start / swap / stop
//!                    ▲                                         │
//!                    └──────────── component outputs ◄─────────┘
//! ```

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cd_04_lifecycle::{
        AutoFlags, Component, ComponentConfig, LifecycleError, ObjectSpec, COMPONENT_INTERFACE,
    };
    use rand::seq::SliceRandom;
    use shared_types::{Access, ComponentId, GlobalStatus, Key, ObjectId};

    use crate::integration::support::{manager, num, Calls, Recorder};

    fn id(text: &str) -> ComponentId {
        ComponentId::new(text)
    }

    // =========================================================================
    // MANDATORY AND OPTIONAL KEYS
    // =========================================================================

    #[test]
    fn test_mandatory_and_optional_inputs() {
        let manager = manager();
        let calls = Calls::shared();
        manager
            .add_instance(
                ComponentConfig::new("s", "it::Recorder")
                    .with_object(ObjectSpec::input("a", "obj_a"))
                    .with_object(ObjectSpec::input("b", "obj_b").optional(true)),
                Recorder::new(&calls),
                AutoFlags::start(),
            )
            .unwrap();
        manager.start_components().unwrap();
        assert_eq!(manager.status(&id("s")), Some(GlobalStatus::Stopped));

        // only the mandatory key
        manager.add_object("obj_a", num("obj_a", 1)).unwrap();
        assert_eq!(manager.status(&id("s")), Some(GlobalStatus::Started));
        assert_eq!(calls.starts(), 1);

        // the optional key swaps in place
        manager.add_object("obj_b", num("obj_b", 2)).unwrap();
        assert_eq!(manager.status(&id("s")), Some(GlobalStatus::Started));
        assert_eq!(calls.swaps(), 1);
        assert_eq!(calls.stops(), 0);

        manager.remove_object(&ObjectId::new("obj_a")).unwrap();
        assert_eq!(manager.status(&id("s")), Some(GlobalStatus::Stopped));
        assert_eq!(calls.stops(), 1);

        manager.add_object("obj_a", num("obj_a", 3)).unwrap();
        assert_eq!(manager.status(&id("s")), Some(GlobalStatus::Started));
        assert_eq!(calls.starts(), 2);

        // removing the optional key swaps again
        manager.remove_object(&ObjectId::new("obj_b")).unwrap();
        assert_eq!(manager.status(&id("s")), Some(GlobalStatus::Started));
        assert_eq!(calls.swaps(), 2);
    }

    #[test]
    fn test_bindings_follow_the_objects() {
        let manager = manager();
        let calls = Calls::shared();
        manager
            .add_instance(
                ComponentConfig::new("s", "it::Recorder").with_object(ObjectSpec::input("a", "obj_a")),
                Recorder::new(&calls),
                AutoFlags::start(),
            )
            .unwrap();
        manager.start_components().unwrap();

        let osr = manager.deps().osr.clone();
        assert!(osr.get_registered(&id("s"), &Key::new("a")).is_none());
        manager.add_object("obj_a", num("obj_a", 1)).unwrap();
        assert!(osr.is_registered(&id("s"), &Key::new("a"), Access::Input));
        manager.remove_object(&ObjectId::new("obj_a")).unwrap();
        assert!(osr.get_registered(&id("s"), &Key::new("a")).is_none());
    }

    // =========================================================================
    // ORDER INDEPENDENCE
    // =========================================================================

    const KEYS: [&str; 4] = ["k0", "k1", "k2", "k3"];

    fn run_binding_order(order: &[&str]) {
        let manager = manager();
        let calls = Calls::shared();
        let config = KEYS
            .iter()
            .fold(ComponentConfig::new("n", "it::Recorder"), |config, key| {
                config.with_object(ObjectSpec::input(*key, *key))
            });
        manager
            .add_instance(config, Recorder::new(&calls), AutoFlags::start())
            .unwrap();
        manager.start_components().unwrap();

        let (last, first) = order.split_last().unwrap();
        for key in first {
            manager.add_object(*key, num(key, 0)).unwrap();
            assert_eq!(
                manager.status(&id("n")),
                Some(GlobalStatus::Stopped),
                "started early in order {order:?}"
            );
        }
        manager.add_object(*last, num(last, 0)).unwrap();
        assert_eq!(
            manager.status(&id("n")),
            Some(GlobalStatus::Started),
            "not started in order {order:?}"
        );
        assert_eq!(calls.starts(), 1);

        let mut rng = rand::thread_rng();
        let dropped = KEYS.choose(&mut rng).unwrap();
        manager.remove_object(&ObjectId::new(*dropped)).unwrap();
        assert_eq!(manager.status(&id("n")), Some(GlobalStatus::Stopped));
        assert_eq!(calls.stops(), 1);
    }

    #[test]
    fn test_start_is_independent_of_binding_order() {
        run_binding_order(&KEYS);
        let mut reversed = KEYS;
        reversed.reverse();
        run_binding_order(&reversed);

        let mut rng = rand::thread_rng();
        for _ in 0..16 {
            let mut order = KEYS;
            order.shuffle(&mut rng);
            run_binding_order(&order);
        }
    }

    // =========================================================================
    // DEPENDENCY CHAINING
    // =========================================================================

    #[test]
    fn test_outputs_satisfy_downstream_in_one_pass() {
        let manager = manager();
        let (first, second, third) = (Calls::shared(), Calls::shared(), Calls::shared());

        // declared downstream-first so nothing depends on declaration order
        manager
            .add_instance(
                ComponentConfig::new("c", "it::Recorder").with_object(ObjectSpec::input("in", "y")),
                Recorder::new(&third),
                AutoFlags::start(),
            )
            .unwrap();
        manager
            .add_instance(
                ComponentConfig::new("b", "it::Recorder")
                    .with_object(ObjectSpec::input("in", "x"))
                    .with_object(ObjectSpec::output("out", "y")),
                Recorder::producing(&second, "out"),
                AutoFlags::start(),
            )
            .unwrap();
        manager
            .add_instance(
                ComponentConfig::new("a", "it::Recorder").with_object(ObjectSpec::output("out", "x")),
                Recorder::producing(&first, "out"),
                AutoFlags::start(),
            )
            .unwrap();

        manager.start_components().unwrap();
        for name in ["a", "b", "c"] {
            assert_eq!(manager.status(&id(name)), Some(GlobalStatus::Started), "{name}");
        }
        assert!(manager.object(&ObjectId::new("x")).is_some());
        assert!(manager.object(&ObjectId::new("y")).is_some());

        // withdrawing the head of the chain stops everything after it
        manager.stop_component(&id("a")).unwrap();
        assert_eq!(manager.status(&id("b")), Some(GlobalStatus::Stopped));
        assert_eq!(manager.status(&id("c")), Some(GlobalStatus::Stopped));
        assert!(manager.object(&ObjectId::new("y")).is_none());

        manager.start_component(&id("a")).unwrap();
        assert_eq!(manager.status(&id("c")), Some(GlobalStatus::Started));
        assert_eq!(third.starts(), 2);
    }

    #[test]
    fn test_update_runs_after_start_when_flagged() {
        let manager = manager();
        let calls = Calls::shared();
        manager
            .add_instance(
                ComponentConfig::new("u", "it::Recorder").with_object(ObjectSpec::input("a", "a")),
                Recorder::new(&calls),
                AutoFlags::start_and_update(),
            )
            .unwrap();
        manager.start_components().unwrap();
        manager.add_object("a", num("a", 1)).unwrap();
        assert_eq!(calls.starts(), 1);
        assert_eq!(calls.updates(), 1);

        manager.add_object("a", num("a", 2)).unwrap();
        assert_eq!(calls.swaps(), 1);
        assert_eq!(calls.updates(), 1);

        manager.update_component(&id("u")).unwrap();
        assert_eq!(calls.updates(), 2);
    }

    // =========================================================================
    // SERVICE FACTORY AND TEARDOWN
    // =========================================================================

    #[test]
    fn test_components_created_through_the_service_factory() {
        let manager = manager();
        let calls = Calls::shared();
        let shared = calls.clone();
        manager
            .deps()
            .services
            .add_service_factory("it::Recorder", COMPONENT_INTERFACE, move || {
                Recorder::new(&shared) as Box<dyn Component>
            })
            .unwrap();

        manager
            .add_component(
                ComponentConfig::new("r", "it::Recorder").with_object(ObjectSpec::input("a", "a")),
                AutoFlags::start(),
            )
            .unwrap();
        assert!(matches!(
            manager.add_component(ComponentConfig::new("q", "it::Missing"), AutoFlags::MANUAL),
            Err(LifecycleError::UnknownImplementation(_))
        ));

        manager.start_components().unwrap();
        manager.add_object("a", num("a", 1)).unwrap();
        assert_eq!(manager.status(&id("r")), Some(GlobalStatus::Started));

        manager.destroy().unwrap();
        assert_eq!(calls.stops(), 1);
        assert!(manager.component(&id("r")).is_none());
        assert!(manager.object(&ObjectId::new("a")).is_none());
    }

    #[test]
    fn test_destroy_refuses_while_a_handle_is_held() {
        let manager = manager();
        let calls = Calls::shared();
        let handle = manager
            .add_instance(ComponentConfig::new("h", "it::Recorder"), Recorder::new(&calls), AutoFlags::start())
            .unwrap();
        manager.start_components().unwrap();
        assert!(handle.is_started());

        let held = Arc::clone(&handle);
        drop(handle);
        assert!(matches!(manager.destroy(), Err(LifecycleError::StillReferenced(ids)) if ids == vec![id("h")]));
        assert!(held.is_stopped());
    }
}
