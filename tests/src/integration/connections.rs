//! # Connection Integration
//!
//! Auto-connections that follow object swaps, and named channels linking
//! object signals to component slots.

#[cfg(test)]
mod tests {
    use cd_04_lifecycle::{AutoFlags, ComponentConfig, ObjectSpec};
    use cd_05_connections::Message;
    use cd_06_data_lock::{Data, DataObject, MODIFIED_SIGNAL};
    use shared_types::{ComponentId, Endpoint, GlobalStatus, Key, ObjectId};

    use crate::integration::support::{manager, num, wait_for, Calls, Num, Recorder};

    fn watched() -> ComponentConfig {
        ComponentConfig::new("w", "it::Recorder")
            .with_object(ObjectSpec::input("a", "value").auto_connect(true))
    }

    // =========================================================================
    // AUTO-CONNECTIONS
    // =========================================================================

    #[test]
    fn test_rebinding_never_leaks_connections() {
        let manager = manager();
        let calls = Calls::shared();
        let handle = manager
            .add_instance(watched(), Recorder::watching(&calls, "a"), AutoFlags::start())
            .unwrap();
        manager.start_components().unwrap();
        let key = Key::new("a");

        let mut previous = Vec::new();
        for round in 0..25 {
            let object = Data::new("value", Num(round));
            manager.add_object("value", object.as_object()).unwrap();
            assert!(handle.live_connections(&key) <= 1, "round {round}");
            previous.push(object);
        }
        assert_eq!(handle.live_connections(&key), 1);
        assert_eq!(calls.swaps(), 24);

        // only the object bound now still reaches the component
        let current = previous.pop().unwrap();
        for stale in &previous {
            assert_eq!(stale.notify_modified(None), 0);
        }
        assert_eq!(current.notify_modified(None), 1);
        assert!(wait_for(|| calls.received() == 1));

        manager.remove_object(&ObjectId::new("value")).unwrap();
        assert_eq!(handle.live_connections(&key), 0);
        assert_eq!(handle.status(), GlobalStatus::Stopped);
        assert_eq!(current.notify_modified(None), 0);
    }

    #[test]
    fn test_stopped_component_holds_no_connections() {
        let manager = manager();
        let calls = Calls::shared();
        let handle = manager
            .add_instance(watched(), Recorder::watching(&calls, "a"), AutoFlags::start())
            .unwrap();
        manager.start_components().unwrap();
        manager.add_object("value", num("value", 1)).unwrap();
        assert_eq!(handle.live_connections(&Key::new("a")), 1);

        manager.stop_component(&ComponentId::new("w")).unwrap();
        assert_eq!(handle.live_connections(&Key::new("a")), 0);

        manager.start_component(&ComponentId::new("w")).unwrap();
        assert_eq!(handle.live_connections(&Key::new("a")), 1);
    }

    #[test]
    fn test_own_modifications_are_not_echoed() {
        let manager = manager();
        let calls = Calls::shared();
        let _handle = manager
            .add_instance(watched(), Recorder::watching(&calls, "a"), AutoFlags::start())
            .unwrap();
        manager.start_components().unwrap();
        let object = Data::new("value", Num(0));
        manager.add_object("value", object.as_object()).unwrap();

        object.notify_modified(Some(ComponentId::new("w")));
        object.notify_modified(Some(ComponentId::new("someone-else")));
        assert!(wait_for(|| calls.received() == 1));
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(calls.received(), 1);
    }

    // =========================================================================
    // CHANNELS
    // =========================================================================

    #[test]
    fn test_proxy_follows_the_object() {
        let manager = manager();
        let calls = Calls::shared();
        let handle = manager
            .add_instance(ComponentConfig::new("r", "it::Recorder"), Recorder::new(&calls), AutoFlags::start())
            .unwrap();
        manager.start_components().unwrap();

        let channels = manager.deps().channels.clone();
        let slot = handle.slot(Recorder::CHANGED_SLOT).unwrap();
        channels
            .connect_slot("ticks", Endpoint::new("r", Recorder::CHANGED_SLOT), slot)
            .unwrap();
        manager
            .add_proxy("ticks", &Endpoint::new("tick", MODIFIED_SIGNAL))
            .unwrap();
        assert_eq!(channels.route_count("ticks"), 0);

        let tick = Data::new("tick", Num(0));
        manager.add_object("tick", tick.as_object()).unwrap();
        assert_eq!(channels.route_count("ticks"), 1);
        tick.notify_modified(None);
        assert!(wait_for(|| calls.received() == 1));

        // a replacement object takes over the route
        let replacement = Data::new("tick", Num(1));
        manager.add_object("tick", replacement.as_object()).unwrap();
        assert_eq!(channels.route_count("ticks"), 1);
        assert_eq!(tick.notify_modified(None), 0);
        replacement.notify_modified(None);
        assert!(wait_for(|| calls.received() == 2));

        manager.remove_object(&ObjectId::new("tick")).unwrap();
        assert_eq!(channels.route_count("ticks"), 0);
        assert!(channels.contains("ticks"));
    }

    #[test]
    fn test_channel_fans_out_and_tears_down() {
        let manager = manager();
        let (left, right) = (Calls::shared(), Calls::shared());
        let left_handle = manager
            .add_instance(ComponentConfig::new("left", "it::Recorder"), Recorder::new(&left), AutoFlags::start())
            .unwrap();
        let right_handle = manager
            .add_instance(ComponentConfig::new("right", "it::Recorder"), Recorder::new(&right), AutoFlags::start())
            .unwrap();
        manager.start_components().unwrap();

        let source = num("source", 0);
        let channels = manager.deps().channels.clone();
        let emitter = source.signals().get(MODIFIED_SIGNAL).unwrap();
        channels
            .connect_signal("fan", Endpoint::new("source", MODIFIED_SIGNAL), emitter)
            .unwrap();
        for (name, handle) in [("left", &left_handle), ("right", &right_handle)] {
            let slot = handle.slot(Recorder::CHANGED_SLOT).unwrap();
            channels
                .connect_slot("fan", Endpoint::new(name, Recorder::CHANGED_SLOT), slot)
                .unwrap();
        }
        assert_eq!(channels.route_count("fan"), 2);

        assert_eq!(source.signals().emit(MODIFIED_SIGNAL, Message::empty()), 2);
        assert!(wait_for(|| left.received() == 1 && right.received() == 1));

        channels.teardown("fan").unwrap();
        assert!(!channels.contains("fan"));
        assert_eq!(source.signals().emit(MODIFIED_SIGNAL, Message::empty()), 0);
    }
}
