//! # Configuration Replay
//!
//! Application configurations launched on a complete runtime context:
//! declared objects, components loaded on demand, channels and proxies,
//! parameters and prefixes.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cd_04_lifecycle::{AppConfig, AppConfigManager, ConfigurationError, LaunchOptions};
    use conduit_runtime::{AppContext, RuntimeConfig, RuntimeError};
    use serde_json::{json, Value};
    use shared_bus::{EventFilter, EventTopic, RuntimeEvent};
    use shared_types::{ComponentId, GlobalStatus, ModuleId, ObjectId};

    use crate::integration::support::wait_for;

    fn context() -> AppContext {
        AppContext::new(RuntimeConfig::default()).unwrap()
    }

    /// Two counters: ticks drive the first, every count of the first drives
    /// the second.
    const COUNTERS: &str = r#"{
        "objects": [
            { "uid": "tick", "type": "conduit::Integer", "value": 0 },
            { "uid": "total_a", "type": "conduit::Integer", "deferred": true },
            { "uid": "total_b", "type": "conduit::Integer", "deferred": true }
        ],
        "components": [
            { "uid": "second", "type": "conduit::Counter",
              "objects": [ { "key": "count", "uid": "total_b", "access": "out" } ] },
            { "uid": "first", "type": "conduit::Counter", "config": { "step": 2 },
              "objects": [ { "key": "count", "uid": "total_a", "access": "out" } ] }
        ],
        "start": ["second", "first"],
        "connections": [
            { "channel": "ticks", "signals": ["tick/modified"], "slots": ["first/increment"] },
            { "signals": ["first/counted"], "slots": ["second/increment"] }
        ]
    }"#;

    const DOUBLING: &str = r#"{
        "parameters": { "source": "number" },
        "objects": [
            { "uid": "${source}", "type": "conduit::Integer", "value": 21 },
            { "uid": "doubled", "type": "conduit::Integer", "deferred": true }
        ],
        "components": [
            { "uid": "doubler", "type": "conduit::Doubler", "auto_connect": true,
              "objects": [ { "key": "input", "uid": "${source}" },
                           { "key": "output", "uid": "doubled", "access": "out" } ] }
        ],
        "start": ["doubler"]
    }"#;

    /// Current value of `uid`, or null while it is not registered.
    fn snapshot(app: &AppConfigManager, uid: &str) -> Value {
        app.manager()
            .object(&ObjectId::new(uid))
            .map_or(Value::Null, |object| object.snapshot().unwrap())
    }

    // =========================================================================
    // CHANNELS AND MODULES
    // =========================================================================

    #[test]
    fn test_counter_chain_through_channels() {
        let ctx = context();
        let diagnostics = ModuleId::from(conduit_runtime::builtins::DIAGNOSTICS_MODULE);
        assert!(!ctx.services.is_module_loaded(&diagnostics));

        let config = AppConfig::from_json("counters", COUNTERS).unwrap();
        let app = ctx.launch(&config, &LaunchOptions::default()).unwrap();
        assert!(ctx.services.is_module_loaded(&diagnostics));

        let manager = app.manager();
        for name in ["first", "second"] {
            assert_eq!(manager.status(&ComponentId::new(name)), Some(GlobalStatus::Started));
        }
        assert_eq!(snapshot(&app, "total_a"), json!(0));
        assert!(ctx.channels.contains("ticks"));

        let tick = manager.object(&ObjectId::new("tick")).unwrap();
        for value in 1..=3 {
            tick.assign(&json!(value), None).unwrap();
        }
        assert!(wait_for(|| snapshot(&app, "total_b") == json!(3)));
        assert_eq!(snapshot(&app, "total_a"), json!(6));

        drop(tick);
        ctx.shutdown();
        assert!(!ctx.channels.contains("ticks"));
        assert_eq!(ctx.osr.binding_count(), 0);
    }

    #[tokio::test]
    async fn test_launch_publishes_status_events() {
        let ctx = context();
        let mut events = ctx.event_bus.subscribe(EventFilter::topics(vec![EventTopic::Lifecycle]));

        let config = AppConfig::from_json("doubling", DOUBLING).unwrap();
        let app = ctx.launch(&config, &LaunchOptions::default()).unwrap();
        assert!(app.is_launched());

        let started = tokio::time::timeout(Duration::from_secs(2), async {
            while let Some(event) = events.recv().await {
                if let RuntimeEvent::StatusChanged { component, status } = event {
                    if component.as_str() == "doubler" && status == GlobalStatus::Started {
                        return true;
                    }
                }
            }
            false
        })
        .await
        .unwrap();
        assert!(started);

        drop(app);
        tokio::task::spawn_blocking(move || ctx.shutdown()).await.unwrap();
    }

    // =========================================================================
    // PARAMETERS AND PREFIXES
    // =========================================================================

    #[test]
    fn test_launch_file_with_parameter_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doubling.json");
        std::fs::write(&path, DOUBLING).unwrap();

        let ctx = context();
        let options = LaunchOptions::default().with_parameter("source", "seed");
        let app = ctx.launch_file(&path, &options).unwrap();

        assert!(app.manager().object(&ObjectId::new("seed")).is_some());
        assert!(app.manager().object(&ObjectId::new("number")).is_none());
        assert_eq!(snapshot(&app, "doubled"), json!(42));
        ctx.shutdown();
    }

    #[test]
    fn test_prefixed_launches_do_not_collide() {
        let ctx = context();
        let config = AppConfig::from_json("doubling", DOUBLING).unwrap();
        let one = ctx
            .launch(&config, &LaunchOptions::default().with_prefix("one"))
            .unwrap();
        let two = ctx
            .launch(&config, &LaunchOptions::default().with_prefix("two"))
            .unwrap();
        assert_eq!(ctx.launched(), 2);

        assert_eq!(snapshot(&one, "one_doubled"), json!(42));
        assert_eq!(snapshot(&two, "two_doubled"), json!(42));

        let number = one.manager().object(&ObjectId::new("one_number")).unwrap();
        number.assign(&json!(4), None).unwrap();
        assert!(wait_for(|| snapshot(&one, "one_doubled") == json!(8)));
        assert_eq!(snapshot(&two, "two_doubled"), json!(42));

        drop(number);
        ctx.shutdown();
        assert_eq!(ctx.launched(), 0);
    }

    // =========================================================================
    // REJECTED CONFIGURATIONS
    // =========================================================================

    #[test]
    fn test_unknown_implementation_launches_nothing() {
        let ctx = context();
        let config = AppConfig::from_json(
            "broken",
            r#"{ "objects": [ { "uid": "n", "type": "conduit::Integer", "value": 1 } ],
                 "components": [ { "uid": "x", "type": "it::NoSuchComponent",
                                   "objects": [ { "key": "input", "uid": "n" } ] } ] }"#,
        )
        .unwrap();
        let err = ctx.launch(&config, &LaunchOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Configuration(ConfigurationError::UnknownImplementation { .. })
        ));
        assert_eq!(ctx.launched(), 0);
        assert!(ctx.osr.components().is_empty());
        ctx.shutdown();
    }

    #[test]
    fn test_malformed_document_is_a_parse_error() {
        assert!(matches!(
            AppConfig::from_json("bad", "{ \"components\": 3 }"),
            Err(ConfigurationError::Parse { .. })
        ));
    }
}
