//! # Application Context
//!
//! The root object owning every registry. Nothing in the runtime is global:
//! two contexts in one process never see each other's factories, bindings or
//! channels.
//!
//! ```text
//! AppContext
//! ├── data_types   FactoryRegistry            (static data-type registrations)
//! ├── services     ServiceFactory<dyn Component> + StaticModuleLoader
//! ├── osr          ObjectServiceRegistry ──┐
//! ├── channels     ChannelRegistry ────────┼──→ event_bus
//! ├── workers      WorkerRegistry          │
//! ├── event_bus    InMemoryEventBus ←──────┘
//! ├── manager      LifecycleManager        (components added directly)
//! └── apps         AppConfigManager per launched configuration
//! ```

use std::path::Path;
use std::sync::Arc;

use cd_01_factory_registry::{register_static_factories, FactoryRegistry};
use cd_02_service_factory::{ModuleManifest, ServiceFactory};
use cd_03_object_registry::ObjectServiceRegistry;
use cd_04_lifecycle::{
    register_static_components, AppConfig, AppConfigManager, Component, LaunchOptions,
    LifecycleDeps, LifecycleManager,
};
use cd_05_connections::{ChannelRegistry, WorkerRegistry};
use parking_lot::Mutex;
use shared_bus::{EventPublisher, InMemoryEventBus};
use tracing::{error, info, instrument, warn};

use crate::adapters::StaticModuleLoader;
use crate::builtins::{builtin_manifests, register_diagnostics, DIAGNOSTICS_MODULE};
use crate::container::config::RuntimeConfig;
use crate::error::RuntimeResult;

/// Owns the registries and every application launched on them.
pub struct AppContext {
    pub config: RuntimeConfig,
    pub data_types: Arc<FactoryRegistry>,
    pub services: Arc<ServiceFactory<dyn Component>>,
    pub loader: Arc<StaticModuleLoader>,
    pub osr: Arc<ObjectServiceRegistry>,
    pub channels: Arc<ChannelRegistry>,
    pub workers: Arc<WorkerRegistry>,
    pub event_bus: Arc<InMemoryEventBus>,
    pub manager: LifecycleManager,
    apps: Mutex<Vec<Arc<AppConfigManager>>>,
}

impl AppContext {
    /// Build every registry and apply the static registrations and module
    /// manifests.
    #[instrument(name = "context_init", skip(config))]
    pub fn new(config: RuntimeConfig) -> RuntimeResult<Self> {
        config.validate()?;

        let event_bus = Arc::new(InMemoryEventBus::with_capacity(config.event_capacity));
        let publisher: Arc<dyn EventPublisher> = event_bus.clone();

        let data_types = Arc::new(FactoryRegistry::new());
        let data_type_count = register_static_factories(&data_types)?;

        let loader = Arc::new(
            StaticModuleLoader::new().with_module(DIAGNOSTICS_MODULE, register_diagnostics),
        );
        let services = Arc::new(ServiceFactory::<dyn Component>::with_loader(loader.clone()));
        let component_count = register_static_components(&services)?;

        let mut manifests = builtin_manifests();
        if let Some(dir) = &config.module_dir {
            manifests.extend(ModuleManifest::load_dir(dir)?);
        }
        let unresolved = services.merge_manifests(&manifests)?;

        let osr = Arc::new(ObjectServiceRegistry::with_publisher(publisher.clone()));
        let channels = Arc::new(ChannelRegistry::with_publisher(publisher.clone()));
        let workers = Arc::new(WorkerRegistry::new()?);

        let deps = LifecycleDeps {
            osr: osr.clone(),
            services: services.clone(),
            workers: workers.clone(),
            channels: channels.clone(),
            publisher: Some(publisher),
        };
        let manager = LifecycleManager::new(deps, config.manager_settings())?;

        info!(
            data_types = data_type_count,
            components = component_count,
            manifests = manifests.len(),
            unresolved = unresolved.len(),
            "Application context ready"
        );

        Ok(Self {
            config,
            data_types,
            services,
            loader,
            osr,
            channels,
            workers,
            event_bus,
            manager,
            apps: Mutex::new(Vec::new()),
        })
    }

    /// Registries handed to lifecycle managers.
    #[must_use]
    pub fn deps(&self) -> LifecycleDeps {
        self.manager.deps().clone()
    }

    /// Launch `config` on a fresh configuration manager.
    pub fn launch(&self, config: &AppConfig, options: &LaunchOptions) -> RuntimeResult<Arc<AppConfigManager>> {
        let app = Arc::new(AppConfigManager::new(
            self.deps(),
            self.data_types.clone(),
            self.config.manager_settings(),
        )?);
        app.launch(config, options)?;
        self.apps.lock().push(app.clone());
        Ok(app)
    }

    pub fn launch_file(&self, path: &Path, options: &LaunchOptions) -> RuntimeResult<Arc<AppConfigManager>> {
        let config = AppConfig::from_file(path)?;
        self.launch(&config, options)
    }

    /// Launch the configuration named by `CONDUIT_APP_CONFIG`, if any.
    pub fn launch_configured(&self) -> RuntimeResult<Option<Arc<AppConfigManager>>> {
        match &self.config.app_config {
            Some(path) => self.launch_file(path, &LaunchOptions::default()).map(Some),
            None => {
                warn!("No application configuration set, nothing launched");
                Ok(None)
            }
        }
    }

    #[must_use]
    pub fn launched(&self) -> usize {
        self.apps.lock().len()
    }

    /// Destroy launched applications (newest first), then the root manager's
    /// components, then stop every worker.
    pub fn shutdown(&self) {
        let apps: Vec<Arc<AppConfigManager>> = self.apps.lock().drain(..).rev().collect();
        for app in apps {
            if let Err(e) = app.stop_and_destroy() {
                error!(error = %e, "Failed to destroy application");
            }
        }
        if let Err(e) = self.manager.destroy() {
            error!(error = %e, "Failed to destroy root components");
        }
        self.workers.stop_all();
        info!("Application context shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::{Integer, COUNTER, DOUBLER};
    use cd_04_lifecycle::COMPONENT_INTERFACE;
    use cd_06_data_lock::{downcast, DataValue};
    use serde_json::json;
    use shared_types::{ComponentId, GlobalStatus, ObjectId};
    use std::time::{Duration, Instant};

    fn context() -> AppContext {
        AppContext::new(RuntimeConfig::default()).unwrap()
    }

    const DOUBLING: &str = r#"{
        "objects": [
            { "uid": "number", "type": "conduit::Integer", "value": 21 },
            { "uid": "doubled", "type": "conduit::Integer", "deferred": true }
        ],
        "components": [
            { "uid": "doubler", "type": "conduit::Doubler", "auto_connect": true,
              "objects": [ { "key": "input", "uid": "number" },
                           { "key": "output", "uid": "doubled", "access": "out" } ] }
        ],
        "start": ["doubler"]
    }"#;

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn test_builtins_are_registered() {
        let ctx = context();
        assert!(ctx.services.supports(&Integer::TYPE, &COMPONENT_INTERFACE, DOUBLER));
        assert!(ctx.services.create(&COMPONENT_INTERFACE, COUNTER).unwrap().is_some());
        assert!(ctx.services.unresolved().is_empty());
        ctx.shutdown();
    }

    #[test]
    fn test_launch_doubling_graph() {
        let ctx = context();
        let config = AppConfig::from_json("doubling", DOUBLING).unwrap();
        let app = ctx.launch(&config, &LaunchOptions::default()).unwrap();

        let manager = app.manager();
        assert_eq!(manager.status(&ComponentId::new("doubler")), Some(GlobalStatus::Started));
        let doubled = manager.object(&ObjectId::new("doubled")).unwrap();
        assert_eq!(doubled.snapshot().unwrap(), json!(42));

        // an input change reaches the output through the auto-connection
        let number = downcast::<Integer>(&manager.object(&ObjectId::new("number")).unwrap()).unwrap();
        number.lock_exclusive().unwrap().0 = 5;
        number.notify_modified(None);
        assert!(wait_for(|| doubled.snapshot().unwrap() == json!(10)));

        drop(number);
        drop(doubled);
        ctx.shutdown();
        assert_eq!(ctx.launched(), 0);
    }

    #[test]
    fn test_invalid_runtime_config() {
        let config = RuntimeConfig {
            event_capacity: 0,
            ..RuntimeConfig::default()
        };
        assert!(AppContext::new(config).is_err());
    }

    #[test]
    fn test_module_dir_manifests_are_merged() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("remote.json"),
            r#"{ "id": "remote", "services": [ { "impl": "remote::Filter", "interface": "conduit::Component" } ] }"#,
        )
        .unwrap();
        let ctx = AppContext::new(RuntimeConfig {
            module_dir: Some(dir.path().to_path_buf()),
            ..RuntimeConfig::default()
        })
        .unwrap();
        assert!(ctx.services.descriptor("remote::Filter").is_some());
        assert!(ctx.services.create(&COMPONENT_INTERFACE, "remote::Filter").is_err());
        ctx.shutdown();
    }
}
