//! # Application Configuration Manager
//!
//! Replays an [`AppConfig`] into a running component graph.
//!
//! ```text
//! launch(config, options)
//!   1. ${name} substitution, optional <prefix>_ rewrite
//!   2. validation              ── any error: nothing was created
//!   3. build                   ── any error: everything created is rolled back
//!        objects → components → channels
//!   4. start_components()
//! ```
//!
//! `stop_and_destroy` reverses a launch, channels included.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use cd_01_factory_registry::FactoryRegistry;
use cd_05_connections::ConnectionError;
use cd_06_data_lock::{create_object, has_data_type};
use parking_lot::Mutex;
use shared_types::{Access, ComponentId, Endpoint, ObjectId, MAX_GROUP_INDEX};
use tracing::{debug, error, info, warn};

use crate::domain::{AppConfig, ChannelPlan};
use crate::error::{ConfigurationError, ConfigurationResult, LifecycleError, LifecycleResult};
use crate::service::manager::{AutoFlags, LifecycleDeps, LifecycleManager, ManagerSettings};

/// Per-launch rewrites.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Prefix applied to every locally declared uid.
    pub prefix: Option<String>,
    /// Overrides of the document's parameter defaults.
    pub parameters: BTreeMap<String, String>,
}

impl LaunchOptions {
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

/// One route attached to a channel during the build.
#[derive(Debug, Clone)]
enum Attachment {
    Signal { channel: String, endpoint: Endpoint },
    Slot { channel: String, endpoint: Endpoint },
    /// Signal of a data object, attached while the object exists.
    Proxy { channel: String, endpoint: Endpoint },
}

struct Launched {
    config: AppConfig,
    attachments: Vec<Attachment>,
}

/// Launches one application configuration on a private lifecycle manager.
pub struct AppConfigManager {
    manager: LifecycleManager,
    data_types: Arc<FactoryRegistry>,
    /// Names anonymous channels of unprefixed launches.
    instance: String,
    launched: Mutex<Option<Launched>>,
}

impl std::fmt::Debug for AppConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfigManager")
            .field("instance", &self.instance)
            .field("launched", &self.is_launched())
            .finish_non_exhaustive()
    }
}

impl AppConfigManager {
    pub fn new(
        deps: LifecycleDeps,
        data_types: Arc<FactoryRegistry>,
        settings: ManagerSettings,
    ) -> LifecycleResult<Self> {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Ok(Self {
            manager: LifecycleManager::new(deps, settings)?,
            data_types,
            instance: format!("app_{}", &suffix[..8]),
            launched: Mutex::new(None),
        })
    }

    /// The manager driving the launched graph. Inputs required from a parent
    /// configuration are declared here before launching.
    #[must_use]
    pub fn manager(&self) -> &LifecycleManager {
        &self.manager
    }

    #[must_use]
    pub fn is_launched(&self) -> bool {
        self.launched.lock().is_some()
    }

    /// The configuration as launched, after substitution and prefixing.
    #[must_use]
    pub fn config(&self) -> Option<AppConfig> {
        self.launched.lock().as_ref().map(|l| l.config.clone())
    }

    /// Validate, build and start `config`.
    pub fn launch(&self, config: &AppConfig, options: &LaunchOptions) -> ConfigurationResult<()> {
        let mut launched = self.launched.lock();
        if launched.is_some() {
            return Err(ConfigurationError::AlreadyLaunched);
        }

        let mut config = config.substitute(&options.parameters)?;
        if let Some(prefix) = &options.prefix {
            config = config.prefixed(prefix);
        }

        let plans = self.validate(&config).inspect_err(|e| {
            error!(error = %e, "Application configuration rejected");
        })?;

        let mut attachments = Vec::new();
        if let Err(e) = self.build(&config, &plans, &mut attachments) {
            error!(error = %e, "Application launch failed, rolling back");
            self.teardown(&attachments);
            return Err(e);
        }

        info!(
            objects = config.objects.len(),
            components = config.components.len(),
            channels = plans.len(),
            "Application launched"
        );
        *launched = Some(Launched {
            config,
            attachments,
        });
        Ok(())
    }

    /// Stop every component, detach channels and destroy the graph.
    pub fn stop_and_destroy(&self) -> LifecycleResult<()> {
        let Some(launched) = self.launched.lock().take() else {
            return Ok(());
        };
        self.manager.stop_components()?;
        self.detach(&launched.attachments);
        self.manager.destroy()?;
        info!(components = launched.config.components.len(), "Application destroyed");
        Ok(())
    }

    // =========================================================================
    // VALIDATION
    // =========================================================================

    fn validate(&self, config: &AppConfig) -> ConfigurationResult<Vec<ChannelPlan>> {
        let services = &self.manager.deps().services;

        let mut uids = BTreeSet::new();
        for uid in config
            .objects
            .iter()
            .map(|o| o.uid.as_str())
            .chain(config.components.iter().map(|c| c.uid.as_str()))
        {
            if !uids.insert(uid) {
                return Err(ConfigurationError::DuplicateUid(uid.to_string()));
            }
        }

        for object in config.objects.iter().filter(|o| !o.deferred) {
            if !has_data_type(&self.data_types, &object.type_tag) {
                return Err(ConfigurationError::UnknownDataType {
                    object: object.uid.clone(),
                    type_tag: object.type_tag.clone(),
                });
            }
        }

        for (directive, list) in [("start", &config.start), ("update", &config.update)] {
            if let Some(uid) = list.iter().find(|uid| config.component(uid).is_none()) {
                return Err(ConfigurationError::UndeclaredComponent {
                    directive,
                    uid: uid.clone(),
                });
            }
        }

        for component in &config.components {
            let descriptor = services.descriptor(&component.impl_id).ok_or_else(|| {
                ConfigurationError::UnknownImplementation {
                    component: component.uid.to_string(),
                    impl_id: component.impl_id.clone(),
                }
            })?;

            let oversized = component
                .objects
                .iter()
                .find_map(|s| s.index.filter(|&index| index > MAX_GROUP_INDEX).map(|index| (s, index)));
            if let Some((spec, index)) = oversized {
                return Err(ConfigurationError::GroupIndexOutOfRange {
                    component: component.uid.to_string(),
                    key: spec.key.clone(),
                    index,
                    max: MAX_GROUP_INDEX,
                });
            }

            for spec in component.objects.iter().filter(|s| s.access != Access::Output) {
                match config.object(&spec.uid) {
                    Some(object) => {
                        if !descriptor.objects.is_empty()
                            && !services.check_validity(&object.type_tag, &component.impl_id)
                        {
                            return Err(ConfigurationError::TypeMismatch {
                                component: component.uid.to_string(),
                                impl_id: component.impl_id.clone(),
                                object: object.uid.clone(),
                                type_tag: object.type_tag.clone(),
                            });
                        }
                    }
                    None if self.is_external(&spec.uid) => {}
                    None => {
                        return Err(ConfigurationError::UndeclaredObject {
                            component: component.uid.to_string(),
                            uid: spec.uid.clone(),
                        })
                    }
                }
            }
        }

        let plans = config.channel_plans(&format!("{}_channel", self.instance))?;
        for plan in &plans {
            for endpoint in &plan.slots {
                if config.component(endpoint.component.as_str()).is_none() {
                    return Err(ConfigurationError::UnknownEndpoint(endpoint.to_string()));
                }
            }
            for endpoint in &plan.signals {
                let uid = endpoint.component.as_str();
                if config.component(uid).is_none()
                    && config.object(uid).is_none()
                    && !self.is_external(uid)
                {
                    return Err(ConfigurationError::UnknownEndpoint(endpoint.to_string()));
                }
            }
        }
        debug!(channels = plans.len(), "Application configuration validated");
        Ok(plans)
    }

    /// An object the graph does not declare but can still reach: an
    /// application input, or an object already registered.
    fn is_external(&self, uid: &str) -> bool {
        let id = ObjectId::new(uid);
        self.manager.object(&id).is_some()
            || self.manager.deps().osr.object(&id).is_some()
            || self.manager.input_values().iter().any(|value| value == uid)
    }

    // =========================================================================
    // BUILD
    // =========================================================================

    fn build(
        &self,
        config: &AppConfig,
        plans: &[ChannelPlan],
        attachments: &mut Vec<Attachment>,
    ) -> ConfigurationResult<()> {
        self.manager.check_inputs()?;

        for object_config in config.objects.iter().filter(|o| !o.deferred) {
            let object = create_object(
                &self.data_types,
                &object_config.type_tag,
                ObjectId::new(object_config.uid.as_str()),
            )
            .ok_or_else(|| ConfigurationError::UnknownDataType {
                object: object_config.uid.clone(),
                type_tag: object_config.type_tag.clone(),
            })?;
            if let Some(value) = &object_config.value {
                object
                    .assign(value, None)
                    .map_err(|e| ConfigurationError::InitialValue {
                        object: object_config.uid.clone(),
                        reason: e.to_string(),
                    })?;
            }
            self.manager
                .add_object(object_config.uid.as_str(), object)?;
        }

        for component in &config.components {
            let uid = component.uid.as_str();
            let flags = AutoFlags {
                start: config.start.iter().any(|s| s == uid),
                update: config.update.iter().any(|s| s == uid),
            };
            self.manager.add_component(component.clone(), flags)?;
        }

        for plan in plans {
            self.attach(config, plan, attachments)?;
        }

        self.manager.start_components()?;
        Ok(())
    }

    fn attach(
        &self,
        config: &AppConfig,
        plan: &ChannelPlan,
        attachments: &mut Vec<Attachment>,
    ) -> LifecycleResult<()> {
        let channels = &self.manager.deps().channels;
        let channel = plan.name.clone();

        for endpoint in &plan.signals {
            if config.component(endpoint.component.as_str()).is_none() {
                self.manager.add_proxy(&channel, endpoint)?;
                attachments.push(Attachment::Proxy {
                    channel: channel.clone(),
                    endpoint: endpoint.clone(),
                });
                continue;
            }
            let signal = self
                .component(&endpoint.component)?
                .signal(&endpoint.member)
                .ok_or_else(|| ConnectionError::MissingSignal {
                    key: channel.clone(),
                    signal: endpoint.to_string(),
                })?;
            channels.connect_signal(&channel, endpoint.clone(), signal)?;
            attachments.push(Attachment::Signal {
                channel: channel.clone(),
                endpoint: endpoint.clone(),
            });
        }

        for endpoint in &plan.slots {
            let slot = self
                .component(&endpoint.component)?
                .slot(&endpoint.member)
                .ok_or_else(|| ConnectionError::MissingSlot {
                    key: channel.clone(),
                    slot: endpoint.to_string(),
                })?;
            channels.connect_slot(&channel, endpoint.clone(), slot)?;
            attachments.push(Attachment::Slot {
                channel: channel.clone(),
                endpoint: endpoint.clone(),
            });
        }
        debug!(channel = %channel, signals = plan.signals.len(), slots = plan.slots.len(), "Channel attached");
        Ok(())
    }

    fn component(&self, id: &ComponentId) -> LifecycleResult<Arc<crate::domain::ServiceHandle>> {
        self.manager
            .component(id)
            .ok_or_else(|| LifecycleError::UnknownComponent(id.clone()))
    }

    // =========================================================================
    // TEARDOWN
    // =========================================================================

    fn detach(&self, attachments: &[Attachment]) {
        let channels = &self.manager.deps().channels;
        for attachment in attachments.iter().rev() {
            let result = match attachment {
                Attachment::Signal { channel, endpoint } => channels.disconnect_signal(channel, endpoint),
                Attachment::Slot { channel, endpoint } => channels.disconnect_slot(channel, endpoint),
                Attachment::Proxy { channel, endpoint } => {
                    self.manager.remove_proxy(channel, endpoint);
                    Ok(())
                }
            };
            if let Err(e) = result {
                debug!(error = %e, "Channel route already gone");
            }
        }
    }

    /// Undo a partial build.
    fn teardown(&self, attachments: &[Attachment]) {
        if let Err(e) = self.manager.stop_components() {
            warn!(error = %e, "Stopping components during rollback failed");
        }
        self.detach(attachments);
        if let Err(e) = self.manager.destroy() {
            error!(error = %e, "Rollback left components behind");
        }
    }
}

impl Drop for AppConfigManager {
    fn drop(&mut self) {
        if self.launched.get_mut().is_some() {
            warn!(instance = %self.instance, "Application dropped while launched, destroying it");
            if let Err(e) = self.stop_and_destroy() {
                error!(error = %e, "Destroying the application on drop failed");
            }
        }
    }
}
