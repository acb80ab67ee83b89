//! # Service Handles
//!
//! A [`ServiceHandle`] wraps one component instance with its state machine,
//! standard signals and slots, auto-connections and worker.
//!
//! ## State Machine
//!
//! ```text
//! unconfigured ──configure──→ configured
//!
//!            start                    stop
//! stopped ──────────→ starting ──→ started ──────────→ stopping ──→ stopped
//!    ↑                   │ error      │ ↑ swap(key)        │ error
//!    └───────────────────┘            └─┘ (swapping)       └──→ started
//! ```
//!
//! | Transition | Allowed from | On error |
//! |------------|--------------|----------|
//! | `configure` | unconfigured (once) | unconfigured |
//! | `start` | stopped | stopped |
//! | `stop` | started | started, connections restored |
//! | `update` | started | started |
//! | `swap(key)` | started | started, key left disconnected |
//!
//! Transitions run on the component's worker and are reported through a
//! [`Transition`] handle; they never panic into the caller.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use cd_03_object_registry::ObjectServiceRegistry;
use cd_05_connections::{
    AutoConnections, Completion, ConnectionResult, JobError, KeyConnections, Message, Signal,
    Signals, Slot, Slots, Worker,
};
use conduit_telemetry::{
    log_event, metric_inc, record_transition_failure, COMPONENTS_STARTED, COMPONENTS_STOPPED,
    SWAPS,
};
use parking_lot::Mutex;
use serde_json::Value;
use shared_bus::{EventPublisher, RuntimeEvent};
use shared_types::{Access, ComponentId, ConfigurationStatus, GlobalStatus, Key, UpdatingStatus};
use tracing::{debug, warn};

use crate::domain::config::ComponentConfig;
use crate::domain::context::ComponentContext;
use crate::error::{ComponentResult, TransitionError, TransitionResult};
use crate::ports::Component;

// =============================================================================
// STANDARD SIGNALS AND SLOTS
// =============================================================================

pub const STARTED: &str = "started";
pub const UPDATED: &str = "updated";
pub const SWAPPED: &str = "swapped";
pub const STOPPED: &str = "stopped";
pub const INFO_NOTIFIED: &str = "info_notified";
pub const SUCCESS_NOTIFIED: &str = "success_notified";
pub const FAILURE_NOTIFIED: &str = "failure_notified";

pub const STANDARD_SIGNALS: [&str; 7] = [
    STARTED,
    UPDATED,
    SWAPPED,
    STOPPED,
    INFO_NOTIFIED,
    SUCCESS_NOTIFIED,
    FAILURE_NOTIFIED,
];

pub const START_SLOT: &str = "start";
pub const STOP_SLOT: &str = "stop";
pub const UPDATE_SLOT: &str = "update";
/// Payload: the key to swap, as `name` or `name#index`.
pub const SWAP_KEY_SLOT: &str = "swap_key";

pub const STANDARD_SLOTS: [&str; 4] = [START_SLOT, STOP_SLOT, UPDATE_SLOT, SWAP_KEY_SLOT];

// =============================================================================
// TRANSITION HANDLE
// =============================================================================

/// Pending result of one transition.
///
/// Wait on it with or without a timeout, or `.await` it. Dropping it does
/// not cancel the transition.
#[derive(Debug, Clone)]
pub struct Transition {
    component: ComponentId,
    name: &'static str,
    completion: Completion<TransitionResult>,
}

impl Transition {
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.completion.is_ready()
    }

    pub fn wait(&self) -> TransitionResult {
        flatten(self.completion.wait())
    }

    /// Like [`Transition::wait`], reporting [`TransitionError::Timeout`]
    /// when the transition is still running after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> TransitionResult {
        match self.completion.wait_timeout(timeout) {
            Some(result) => flatten(result),
            None => Err(TransitionError::Timeout {
                component: self.component.clone(),
                transition: self.name,
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

impl Future for Transition {
    type Output = TransitionResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.completion).poll(cx).map(flatten)
    }
}

fn flatten(result: Result<TransitionResult, JobError>) -> TransitionResult {
    result.map_err(TransitionError::from).and_then(|r| r)
}

// =============================================================================
// SERVICE HANDLE
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct Status {
    global: GlobalStatus,
    configuration: ConfigurationStatus,
    updating: UpdatingStatus,
}

struct HandleInner {
    config: ComponentConfig,
    component: Mutex<Box<dyn Component>>,
    status: Mutex<Status>,
    context: ComponentContext,
    signals: Arc<Signals>,
    slots: Slots,
    auto_connections: AutoConnections,
    key_connections: Mutex<KeyConnections>,
    osr: Arc<ObjectServiceRegistry>,
    worker: Arc<Worker>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

/// One managed component instance.
pub struct ServiceHandle {
    inner: Arc<HandleInner>,
}

impl ServiceHandle {
    /// Wrap `component`. Standard and component-declared slots are bound to
    /// `worker`; nothing runs until a transition is requested.
    pub fn new(
        config: ComponentConfig,
        component: Box<dyn Component>,
        osr: Arc<ObjectServiceRegistry>,
        worker: Arc<Worker>,
        publisher: Option<Arc<dyn EventPublisher>>,
    ) -> Arc<Self> {
        let signals = Arc::new(Signals::with_names(&STANDARD_SIGNALS));
        for name in component.signals() {
            signals.add(name);
        }
        let auto_connections = component.auto_connections();
        let extra_slots = component.slots();
        let context = ComponentContext::new(
            config.uid.clone(),
            osr.clone(),
            signals.clone(),
            config.output_ids(),
        );

        let inner = Arc::new_cyclic(|weak: &Weak<HandleInner>| {
            let slots = Slots::new();
            for name in STANDARD_SLOTS.iter().copied().chain(extra_slots) {
                let target = weak.clone();
                slots.add(Slot::new(
                    name,
                    Some(config.uid.clone()),
                    worker.clone(),
                    move |message| {
                        if let Some(inner) = target.upgrade() {
                            inner.on_slot(name, &message);
                        }
                    },
                ));
            }
            HandleInner {
                config,
                component: Mutex::new(component),
                status: Mutex::new(Status {
                    global: GlobalStatus::Stopped,
                    configuration: ConfigurationStatus::Unconfigured,
                    updating: UpdatingStatus::NotUpdating,
                }),
                context,
                signals,
                slots,
                auto_connections,
                key_connections: Mutex::new(KeyConnections::new()),
                osr,
                worker,
                publisher,
            }
        });
        Arc::new(Self { inner })
    }

    // =========================================================================
    // IDENTITY AND STATUS
    // =========================================================================

    #[must_use]
    pub fn id(&self) -> &ComponentId {
        &self.inner.config.uid
    }

    #[must_use]
    pub fn impl_id(&self) -> &str {
        &self.inner.config.impl_id
    }

    #[must_use]
    pub fn config(&self) -> &ComponentConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn worker(&self) -> &Arc<Worker> {
        &self.inner.worker
    }

    #[must_use]
    pub fn status(&self) -> GlobalStatus {
        self.inner.status.lock().global
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.status() == GlobalStatus::Started
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.status() == GlobalStatus::Stopped
    }

    #[must_use]
    pub fn configuration_status(&self) -> ConfigurationStatus {
        self.inner.status.lock().configuration
    }

    #[must_use]
    pub fn updating_status(&self) -> UpdatingStatus {
        self.inner.status.lock().updating
    }

    /// True when every mandatory key and every group minimum is bound in the
    /// object-service registry.
    #[must_use]
    pub fn has_all_required(&self) -> bool {
        let id = self.id();
        self.inner
            .config
            .has_all_required(|key| self.inner.osr.get_registered(id, key).is_some())
    }

    /// Like [`ServiceHandle::has_all_required`], as if `removed` were unbound.
    #[must_use]
    pub fn has_all_required_without(&self, removed: &Key) -> bool {
        let id = self.id();
        self.inner.config.has_all_required(|key| {
            key != removed && self.inner.osr.get_registered(id, key).is_some()
        })
    }

    // =========================================================================
    // SIGNALS, SLOTS, CONNECTIONS
    // =========================================================================

    #[must_use]
    pub fn signals(&self) -> &Signals {
        &self.inner.signals
    }

    #[must_use]
    pub fn signal(&self, name: &str) -> Option<Signal> {
        self.inner.signals.get(name)
    }

    #[must_use]
    pub fn slots(&self) -> &Slots {
        &self.inner.slots
    }

    #[must_use]
    pub fn slot(&self, name: &str) -> Option<Arc<Slot>> {
        self.inner.slots.get(name)
    }

    /// Live auto-connections of one key.
    #[must_use]
    pub fn live_connections(&self, key: &Key) -> usize {
        self.inner.key_connections.lock().live_count(key)
    }

    #[must_use]
    pub fn context(&self) -> &ComponentContext {
        &self.inner.context
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    pub fn configure(&self) -> Transition {
        self.post("configure", HandleInner::run_configure)
    }

    pub fn start(&self) -> Transition {
        self.post("start", HandleInner::run_start)
    }

    pub fn stop(&self) -> Transition {
        self.post("stop", HandleInner::run_stop)
    }

    pub fn update(&self) -> Transition {
        self.post("update", HandleInner::run_update)
    }

    pub fn swap(&self, key: &Key) -> Transition {
        let key = key.clone();
        self.post("swap", move |inner| inner.run_swap(&key))
    }

    fn post<F>(&self, name: &'static str, run: F) -> Transition
    where
        F: FnOnce(&HandleInner) -> TransitionResult + Send + 'static,
    {
        let inner = self.inner.clone();
        Transition {
            component: self.id().clone(),
            name,
            completion: self.inner.worker.post(move || run(&inner)),
        }
    }
}

impl std::fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("id", self.id())
            .field("impl_id", &self.impl_id())
            .field("status", &self.status())
            .finish()
    }
}

// =============================================================================
// TRANSITION BODIES (run on the component's worker)
// =============================================================================

impl HandleInner {
    fn id(&self) -> &ComponentId {
        &self.config.uid
    }

    fn run_configure(&self) -> TransitionResult {
        {
            let mut status = self.status.lock();
            if status.configuration != ConfigurationStatus::Unconfigured {
                return Err(TransitionError::Configuration {
                    component: self.id().clone(),
                    transition: "configure",
                    detail: "already done",
                });
            }
            status.configuration = ConfigurationStatus::Configuring;
        }
        let config = self.config.config.clone();
        match self.invoke(|component, _| component.configure(&config)) {
            Ok(()) => {
                self.status.lock().configuration = ConfigurationStatus::Configured;
                debug!(component = %self.id(), "Component configured");
                Ok(())
            }
            Err(reason) => {
                self.status.lock().configuration = ConfigurationStatus::Unconfigured;
                Err(self.failed("configure", reason))
            }
        }
    }

    fn run_start(&self) -> TransitionResult {
        {
            let mut status = self.status.lock();
            if status.configuration != ConfigurationStatus::Configured {
                return Err(TransitionError::Configuration {
                    component: self.id().clone(),
                    transition: "start",
                    detail: "not done",
                });
            }
            self.guard(&status, GlobalStatus::Stopped, "start")?;
            status.global = GlobalStatus::Starting;
        }
        self.publish_status(GlobalStatus::Starting);

        if let Err(reason) = self.invoke(|component, ctx| component.start(ctx)) {
            self.set_global(GlobalStatus::Stopped);
            return Err(self.failed("start", reason));
        }

        if let Err(source) = self.connect_all() {
            self.key_connections.lock().teardown_all();
            if let Err(reason) = self.invoke(|component, ctx| component.stop(ctx)) {
                warn!(component = %self.id(), reason = %reason, "Stop after failed auto-connection also failed");
            }
            self.set_global(GlobalStatus::Stopped);
            record_transition_failure("start");
            self.publish_failure("start", &source.to_string());
            return Err(TransitionError::Connection {
                component: self.id().clone(),
                source,
            });
        }

        self.set_global(GlobalStatus::Started);
        metric_inc!(COMPONENTS_STARTED);
        log_event!(info, self.id(), "Component started");
        self.emit(STARTED, Value::Null);
        Ok(())
    }

    fn run_stop(&self) -> TransitionResult {
        {
            let mut status = self.status.lock();
            self.guard(&status, GlobalStatus::Started, "stop")?;
            status.global = GlobalStatus::Stopping;
        }
        self.publish_status(GlobalStatus::Stopping);
        self.key_connections.lock().teardown_all();

        if let Err(reason) = self.invoke(|component, ctx| component.stop(ctx)) {
            if let Err(e) = self.connect_all() {
                warn!(component = %self.id(), error = %e, "Failed to restore connections after failed stop");
            }
            self.set_global(GlobalStatus::Started);
            return Err(self.failed("stop", reason));
        }

        self.set_global(GlobalStatus::Stopped);
        metric_inc!(COMPONENTS_STOPPED);
        log_event!(info, self.id(), "Component stopped");
        self.emit(STOPPED, Value::Null);
        Ok(())
    }

    fn run_update(&self) -> TransitionResult {
        {
            let mut status = self.status.lock();
            self.guard(&status, GlobalStatus::Started, "update")?;
            status.updating = UpdatingStatus::Updating;
        }
        let outcome = self.invoke(|component, ctx| component.update(ctx));
        self.status.lock().updating = UpdatingStatus::NotUpdating;

        match outcome {
            Ok(()) => {
                debug!(component = %self.id(), "Component updated");
                self.emit(UPDATED, Value::Null);
                Ok(())
            }
            Err(reason) => Err(self.failed("update", reason)),
        }
    }

    fn run_swap(&self, key: &Key) -> TransitionResult {
        {
            let mut status = self.status.lock();
            self.guard(&status, GlobalStatus::Started, "swap")?;
            status.global = GlobalStatus::Swapping;
        }
        self.key_connections.lock().teardown(key);

        let outcome = self.invoke(|component, ctx| component.swap(ctx, key));
        self.set_global(GlobalStatus::Started);
        if let Err(reason) = outcome {
            return Err(self.failed("swap", reason));
        }

        self.connect_key(key)
            .map_err(|source| TransitionError::Connection {
                component: self.id().clone(),
                source,
            })?;
        metric_inc!(SWAPS);
        log_event!(info, self.id(), "Key swapped", key = %key);
        self.emit(SWAPPED, Value::from(key.full_name()));
        Ok(())
    }

    fn on_slot(&self, slot: &'static str, message: &Message) {
        let result = match slot {
            START_SLOT => self.run_start(),
            STOP_SLOT => self.run_stop(),
            UPDATE_SLOT => self.run_update(),
            SWAP_KEY_SLOT => match message.as_str().map(str::parse::<Key>) {
                Some(Ok(key)) => self.run_swap(&key),
                _ => {
                    warn!(component = %self.id(), "swap_key slot needs a key payload");
                    return;
                }
            },
            other => self.run_receive(other, message),
        };
        if let Err(e) = result {
            warn!(component = %self.id(), slot, error = %e, "Slot invocation failed");
        }
    }

    fn run_receive(&self, slot: &str, message: &Message) -> TransitionResult {
        if self.status.lock().global != GlobalStatus::Started {
            debug!(component = %self.id(), slot, "Component not started, message discarded");
            return Ok(());
        }
        self.invoke(|component, ctx| component.receive(ctx, slot, message))
            .map_err(|reason| self.failed("receive", reason))
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    /// Run one extension point, turning errors and panics into a reason.
    fn invoke<F>(&self, body: F) -> Result<(), String>
    where
        F: FnOnce(&mut dyn Component, &ComponentContext) -> ComponentResult,
    {
        let mut component = self.component.lock();
        match panic::catch_unwind(AssertUnwindSafe(|| body(&mut **component, &self.context))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(payload) => Err(panic_reason(payload.as_ref())),
        }
    }

    fn guard(&self, status: &Status, expected: GlobalStatus, transition: &'static str) -> TransitionResult {
        if status.global == expected {
            Ok(())
        } else {
            Err(TransitionError::InvalidState {
                component: self.id().clone(),
                transition,
                status: status.global,
            })
        }
    }

    fn failed(&self, transition: &'static str, reason: String) -> TransitionError {
        record_transition_failure(transition);
        log_event!(error, self.id(), "Component transition failed", transition, reason = %reason);
        self.publish_failure(transition, &reason);
        TransitionError::Failed {
            component: self.id().clone(),
            transition,
            reason,
        }
    }

    fn set_global(&self, global: GlobalStatus) {
        self.status.lock().global = global;
        self.publish_status(global);
    }

    fn emit(&self, signal: &str, payload: Value) {
        self.signals
            .emit(signal, Message::from_component(self.id().clone(), payload));
    }

    fn publish_status(&self, status: GlobalStatus) {
        if let Some(publisher) = &self.publisher {
            publisher.publish(RuntimeEvent::StatusChanged {
                component: self.id().clone(),
                status,
            });
        }
    }

    fn publish_failure(&self, transition: &str, reason: &str) {
        if let Some(publisher) = &self.publisher {
            publisher.publish(RuntimeEvent::TransitionFailed {
                component: self.id().clone(),
                transition: transition.to_string(),
                reason: reason.to_string(),
            });
        }
    }

    /// Apply the auto-connection table to every auto-connected binding.
    fn connect_all(&self) -> ConnectionResult<usize> {
        let mut total = 0;
        let mut connections = self.key_connections.lock();
        for binding in self.osr.bindings(self.id()) {
            if !binding.auto_connect || !binding.access.is_consumed() {
                continue;
            }
            total += connections.rebind(
                &binding.key,
                Some(binding.object.signals()),
                &self.slots,
                &self.auto_connections,
                binding.optional,
            )?;
        }
        Ok(total)
    }

    fn connect_key(&self, key: &Key) -> ConnectionResult<usize> {
        let mut connections = self.key_connections.lock();
        match self.osr.get_binding(self.id(), key) {
            Some(binding) if binding.auto_connect && binding.access.is_consumed() => connections.rebind(
                key,
                Some(binding.object.signals()),
                &self.slots,
                &self.auto_connections,
                binding.optional,
            ),
            _ => {
                connections.teardown(key);
                Ok(0)
            }
        }
    }
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        for binding in self.osr.bindings(self.id()) {
            if binding.access == Access::Output {
                warn!(
                    component = %self.id(),
                    key = %binding.key,
                    object = %binding.object_id(),
                    "Output still registered when component was dropped"
                );
            }
        }
    }
}

fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        format!("panicked: {text}")
    } else if let Some(text) = payload.downcast_ref::<String>() {
        format!("panicked: {text}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cd_03_object_registry::BindingOptions;
    use cd_06_data_lock::{Data, DataValue, MODIFIED_SIGNAL};
    use crate::domain::config::ObjectSpec;
    use crate::error::ComponentError;
    use shared_types::TypeTag;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WAIT: Duration = Duration::from_secs(2);

    struct Value32(u32);

    impl DataValue for Value32 {
        const TYPE: TypeTag = TypeTag::from_static("test::Value32");
    }

    #[derive(Default)]
    struct Calls {
        start: AtomicUsize,
        stop: AtomicUsize,
        update: AtomicUsize,
        swap: AtomicUsize,
        receive: AtomicUsize,
    }

    struct Tracker {
        calls: Arc<Calls>,
        fail_start: bool,
        fail_stop: bool,
    }

    impl Component for Tracker {
        fn start(&mut self, _ctx: &ComponentContext) -> ComponentResult {
            self.calls.start.fetch_add(1, Ordering::SeqCst);
            if self.fail_start {
                return Err(ComponentError::failed("no device"));
            }
            Ok(())
        }

        fn stop(&mut self, _ctx: &ComponentContext) -> ComponentResult {
            self.calls.stop.fetch_add(1, Ordering::SeqCst);
            if self.fail_stop {
                return Err(ComponentError::failed("busy"));
            }
            Ok(())
        }

        fn update(&mut self, _ctx: &ComponentContext) -> ComponentResult {
            self.calls.update.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn swap(&mut self, _ctx: &ComponentContext, _key: &Key) -> ComponentResult {
            self.calls.swap.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn receive(&mut self, _ctx: &ComponentContext, slot: &str, _message: &Message) -> ComponentResult {
            assert_eq!(slot, "refresh");
            self.calls.receive.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn slots(&self) -> Vec<&'static str> {
            vec!["refresh"]
        }

        fn auto_connections(&self) -> AutoConnections {
            AutoConnections::new().with("input", MODIFIED_SIGNAL, "refresh")
        }
    }

    struct Panicky;

    impl Component for Panicky {
        fn start(&mut self, _ctx: &ComponentContext) -> ComponentResult {
            panic!("boom");
        }
        fn stop(&mut self, _ctx: &ComponentContext) -> ComponentResult {
            Ok(())
        }
        fn update(&mut self, _ctx: &ComponentContext) -> ComponentResult {
            Ok(())
        }
    }

    fn tracked(fail_start: bool, fail_stop: bool) -> (Arc<ServiceHandle>, Arc<Calls>, Arc<ObjectServiceRegistry>) {
        let calls = Arc::new(Calls::default());
        let osr = Arc::new(ObjectServiceRegistry::new());
        let worker = Arc::new(Worker::spawn("handle-test").unwrap());
        let config = ComponentConfig::new("tracked", "test::Tracker")
            .with_object(ObjectSpec::input("input", "value").auto_connect(true));
        let handle = ServiceHandle::new(
            config,
            Box::new(Tracker {
                calls: calls.clone(),
                fail_start,
                fail_stop,
            }),
            osr.clone(),
            worker,
            None,
        );
        handle.configure().wait_timeout(WAIT).unwrap();
        (handle, calls, osr)
    }

    fn bind(osr: &ObjectServiceRegistry, handle: &ServiceHandle, object: &Arc<Data<Value32>>) {
        osr.set_object(
            handle.id(),
            &Key::new("input"),
            Some(object.as_object()),
            BindingOptions::input().auto_connect(true),
        )
        .unwrap();
    }

    #[test]
    fn test_start_stop_cycle() {
        let (handle, calls, _) = tracked(false, false);
        assert!(handle.is_stopped());
        handle.start().wait_timeout(WAIT).unwrap();
        assert!(handle.is_started());
        handle.stop().wait_timeout(WAIT).unwrap();
        assert!(handle.is_stopped());
        assert_eq!(calls.start.load(Ordering::SeqCst), 1);
        assert_eq!(calls.stop.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guards() {
        let (handle, _, _) = tracked(false, false);
        assert!(matches!(
            handle.stop().wait_timeout(WAIT),
            Err(TransitionError::InvalidState { transition: "stop", .. })
        ));
        assert!(matches!(
            handle.update().wait_timeout(WAIT),
            Err(TransitionError::InvalidState { transition: "update", .. })
        ));
        handle.start().wait_timeout(WAIT).unwrap();
        assert!(matches!(
            handle.start().wait_timeout(WAIT),
            Err(TransitionError::InvalidState { transition: "start", .. })
        ));
    }

    #[test]
    fn test_configure_runs_once() {
        let (handle, _, _) = tracked(false, false);
        assert_eq!(handle.configuration_status(), ConfigurationStatus::Configured);
        assert!(matches!(
            handle.configure().wait_timeout(WAIT),
            Err(TransitionError::Configuration { .. })
        ));
    }

    #[test]
    fn test_failed_start_leaves_stopped() {
        let (handle, _, _) = tracked(true, false);
        assert!(matches!(
            handle.start().wait_timeout(WAIT),
            Err(TransitionError::Failed { transition: "start", .. })
        ));
        assert!(handle.is_stopped());
    }

    #[test]
    fn test_failed_stop_leaves_started() {
        let (handle, _, _) = tracked(false, true);
        handle.start().wait_timeout(WAIT).unwrap();
        assert!(handle.stop().wait_timeout(WAIT).is_err());
        assert!(handle.is_started());
    }

    #[test]
    fn test_panic_is_caught() {
        let osr = Arc::new(ObjectServiceRegistry::new());
        let worker = Arc::new(Worker::spawn("panicky").unwrap());
        let handle = ServiceHandle::new(
            ComponentConfig::new("panicky", "test::Panicky"),
            Box::new(Panicky),
            osr,
            worker,
            None,
        );
        handle.configure().wait().unwrap();
        let err = handle.start().wait_timeout(WAIT).unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert!(handle.is_stopped());
    }

    #[test]
    fn test_auto_connections_follow_lifecycle() {
        let (handle, calls, osr) = tracked(false, false);
        let value = Data::new("value", Value32(1));
        bind(&osr, &handle, &value);

        handle.start().wait_timeout(WAIT).unwrap();
        assert_eq!(handle.live_connections(&Key::new("input")), 1);

        value.notify_modified(None);
        handle.worker().post(|| ()).wait().unwrap();
        assert_eq!(calls.receive.load(Ordering::SeqCst), 1);

        handle.stop().wait_timeout(WAIT).unwrap();
        assert_eq!(handle.live_connections(&Key::new("input")), 0);
        value.notify_modified(None);
        handle.worker().post(|| ()).wait().unwrap();
        assert_eq!(calls.receive.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rebinding_keeps_one_live_connection() {
        let (handle, _, osr) = tracked(false, false);
        bind(&osr, &handle, &Data::new("value", Value32(0)));
        handle.start().wait_timeout(WAIT).unwrap();

        for i in 0..5 {
            bind(&osr, &handle, &Data::new("value", Value32(i)));
            handle.swap(&Key::new("input")).wait_timeout(WAIT).unwrap();
            assert_eq!(handle.live_connections(&Key::new("input")), 1);
        }
    }

    #[test]
    fn test_standard_slots_drive_transitions() {
        let (handle, calls, _) = tracked(false, false);
        handle.slot(START_SLOT).unwrap().deliver(Message::empty());
        handle.slot(UPDATE_SLOT).unwrap().deliver(Message::empty());
        handle.worker().post(|| ()).wait().unwrap();
        assert!(handle.is_started());
        assert_eq!(calls.update.load(Ordering::SeqCst), 1);

        handle
            .slot(SWAP_KEY_SLOT)
            .unwrap()
            .deliver(Message::new(Value::from("input")));
        handle.worker().post(|| ()).wait().unwrap();
        assert_eq!(calls.swap.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_requirements_follow_registry() {
        let (handle, _, osr) = tracked(false, false);
        assert!(!handle.has_all_required());
        bind(&osr, &handle, &Data::new("value", Value32(0)));
        assert!(handle.has_all_required());
        assert!(!handle.has_all_required_without(&Key::new("input")));
    }

    #[tokio::test]
    async fn test_transition_is_awaitable() {
        let (handle, _, _) = tracked(false, false);
        handle.start().await.unwrap();
        assert!(handle.is_started());
    }
}
