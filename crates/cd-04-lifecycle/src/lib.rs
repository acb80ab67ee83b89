//! # cd-04-lifecycle
//!
//! Component lifecycle: every component is started, stopped and swapped
//! according to the objects bound to its keys.
//!
//! ## State Machine
//!
//! ```text
//! unconfigured ──configure()──→ configured
//!
//!             start()                 stop()
//!   Stopped ──────────→ Starting ──→ Started ──────────→ Stopping ──→ Stopped
//!      ↑                   │            │ swap(key)
//!      └──── failed ───────┘            └──→ Swapping ──→ Started
//! ```
//!
//! ## Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | `ports` | the [`Component`] trait implementations provide |
//! | `domain` | per-component configuration, context, service handles, application model |
//! | `service` | [`LifecycleManager`] and [`AppConfigManager`] |
//! | `registration` | link-time component registrations |
//!
//! ## Guarantees
//!
//! - A component with `auto_start` is started exactly when the manager is
//!   started and all of its mandatory keys (and group minimums) are bound.
//! - A started component is stopped before a mandatory key is unbound.
//! - A started component whose bound object changes identity is swapped.
//! - A failing transition never aborts its siblings or the manager.

pub mod domain;
pub mod error;
pub mod ports;
pub mod registration;
pub mod service;

pub use domain::{
    AppConfig, ChannelPlan, ComponentConfig, ComponentContext, ConnectionConfig, ObjectConfig,
    ObjectSpec, ServiceHandle, Transition, FAILURE_NOTIFIED, INFO_NOTIFIED, STANDARD_SIGNALS,
    STANDARD_SLOTS, STARTED, START_SLOT, STOPPED, STOP_SLOT, SUCCESS_NOTIFIED, SWAPPED,
    SWAP_KEY_SLOT, UPDATED, UPDATE_SLOT,
};
pub use error::{
    ComponentError, ComponentResult, ConfigurationError, ConfigurationResult, LifecycleError,
    LifecycleResult, TransitionError, TransitionResult,
};
pub use ports::{Component, COMPONENT_INTERFACE};
pub use registration::{register_static_components, ComponentRegistration};
pub use service::{
    AppConfigManager, AutoFlags, InputKind, LaunchOptions, LifecycleDeps, LifecycleManager,
    ManagerSettings,
};
