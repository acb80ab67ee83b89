//! Service layer: the lifecycle manager and configuration replay on top of it.

pub mod app;
pub mod manager;

pub use app::{AppConfigManager, LaunchOptions};
pub use manager::{AutoFlags, InputKind, LifecycleDeps, LifecycleManager, ManagerSettings};
