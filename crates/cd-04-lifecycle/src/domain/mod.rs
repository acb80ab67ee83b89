//! Domain layer of the lifecycle subsystem.

pub mod app_config;
pub mod config;
pub mod context;
pub mod handle;

pub use app_config::{AppConfig, ChannelPlan, ConnectionConfig, ObjectConfig};
pub use config::{ComponentConfig, ObjectSpec};
pub use context::ComponentContext;
pub use handle::{
    ServiceHandle, Transition, FAILURE_NOTIFIED, INFO_NOTIFIED, STANDARD_SIGNALS, STANDARD_SLOTS,
    STARTED, START_SLOT, STOPPED, STOP_SLOT, SUCCESS_NOTIFIED, SWAPPED, SWAP_KEY_SLOT, UPDATED,
    UPDATE_SLOT,
};
