//! # Shared Bus - Runtime Notification Bus
//!
//! Broadcasts the observable notifications of the Conduit runtime to any
//! number of subscribers.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Object Reg.  │                    │  Observer    │
//! │ Lifecycle    │    publish()       │  (tests,     │
//! │ Connections  │ ──────┐            │   tooling)   │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! The bus is observational: runtime control flow never depends on a
//! subscriber receiving an event.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{EventFilter, EventTopic, RuntimeEvent};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, EventSubscriber, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
