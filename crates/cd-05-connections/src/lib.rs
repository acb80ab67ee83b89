//! # cd-05-connections
//!
//! Connection engine and execution model for the Conduit runtime.
//!
//! ## Overview
//!
//! - **Workers**: named FIFO queues on dedicated threads; every component
//!   runs its transitions and slots on exactly one worker
//! - **Completions**: future-like handles for posted work, with blocking
//!   waits, timeouts and `.await`
//! - **Signals / Slots**: named emitters and worker-bound receivers
//! - **Auto-connections**: per-key signal→slot tables rebuilt whenever the
//!   object behind a key changes
//! - **Channels**: named N:M routes between independently configured
//!   components
//!
//! ## Feedback Prevention
//!
//! | Mechanism | Scope |
//! |-----------|-------|
//! | [`BlockGuard`] | one connection, until the guard drops |
//! | `Message::no_echo` | slots owned by the message's origin |
//! | `Message::generation` | any message re-emitted more than [`MAX_GENERATION`] times |

pub mod domain;
pub mod error;
pub mod worker;

pub use domain::{
    AutoConnections, BlockGuard, ChannelRegistry, Connection, ConnectionSet, KeyConnections,
    Message, Signal, Signals, Slot, Slots, ANY_KEY, MAX_GENERATION,
};
pub use error::{ConnectionError, ConnectionResult, JobError, WorkerError};
pub use worker::{Completer, Completion, Worker, WorkerRegistry, DEFAULT_WORKER};
