//! # cd-06-data-lock
//!
//! Lockable data objects shared between components.
//!
//! ## Locking Rules
//!
//! | Held | Shared request | Exclusive request |
//! |------|----------------|-------------------|
//! | nothing | granted | granted |
//! | N shared | granted | blocks until all release |
//! | 1 exclusive | blocks | blocks |
//!
//! Contention is never an error; bounded waits (`try_lock_*_for`) report
//! [`LockError::Timeout`]. Tokens release on drop.
//!
//! ## Buffers
//!
//! Buffer-backed values are pinned in memory by every live token. Touching
//! their bytes without a token is [`BufferError::NotLocked`]; the
//! [`BufferManager`] evicts unpinned buffers to temporary files and restores
//! them transparently on the next lock.

pub mod domain;
pub mod error;

pub use domain::{
    create_object, data_type_entry, downcast, has_data_type, Buffer, BufferManager, BufferPin,
    BufferStats, Data, DataObject, DataValue, ExclusiveToken, LockMode, ObjectRef, ObjectValue,
    SharedToken, WeakData, WeakObject, MODIFIED_SIGNAL,
};
pub use error::{BufferError, LockError, LockResult};
