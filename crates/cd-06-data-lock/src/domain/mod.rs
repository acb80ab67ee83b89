//! Domain module for data objects and locking
//!
//! - object: data objects, typed access, weak references, data-type factory
//! - token: scoped shared/exclusive tokens
//! - buffer: evictable byte buffers and their manager

pub mod buffer;
pub mod object;
pub mod token;

pub use buffer::{Buffer, BufferManager, BufferPin, BufferStats};
pub use object::{
    create_object, data_type_entry, downcast, has_data_type, Data, DataObject, DataValue,
    ObjectRef, ObjectValue, WeakData, WeakObject, MODIFIED_SIGNAL,
};
pub use token::{ExclusiveToken, LockMode, SharedToken};
