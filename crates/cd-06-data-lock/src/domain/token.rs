//! Scoped lock tokens.
//!
//! A token holds the object's lock (and, for buffer-backed values, a pin)
//! for exactly its own lifetime. Release happens on drop, whatever the exit
//! path.

use std::fmt;
use std::ops::{Deref, DerefMut};

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::RawRwLock;
use shared_types::ObjectId;

use super::buffer::BufferPin;

/// Lock mode of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared => f.write_str("shared"),
            Self::Exclusive => f.write_str("exclusive"),
        }
    }
}

/// Read access to a data object's value.
pub struct SharedToken<T> {
    // Dropped before the pin: the lock is released first, then the buffer
    // becomes evictable again.
    guard: ArcRwLockReadGuard<RawRwLock, T>,
    _pin: Option<BufferPin>,
    object: ObjectId,
}

impl<T> SharedToken<T> {
    pub(crate) fn new(
        guard: ArcRwLockReadGuard<RawRwLock, T>,
        pin: Option<BufferPin>,
        object: ObjectId,
    ) -> Self {
        Self {
            guard,
            _pin: pin,
            object,
        }
    }

    #[must_use]
    pub fn object_id(&self) -> &ObjectId {
        &self.object
    }

    #[must_use]
    pub fn mode(&self) -> LockMode {
        LockMode::Shared
    }
}

impl<T> Deref for SharedToken<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedToken<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedToken")
            .field("object", &self.object)
            .field("value", &*self.guard)
            .finish()
    }
}

/// Read-write access to a data object's value.
pub struct ExclusiveToken<T> {
    guard: ArcRwLockWriteGuard<RawRwLock, T>,
    pin: Option<BufferPin>,
    object: ObjectId,
}

impl<T> ExclusiveToken<T> {
    pub(crate) fn new(
        guard: ArcRwLockWriteGuard<RawRwLock, T>,
        pin: Option<BufferPin>,
        object: ObjectId,
    ) -> Self {
        Self { guard, pin, object }
    }

    #[must_use]
    pub fn object_id(&self) -> &ObjectId {
        &self.object
    }

    #[must_use]
    pub fn mode(&self) -> LockMode {
        LockMode::Exclusive
    }

    /// Atomically turn exclusive access into shared access.
    #[must_use]
    pub fn downgrade(self) -> SharedToken<T> {
        let Self { guard, pin, object } = self;
        SharedToken::new(ArcRwLockWriteGuard::downgrade(guard), pin, object)
    }
}

impl<T> Deref for ExclusiveToken<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for ExclusiveToken<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T: fmt::Debug> fmt::Debug for ExclusiveToken<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusiveToken")
            .field("object", &self.object)
            .field("value", &*self.guard)
            .finish()
    }
}
