//! # Evictable Buffers
//!
//! A [`Buffer`] holds raw bytes that the [`BufferManager`] may move out to a
//! temporary file while nobody uses them. Lock tokens pin the buffer:
//!
//! ```text
//!   Loaded ──dump (pins == 0)──→ Dumped
//!     ↑                            │
//!     └──────── pin (restore) ─────┘
//! ```
//!
//! Byte access without a pin is [`BufferError::NotLocked`].

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use shared_types::TypeTag;
use tracing::{debug, warn};

use super::object::DataValue;
use crate::error::BufferError;

enum BufferState {
    Loaded(Vec<u8>),
    Dumped { file: File, len: usize },
}

struct BufferInner {
    state: Mutex<BufferState>,
    // Incremented only under `state`, so a dump never races a pin.
    pins: AtomicUsize,
}

impl BufferInner {
    fn restore(state: &mut BufferState) -> Result<(), BufferError> {
        if let BufferState::Dumped { file, len } = state {
            let expected = *len;
            let bytes = read_dump(file, expected)?;
            *state = BufferState::Loaded(bytes);
            debug!(len = expected, "Buffer restored");
        }
        Ok(())
    }
}

fn read_dump(file: &mut File, expected: usize) -> Result<Vec<u8>, BufferError> {
    file.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::with_capacity(expected);
    file.read_to_end(&mut bytes)?;
    if bytes.len() != expected {
        return Err(BufferError::Corrupt {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(bytes)
}

/// Raw bytes that can be evicted to disk when unpinned.
///
/// Not `Clone`: a copy through a shared token must not alias the storage
/// other readers see. Use [`Buffer::try_clone`] for an independent copy.
pub struct Buffer {
    inner: Arc<BufferInner>,
}

impl Buffer {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            inner: Arc::new(BufferInner {
                state: Mutex::new(BufferState::Loaded(bytes)),
                pins: AtomicUsize::new(0),
            }),
        }
    }

    #[must_use]
    pub fn zeroed(len: usize) -> Self {
        Self::new(vec![0; len])
    }

    /// Size in bytes, whether loaded or dumped.
    #[must_use]
    pub fn len(&self) -> usize {
        match &*self.inner.state.lock() {
            BufferState::Loaded(bytes) => bytes.len(),
            BufferState::Dumped { len, .. } => *len,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(&*self.inner.state.lock(), BufferState::Loaded(_))
    }

    #[must_use]
    pub fn is_pinned(&self) -> bool {
        self.inner.pins.load(Ordering::Acquire) > 0
    }

    /// Pin the buffer in memory, restoring it first if it was dumped.
    pub fn pin(&self) -> Result<BufferPin, BufferError> {
        let mut state = self.inner.state.lock();
        BufferInner::restore(&mut state)?;
        self.inner.pins.fetch_add(1, Ordering::AcqRel);
        Ok(BufferPin {
            inner: self.inner.clone(),
        })
    }

    /// Deep copy into fresh, unpinned, untracked storage. A dumped buffer is
    /// read from its file and stays dumped.
    pub fn try_clone(&self) -> Result<Self, BufferError> {
        let mut state = self.inner.state.lock();
        let bytes = match &mut *state {
            BufferState::Loaded(bytes) => bytes.clone(),
            BufferState::Dumped { file, len } => read_dump(file, *len)?,
        };
        Ok(Self::new(bytes))
    }

    /// Read the bytes. Requires a live pin.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R, BufferError> {
        if !self.is_pinned() {
            return Err(BufferError::NotLocked);
        }
        match &*self.inner.state.lock() {
            BufferState::Loaded(bytes) => Ok(f(bytes)),
            BufferState::Dumped { .. } => Err(BufferError::NotLocked),
        }
    }

    /// Modify the bytes. Requires a live pin and exclusive access.
    pub fn with_bytes_mut<R>(&mut self, f: impl FnOnce(&mut Vec<u8>) -> R) -> Result<R, BufferError> {
        if !self.is_pinned() {
            return Err(BufferError::NotLocked);
        }
        match &mut *self.inner.state.lock() {
            BufferState::Loaded(bytes) => Ok(f(bytes)),
            BufferState::Dumped { .. } => Err(BufferError::NotLocked),
        }
    }

    fn dump_to(&self, dir: Option<&PathBuf>) -> Result<bool, BufferError> {
        let mut state = self.inner.state.lock();
        if self.inner.pins.load(Ordering::Acquire) > 0 {
            return Ok(false);
        }
        let BufferState::Loaded(bytes) = &*state else {
            return Ok(true);
        };
        let mut file = match dir {
            Some(dir) => tempfile::tempfile_in(dir)?,
            None => tempfile::tempfile()?,
        };
        file.write_all(bytes)?;
        file.flush()?;
        let len = bytes.len();
        *state = BufferState::Dumped { file, len };
        debug!(len, "Buffer dumped");
        Ok(true)
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.len())
            .field("loaded", &self.is_loaded())
            .field("pinned", &self.is_pinned())
            .finish()
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl DataValue for Buffer {
    const TYPE: TypeTag = TypeTag::from_static("conduit::Buffer");

    fn pin(&self) -> Result<Option<BufferPin>, BufferError> {
        Buffer::pin(self).map(Some)
    }

    fn to_json(&self) -> Value {
        self.with_bytes(|bytes| Value::from(bytes.to_vec()))
            .unwrap_or(Value::Null)
    }

    fn assign_json(&mut self, value: &Value) -> Result<(), String> {
        let bytes = value
            .as_array()
            .ok_or_else(|| "expected an array of bytes".to_string())?
            .iter()
            .map(|v| {
                v.as_u64()
                    .and_then(|b| u8::try_from(b).ok())
                    .ok_or_else(|| format!("not a byte: {}", v))
            })
            .collect::<Result<Vec<u8>, String>>()?;
        self.with_bytes_mut(|current| *current = bytes)
            .map_err(|e| e.to_string())
    }
}

/// Keeps a buffer resident. Dropping it releases the pin.
pub struct BufferPin {
    inner: Arc<BufferInner>,
}

impl Drop for BufferPin {
    fn drop(&mut self) {
        self.inner.pins.fetch_sub(1, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for BufferPin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPin").finish_non_exhaustive()
    }
}

/// Snapshot of the buffers a manager tracks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub loaded: usize,
    pub dumped: usize,
    pub pinned: usize,
    pub loaded_bytes: usize,
}

/// Tracks buffers weakly and evicts unpinned ones on request.
#[derive(Default)]
pub struct BufferManager {
    buffers: Mutex<Vec<Weak<BufferInner>>>,
    dir: Option<PathBuf>,
}

impl BufferManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write dumps into `dir` instead of the system temporary directory.
    #[must_use]
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            buffers: Mutex::new(Vec::new()),
            dir: Some(dir.into()),
        }
    }

    /// Start tracking a buffer. Tracking never keeps it alive.
    pub fn track(&self, buffer: &Buffer) {
        let mut buffers = self.buffers.lock();
        buffers.retain(|w| w.strong_count() > 0);
        if !buffers.iter().any(|w| w.as_ptr() == Arc::as_ptr(&buffer.inner)) {
            buffers.push(Arc::downgrade(&buffer.inner));
        }
    }

    /// Evict one buffer. Returns false when it is pinned.
    pub fn dump(&self, buffer: &Buffer) -> Result<bool, BufferError> {
        self.track(buffer);
        buffer.dump_to(self.dir.as_ref())
    }

    /// Evict every unpinned tracked buffer; returns how many were dumped.
    pub fn dump_unpinned(&self) -> Result<usize, BufferError> {
        let mut dumped = 0;
        for buffer in self.live() {
            if buffer.is_loaded() && buffer.dump_to(self.dir.as_ref())? {
                dumped += 1;
            }
        }
        if dumped > 0 {
            debug!(dumped, "Unpinned buffers dumped");
        }
        Ok(dumped)
    }

    /// Restore every dumped buffer into memory.
    pub fn restore_all(&self) -> Result<usize, BufferError> {
        let mut restored = 0;
        for buffer in self.live() {
            if !buffer.is_loaded() {
                drop(buffer.pin()?);
                restored += 1;
            }
        }
        Ok(restored)
    }

    #[must_use]
    pub fn stats(&self) -> BufferStats {
        let mut stats = BufferStats::default();
        for buffer in self.live() {
            if buffer.is_pinned() {
                stats.pinned += 1;
            }
            match &*buffer.inner.state.lock() {
                BufferState::Loaded(bytes) => {
                    stats.loaded += 1;
                    stats.loaded_bytes += bytes.len();
                }
                BufferState::Dumped { .. } => stats.dumped += 1,
            }
        }
        stats
    }

    fn live(&self) -> Vec<Buffer> {
        let mut buffers = self.buffers.lock();
        buffers.retain(|w| w.strong_count() > 0);
        buffers
            .iter()
            .filter_map(Weak::upgrade)
            .map(|inner| Buffer { inner })
            .collect()
    }
}

impl Drop for BufferManager {
    fn drop(&mut self) {
        if let Err(e) = self.restore_all() {
            warn!(error = %e, "Failed to restore buffers on manager shutdown");
        }
    }
}
