//! # Signals, Slots and Connections
//!
//! ```text
//!   Signal ──route 1──→ Slot (worker A)
//!          ──route 2──→ Slot (worker B)
//! ```
//!
//! Emission walks a snapshot of the routes in connection order; each slot
//! enqueues its handler on its own worker, so delivery on one worker keeps
//! connection order.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use shared_types::ComponentId;
use tracing::{debug, trace};

use super::message::{Message, MAX_GENERATION};
use crate::worker::Worker;

type Handler = dyn Fn(Message) + Send + Sync;

// =============================================================================
// SLOT
// =============================================================================

/// A named receiver bound to one worker.
pub struct Slot {
    name: String,
    owner: Option<ComponentId>,
    worker: Arc<Worker>,
    handler: Arc<Handler>,
}

impl Slot {
    pub fn new<F>(
        name: impl Into<String>,
        owner: Option<ComponentId>,
        worker: Arc<Worker>,
        handler: F,
    ) -> Arc<Self>
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        Arc::new(Self {
            name: name.into(),
            owner,
            worker,
            handler: Arc::new(handler),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn owner(&self) -> Option<&ComponentId> {
        self.owner.as_ref()
    }

    /// Queue the handler on the slot's worker, behind work already queued
    /// there. Echoes of the owner's own messages are dropped here.
    pub fn deliver(&self, message: Message) {
        if message.is_echo_for(self.owner.as_ref()) {
            trace!(slot = %self.name, "Echo suppressed");
            return;
        }
        let handler = self.handler.clone();
        if !self.worker.defer(move || handler(message)) {
            debug!(slot = %self.name, worker = %self.worker.name(), "Slot worker stopped, message dropped");
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("worker", &self.worker.name())
            .finish()
    }
}

// =============================================================================
// SIGNAL
// =============================================================================

struct Route {
    id: u64,
    slot: Arc<Slot>,
    blocked: Arc<AtomicUsize>,
}

struct SignalInner {
    name: String,
    routes: RwLock<Vec<Route>>,
    next_id: AtomicU64,
}

/// A named emitter. Cloning shares the same routes.
#[derive(Clone)]
pub struct Signal {
    inner: Arc<SignalInner>,
}

impl Signal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                name: name.into(),
                routes: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Connect a slot; the returned handle disconnects it.
    pub fn connect(&self, slot: Arc<Slot>) -> Connection {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let blocked = Arc::new(AtomicUsize::new(0));
        debug!(signal = %self.inner.name, slot = %slot.name(), "Connected");
        self.inner.routes.write().push(Route {
            id,
            slot,
            blocked: blocked.clone(),
        });
        Connection {
            signal: Arc::downgrade(&self.inner),
            id,
            blocked,
        }
    }

    /// Deliver `message` to every unblocked route, in connection order.
    ///
    /// Returns the number of slots the message was handed to.
    pub fn emit(&self, message: Message) -> usize {
        if message.generation > MAX_GENERATION {
            debug!(signal = %self.inner.name, generation = message.generation, "Message dropped: generation limit");
            return 0;
        }
        let targets: Vec<Arc<Slot>> = self
            .inner
            .routes
            .read()
            .iter()
            .filter(|route| route.blocked.load(Ordering::Acquire) == 0)
            .map(|route| route.slot.clone())
            .collect();
        let count = targets.len();
        for slot in targets {
            slot.deliver(message.clone());
        }
        count
    }

    /// Number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.routes.read().len()
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.inner.name)
            .field("connections", &self.connection_count())
            .finish()
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

/// Handle to one signal-to-slot route.
///
/// Dropping the handle leaves the route in place; call [`Connection::disconnect`].
#[derive(Debug)]
pub struct Connection {
    signal: Weak<SignalInner>,
    id: u64,
    blocked: Arc<AtomicUsize>,
}

impl Connection {
    /// Remove the route. Idempotent.
    pub fn disconnect(&self) {
        if let Some(signal) = self.signal.upgrade() {
            let mut routes = signal.routes.write();
            let before = routes.len();
            routes.retain(|route| route.id != self.id);
            if routes.len() != before {
                debug!(signal = %signal.name, "Disconnected");
            }
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.signal
            .upgrade()
            .is_some_and(|signal| signal.routes.read().iter().any(|r| r.id == self.id))
    }

    /// Suppress delivery on this route until the guard is dropped.
    #[must_use]
    pub fn block(&self) -> BlockGuard {
        self.blocked.fetch_add(1, Ordering::AcqRel);
        BlockGuard {
            blocked: self.blocked.clone(),
        }
    }

    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::Acquire) > 0
    }
}

/// Scoped connection blocker; unblocks on drop.
#[derive(Debug)]
pub struct BlockGuard {
    blocked: Arc<AtomicUsize>,
}

impl Drop for BlockGuard {
    fn drop(&mut self) {
        self.blocked.fetch_sub(1, Ordering::AcqRel);
    }
}

/// An owned group of connections torn down together.
#[derive(Debug, Default)]
pub struct ConnectionSet {
    connections: Vec<Connection>,
}

impl ConnectionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, connection: Connection) {
        self.connections.push(connection);
    }

    /// Disconnect every connection and empty the set.
    pub fn disconnect_all(&mut self) {
        for connection in self.connections.drain(..) {
            connection.disconnect();
        }
    }

    /// Block every connection in the set for the guard's lifetime.
    #[must_use]
    pub fn block_all(&self) -> Vec<BlockGuard> {
        self.connections.iter().map(Connection::block).collect()
    }

    /// Connections still attached to a live signal.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.connections.iter().filter(|c| c.is_connected()).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

// =============================================================================
// NAMED COLLECTIONS
// =============================================================================

/// The signals an object or component exposes, by name.
#[derive(Debug, Default)]
pub struct Signals {
    map: RwLock<BTreeMap<String, Signal>>,
}

impl Signals {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set holding the given signal names.
    #[must_use]
    pub fn with_names(names: &[&str]) -> Self {
        let signals = Self::new();
        for name in names {
            signals.add(name);
        }
        signals
    }

    /// Register a signal, returning the existing one if the name is taken.
    pub fn add(&self, name: &str) -> Signal {
        self.map
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Signal::new(name))
            .clone()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Signal> {
        self.map.read().get(name).cloned()
    }

    /// Emit on the named signal; unknown names deliver nowhere.
    pub fn emit(&self, name: &str, message: Message) -> usize {
        self.get(name).map_or(0, |signal| signal.emit(message))
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.map.read().keys().cloned().collect()
    }
}

/// The slots a component exposes, by name.
#[derive(Debug, Default)]
pub struct Slots {
    map: RwLock<BTreeMap<String, Arc<Slot>>>,
}

impl Slots {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slot, replacing any slot of the same name.
    pub fn add(&self, slot: Arc<Slot>) {
        self.map.write().insert(slot.name().to_string(), slot);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Slot>> {
        self.map.read().get(name).cloned()
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.map.read().keys().cloned().collect()
    }
}
