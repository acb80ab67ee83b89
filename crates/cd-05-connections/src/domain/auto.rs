//! # Key-Driven Auto-Connections
//!
//! A component declares, per binding key, which signal of the bound object
//! drives which of its own slots. Every time the object behind a key
//! changes, the old routes for that key are torn down and new ones built.
//!
//! ```text
//!   key "image" ─→ [("modified", "update"), ("buffer_modified", "update_buffer")]
//! ```

use std::collections::{BTreeMap, HashMap};

use shared_types::Key;
use tracing::debug;

use super::signal::{ConnectionSet, Signals, Slots};
use crate::error::{ConnectionError, ConnectionResult};

/// Key name used for connections that apply to every bound key.
pub const ANY_KEY: &str = "*";

/// Static table: key name → list of (signal, slot).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoConnections {
    entries: BTreeMap<String, Vec<(String, String)>>,
}

impl AutoConnections {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion.
    #[must_use]
    pub fn with(mut self, key: &str, signal: &str, slot: &str) -> Self {
        self.push(key, signal, slot);
        self
    }

    pub fn push(&mut self, key: &str, signal: &str, slot: &str) {
        self.entries
            .entry(key.to_string())
            .or_default()
            .push((signal.to_string(), slot.to_string()));
    }

    /// Routes for a key name, falling back to the `*` entry.
    #[must_use]
    pub fn for_key(&self, key: &str) -> &[(String, String)] {
        self.entries
            .get(key)
            .or_else(|| self.entries.get(ANY_KEY))
            .map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Live auto-connections of one component, per full binding key.
#[derive(Debug, Default)]
pub struct KeyConnections {
    by_key: HashMap<Key, ConnectionSet>,
}

impl KeyConnections {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tear down the routes of `key` and, when an object is bound, connect
    /// its signals to the component's slots per `table`.
    ///
    /// A missing signal or slot fails the whole rebind (leaving no route for
    /// the key) unless the binding is optional, in which case the route is
    /// skipped.
    pub fn rebind(
        &mut self,
        key: &Key,
        object_signals: Option<&Signals>,
        slots: &Slots,
        table: &AutoConnections,
        optional: bool,
    ) -> ConnectionResult<usize> {
        self.teardown(key);

        let Some(object_signals) = object_signals else {
            return Ok(0);
        };

        let mut set = ConnectionSet::new();
        for (signal_name, slot_name) in table.for_key(key.name()) {
            let signal = match object_signals.get(signal_name) {
                Some(signal) => signal,
                None if optional => {
                    debug!(key = %key, signal = %signal_name, "Optional key: signal missing, route skipped");
                    continue;
                }
                None => {
                    set.disconnect_all();
                    return Err(ConnectionError::MissingSignal {
                        key: key.full_name(),
                        signal: signal_name.clone(),
                    });
                }
            };
            let slot = match slots.get(slot_name) {
                Some(slot) => slot,
                None if optional => {
                    debug!(key = %key, slot = %slot_name, "Optional key: slot missing, route skipped");
                    continue;
                }
                None => {
                    set.disconnect_all();
                    return Err(ConnectionError::MissingSlot {
                        key: key.full_name(),
                        slot: slot_name.clone(),
                    });
                }
            };
            set.push(signal.connect(slot));
        }

        let count = set.len();
        if count > 0 {
            self.by_key.insert(key.clone(), set);
        }
        Ok(count)
    }

    /// Disconnect the routes of one key.
    pub fn teardown(&mut self, key: &Key) {
        if let Some(mut set) = self.by_key.remove(key) {
            set.disconnect_all();
        }
    }

    /// Disconnect every route.
    pub fn teardown_all(&mut self) {
        for (_, mut set) in self.by_key.drain() {
            set.disconnect_all();
        }
    }

    /// Live routes for a key.
    #[must_use]
    pub fn live_count(&self, key: &Key) -> usize {
        self.by_key.get(key).map_or(0, ConnectionSet::live_count)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.by_key.values().map(ConnectionSet::live_count).sum()
    }
}

impl Drop for KeyConnections {
    fn drop(&mut self) {
        self.teardown_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::Message;
    use crate::domain::signal::Slot;
    use crate::worker::Worker;
    use std::sync::Arc;

    fn component_slots(worker: &Arc<Worker>) -> Slots {
        let slots = Slots::new();
        slots.add(Slot::new("update", None, worker.clone(), |_m: Message| {}));
        slots
    }

    #[test]
    fn test_table_falls_back_to_any_key() {
        let table = AutoConnections::new()
            .with("image", "modified", "update")
            .with(ANY_KEY, "changed", "refresh");
        assert_eq!(table.for_key("image").len(), 1);
        assert_eq!(table.for_key("other")[0].0, "changed");
        assert!(AutoConnections::new().for_key("x").is_empty());
    }

    #[test]
    fn test_rebind_replaces_previous_routes() {
        let worker = Arc::new(Worker::spawn("rebind").unwrap());
        let slots = component_slots(&worker);
        let table = AutoConnections::new().with("input", "modified", "update");
        let key = Key::new("input");
        let mut connections = KeyConnections::new();

        let first = Signals::with_names(&["modified"]);
        let second = Signals::with_names(&["modified"]);

        connections.rebind(&key, Some(&first), &slots, &table, false).unwrap();
        assert_eq!(connections.live_count(&key), 1);

        connections.rebind(&key, Some(&second), &slots, &table, false).unwrap();
        assert_eq!(connections.live_count(&key), 1);
        assert_eq!(first.get("modified").unwrap().connection_count(), 0);
        assert_eq!(second.get("modified").unwrap().connection_count(), 1);

        connections.rebind(&key, None, &slots, &table, false).unwrap();
        assert_eq!(connections.live_count(&key), 0);
    }

    #[test]
    fn test_missing_signal_is_error_unless_optional() {
        let worker = Arc::new(Worker::spawn("missing").unwrap());
        let slots = component_slots(&worker);
        let table = AutoConnections::new()
            .with("input", "modified", "update")
            .with("input", "resized", "update");
        let key = Key::new("input");
        let object = Signals::with_names(&["modified"]);
        let mut connections = KeyConnections::new();

        let err = connections
            .rebind(&key, Some(&object), &slots, &table, false)
            .unwrap_err();
        assert!(matches!(err, ConnectionError::MissingSignal { .. }));
        assert_eq!(object.get("modified").unwrap().connection_count(), 0);

        let count = connections
            .rebind(&key, Some(&object), &slots, &table, true)
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_missing_slot_is_error() {
        let worker = Arc::new(Worker::spawn("missing-slot").unwrap());
        let slots = component_slots(&worker);
        let table = AutoConnections::new().with("input", "modified", "repaint");
        let object = Signals::with_names(&["modified"]);
        let mut connections = KeyConnections::new();

        let err = connections
            .rebind(&Key::new("input"), Some(&object), &slots, &table, false)
            .unwrap_err();
        assert_eq!(
            err,
            ConnectionError::MissingSlot {
                key: "input".into(),
                slot: "repaint".into()
            }
        );
    }
}
