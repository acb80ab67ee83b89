//! # Channels
//!
//! A channel is a named N:M route: every signal attached to it drives every
//! slot attached to it. Components configured independently can meet on a
//! channel without knowing each other.
//!
//! ```text
//!   a/modified ─┐                 ┌─→ c/update
//!               ├──[ channel X ]──┤
//!   b/modified ─┘                 └─→ d/refresh
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use shared_bus::{EventPublisher, RuntimeEvent};
use shared_types::Endpoint;
use tracing::{debug, info};

use super::signal::{Connection, Signal, Slot};
use crate::error::{ConnectionError, ConnectionResult};

#[derive(Default)]
struct Channel {
    signals: Vec<(Endpoint, Signal)>,
    slots: Vec<(Endpoint, Arc<Slot>)>,
    // (signal endpoint, slot endpoint) → route
    routes: Vec<(Endpoint, Endpoint, Connection)>,
}

impl Channel {
    fn disconnect_where(&mut self, predicate: impl Fn(&Endpoint, &Endpoint) -> bool) {
        self.routes.retain(|(signal, slot, connection)| {
            if predicate(signal, slot) {
                connection.disconnect();
                false
            } else {
                true
            }
        });
    }

    fn is_empty(&self) -> bool {
        self.signals.is_empty() && self.slots.is_empty()
    }
}

/// Owns every channel of an application.
pub struct ChannelRegistry {
    channels: Mutex<BTreeMap<String, Channel>>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl ChannelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(BTreeMap::new()),
            publisher: None,
        }
    }

    /// Publish `ChannelChanged` events on the given bus.
    #[must_use]
    pub fn with_publisher(publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            channels: Mutex::new(BTreeMap::new()),
            publisher: Some(publisher),
        }
    }

    /// Attach a signal; it is connected to every slot already on the channel.
    pub fn connect_signal(
        &self,
        channel: &str,
        endpoint: Endpoint,
        signal: Signal,
    ) -> ConnectionResult<()> {
        {
            let mut channels = self.channels.lock();
            let entry = channels.entry(channel.to_string()).or_default();
            if entry.signals.iter().any(|(e, _)| *e == endpoint) {
                return Err(ConnectionError::DuplicateEndpoint {
                    channel: channel.to_string(),
                    endpoint: endpoint.to_string(),
                });
            }
            let new_routes: Vec<_> = entry
                .slots
                .iter()
                .map(|(slot_endpoint, slot)| {
                    (endpoint.clone(), slot_endpoint.clone(), signal.connect(slot.clone()))
                })
                .collect();
            entry.routes.extend(new_routes);
            entry.signals.push((endpoint.clone(), signal));
        }
        debug!(channel = %channel, signal = %endpoint, "Signal attached to channel");
        self.notify(channel, &endpoint, true);
        Ok(())
    }

    /// Attach a slot; every signal already on the channel is connected to it.
    pub fn connect_slot(
        &self,
        channel: &str,
        endpoint: Endpoint,
        slot: Arc<Slot>,
    ) -> ConnectionResult<()> {
        {
            let mut channels = self.channels.lock();
            let entry = channels.entry(channel.to_string()).or_default();
            if entry.slots.iter().any(|(e, _)| *e == endpoint) {
                return Err(ConnectionError::DuplicateEndpoint {
                    channel: channel.to_string(),
                    endpoint: endpoint.to_string(),
                });
            }
            let new_routes: Vec<_> = entry
                .signals
                .iter()
                .map(|(signal_endpoint, signal)| {
                    (signal_endpoint.clone(), endpoint.clone(), signal.connect(slot.clone()))
                })
                .collect();
            entry.routes.extend(new_routes);
            entry.slots.push((endpoint.clone(), slot));
        }
        debug!(channel = %channel, slot = %endpoint, "Slot attached to channel");
        self.notify(channel, &endpoint, true);
        Ok(())
    }

    /// Detach a signal and its routes.
    pub fn disconnect_signal(&self, channel: &str, endpoint: &Endpoint) -> ConnectionResult<()> {
        {
            let mut channels = self.channels.lock();
            let entry = channels
                .get_mut(channel)
                .ok_or_else(|| ConnectionError::UnknownChannel(channel.to_string()))?;
            entry.disconnect_where(|signal, _| signal == endpoint);
            entry.signals.retain(|(e, _)| e != endpoint);
            if entry.is_empty() {
                channels.remove(channel);
            }
        }
        self.notify(channel, endpoint, false);
        Ok(())
    }

    /// Detach a slot and its routes.
    pub fn disconnect_slot(&self, channel: &str, endpoint: &Endpoint) -> ConnectionResult<()> {
        {
            let mut channels = self.channels.lock();
            let entry = channels
                .get_mut(channel)
                .ok_or_else(|| ConnectionError::UnknownChannel(channel.to_string()))?;
            entry.disconnect_where(|_, slot| slot == endpoint);
            entry.slots.retain(|(e, _)| e != endpoint);
            if entry.is_empty() {
                channels.remove(channel);
            }
        }
        self.notify(channel, endpoint, false);
        Ok(())
    }

    /// Disconnect and forget a whole channel.
    pub fn teardown(&self, channel: &str) -> ConnectionResult<()> {
        let mut removed = self
            .channels
            .lock()
            .remove(channel)
            .ok_or_else(|| ConnectionError::UnknownChannel(channel.to_string()))?;
        removed.disconnect_where(|_, _| true);
        info!(
            channel = %channel,
            signals = removed.signals.len(),
            slots = removed.slots.len(),
            "Channel torn down"
        );
        Ok(())
    }

    /// Disconnect every channel.
    pub fn teardown_all(&self) {
        let channels = std::mem::take(&mut *self.channels.lock());
        for (_, mut channel) in channels {
            channel.disconnect_where(|_, _| true);
        }
    }

    #[must_use]
    pub fn contains(&self, channel: &str) -> bool {
        self.channels.lock().contains_key(channel)
    }

    #[must_use]
    pub fn channels(&self) -> Vec<String> {
        self.channels.lock().keys().cloned().collect()
    }

    /// Number of live routes on a channel.
    #[must_use]
    pub fn route_count(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .get(channel)
            .map_or(0, |c| c.routes.iter().filter(|(_, _, r)| r.is_connected()).count())
    }

    fn notify(&self, channel: &str, endpoint: &Endpoint, connected: bool) {
        if let Some(publisher) = &self.publisher {
            publisher.publish(RuntimeEvent::ChannelChanged {
                channel: channel.to_string(),
                endpoint: endpoint.to_string(),
                connected,
            });
        }
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ChannelRegistry {
    fn drop(&mut self) {
        self.teardown_all();
    }
}
