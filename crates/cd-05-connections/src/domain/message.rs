//! Messages carried from signals to slots.

use serde_json::Value;
use shared_types::ComponentId;

/// Messages deeper than this many re-emissions are dropped at the signal.
pub const MAX_GENERATION: u32 = 32;

/// A payload travelling along a connection, with feedback markers.
///
/// - `origin`: component whose action produced the message
/// - `no_echo`: slots owned by `origin` ignore the message
/// - `generation`: number of slot-to-signal hops so far
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub origin: Option<ComponentId>,
    pub generation: u32,
    pub no_echo: bool,
    pub payload: Value,
}

impl Message {
    /// A fresh message with no origin.
    #[must_use]
    pub fn new(payload: Value) -> Self {
        Self {
            origin: None,
            generation: 0,
            no_echo: false,
            payload,
        }
    }

    /// An empty notification.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Value::Null)
    }

    #[must_use]
    pub fn from_component(origin: ComponentId, payload: Value) -> Self {
        Self {
            origin: Some(origin),
            ..Self::new(payload)
        }
    }

    /// Mark the message so its originator does not receive it back.
    #[must_use]
    pub fn without_echo(mut self) -> Self {
        self.no_echo = true;
        self
    }

    /// A follow-up message emitted while handling `self`.
    #[must_use]
    pub fn derive(&self, origin: Option<ComponentId>, payload: Value) -> Self {
        Self {
            origin,
            generation: self.generation.saturating_add(1),
            no_echo: self.no_echo,
            payload,
        }
    }

    /// True when a slot owned by `owner` must skip this message.
    #[must_use]
    pub fn is_echo_for(&self, owner: Option<&ComponentId>) -> bool {
        self.no_echo && owner.is_some() && self.origin.as_ref() == owner
    }

    /// Payload as a string, if it is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.payload.as_str()
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_echo_detection() {
        let me = ComponentId::from("me");
        let msg = Message::from_component(me.clone(), json!(1)).without_echo();
        assert!(msg.is_echo_for(Some(&me)));
        assert!(!msg.is_echo_for(Some(&ComponentId::from("other"))));
        assert!(!msg.is_echo_for(None));
    }

    #[test]
    fn test_derive_increments_generation() {
        let msg = Message::new(json!("x"));
        let next = msg.derive(None, json!("y"));
        assert_eq!(next.generation, 1);
        assert_eq!(next.as_str(), Some("y"));
    }
}
