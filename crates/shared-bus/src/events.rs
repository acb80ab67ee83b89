//! # Runtime Events
//!
//! Notifications emitted by the object-service registry, the lifecycle
//! manager and the connection engine.

use serde::{Deserialize, Serialize};
use shared_types::{Access, ComponentId, GlobalStatus, Key, ObjectId};

/// All events that can be published to the event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuntimeEvent {
    // =========================================================================
    // OBJECT-SERVICE REGISTRY
    // =========================================================================
    /// An object was bound to a component key.
    Bound {
        object: ObjectId,
        component: ComponentId,
        key: Key,
        access: Access,
    },

    /// An object was unbound from a component key.
    Unbound {
        object: ObjectId,
        component: ComponentId,
        key: Key,
        access: Access,
    },

    // =========================================================================
    // LIFECYCLE
    // =========================================================================
    /// A component reached a new run status.
    StatusChanged {
        component: ComponentId,
        status: GlobalStatus,
    },

    /// A transition failed at the component boundary.
    TransitionFailed {
        component: ComponentId,
        transition: String,
        reason: String,
    },

    // =========================================================================
    // CONNECTIONS
    // =========================================================================
    /// A channel gained or lost an endpoint.
    ChannelChanged {
        channel: String,
        endpoint: String,
        connected: bool,
    },
}

impl RuntimeEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::Bound { .. } | Self::Unbound { .. } => EventTopic::Registry,
            Self::StatusChanged { .. } | Self::TransitionFailed { .. } => EventTopic::Lifecycle,
            Self::ChannelChanged { .. } => EventTopic::Connections,
        }
    }

    /// The component the event concerns, if any.
    #[must_use]
    pub fn component(&self) -> Option<&ComponentId> {
        match self {
            Self::Bound { component, .. }
            | Self::Unbound { component, .. }
            | Self::StatusChanged { component, .. }
            | Self::TransitionFailed { component, .. } => Some(component),
            Self::ChannelChanged { .. } => None,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Binding notifications.
    Registry,
    /// Status changes and transition failures.
    Lifecycle,
    /// Channel wiring changes.
    Connections,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Components to include. Empty means all components.
    pub components: Vec<ComponentId>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            components: Vec::new(),
        }
    }

    /// Create a filter for events concerning specific components.
    #[must_use]
    pub fn for_components(components: Vec<ComponentId>) -> Self {
        Self {
            topics: Vec::new(),
            components,
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &RuntimeEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let component_match = self.components.is_empty()
            || event
                .component()
                .is_some_and(|component| self.components.contains(component));

        topic_match && component_match
    }
}
