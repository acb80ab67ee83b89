//! # Core Runtime Entities
//!
//! Identifiers and small value types shared by every runtime subsystem.
//!
//! ## Clusters
//!
//! - **Identity**: `ObjectId`, `ComponentId`, `ModuleId`, `TypeTag`
//! - **Binding**: `Access`, `Key`
//! - **Lifecycle**: `GlobalStatus`, `ConfigurationStatus`, `UpdatingStatus`

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{EndpointParseError, KeyParseError};

/// Type tag accepted by every implementation as "any data object".
pub const ANY_OBJECT_TYPE: &str = "conduit::Object";

/// Separator between a group key name and the slot index.
pub const KEY_GROUP_SEPARATOR: char = '#';

/// Highest slot index a key group may address.
pub const MAX_GROUP_INDEX: usize = 4095;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// A stable, explicit type tag.
///
/// Tags are chosen at registration time and compared by their string value,
/// never by compiler-assigned type identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeTag(Cow<'static, str>);

impl TypeTag {
    /// Create a tag from a static string, usable in `const` context.
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Create a tag from any string.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// The tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the catch-all object tag.
    #[must_use]
    pub fn is_any_object(&self) -> bool {
        self.as_str() == ANY_OBJECT_TYPE
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for TypeTag {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for TypeTag {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// The identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True when the identifier is the empty string.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identity of a data object (or of an object slot declared in a configuration).
    ObjectId
);

string_id!(
    /// Identity of a component instance.
    ComponentId
);

string_id!(
    /// Identifier of an independently loadable module.
    ModuleId
);

impl ObjectId {
    /// Generate a fresh, unique object identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("object-{}", uuid::Uuid::new_v4()))
    }
}

impl ComponentId {
    /// Generate a fresh, unique component identifier for an implementation.
    #[must_use]
    pub fn generate(impl_id: &str) -> Self {
        let leaf = impl_id.rsplit("::").next().unwrap_or(impl_id);
        Self(format!("{}-{}", leaf, uuid::Uuid::new_v4().simple()))
    }
}

// =============================================================================
// CLUSTER B: BINDING
// =============================================================================

/// How a component accesses a bound object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Access {
    /// Read-only input.
    #[serde(rename = "in")]
    Input,
    /// Read-write input.
    #[serde(rename = "inout")]
    InOut,
    /// Object produced by the component.
    #[serde(rename = "out")]
    Output,
}

impl Access {
    /// Inputs and in-outs are consumed; outputs are produced.
    #[must_use]
    pub fn is_consumed(self) -> bool {
        matches!(self, Self::Input | Self::InOut)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "in",
            Self::InOut => "inout",
            Self::Output => "out",
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A binding key, optionally addressing one slot of a key group.
///
/// Group slots are rendered as `name#index`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key {
    name: String,
    index: Option<usize>,
}

impl Key {
    /// A plain (non-group) key.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: None,
        }
    }

    /// One slot of a key group.
    pub fn group(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index: Some(index),
        }
    }

    /// Key name without the group index.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Group index, if this key addresses a group slot.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    #[must_use]
    pub fn is_group_slot(&self) -> bool {
        self.index.is_some()
    }

    /// Fully qualified key (`name` or `name#index`).
    #[must_use]
    pub fn full_name(&self) -> String {
        match self.index {
            Some(index) => format!("{}{}{}", self.name, KEY_GROUP_SEPARATOR, index),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}{}{}", self.name, KEY_GROUP_SEPARATOR, index),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for Key {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(KeyParseError::Empty);
        }
        match s.rsplit_once(KEY_GROUP_SEPARATOR) {
            Some((name, index)) => {
                if name.is_empty() {
                    return Err(KeyParseError::Empty);
                }
                let index = index.parse::<usize>().map_err(|_| KeyParseError::InvalidIndex {
                    key: s.to_string(),
                })?;
                if index > MAX_GROUP_INDEX {
                    return Err(KeyParseError::IndexOutOfRange {
                        key: s.to_string(),
                        max: MAX_GROUP_INDEX,
                    });
                }
                Ok(Self::group(name, index))
            }
            None => Ok(Self::new(s)),
        }
    }
}

impl From<&str> for Key {
    /// Plain key; group syntax is not interpreted here (use `parse`).
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A `component/member` reference naming a signal or slot of a component.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub component: ComponentId,
    pub member: String,
}

impl Endpoint {
    pub fn new(component: impl Into<ComponentId>, member: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            member: member.into(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.component, self.member)
    }
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((component, member)) if !component.is_empty() && !member.is_empty() => {
                Ok(Self::new(component, member))
            }
            _ => Err(EndpointParseError::Malformed(s.to_string())),
        }
    }
}

// =============================================================================
// CLUSTER C: LIFECYCLE
// =============================================================================

/// Run status of a component, including transient transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GlobalStatus {
    Stopped,
    Starting,
    Started,
    Swapping,
    Stopping,
}

impl GlobalStatus {
    /// True while a transition is running.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Starting | Self::Swapping | Self::Stopping)
    }
}

/// Configuration status of a component. Configuration happens once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigurationStatus {
    Unconfigured,
    Configuring,
    Configured,
}

/// Whether an `update()` is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdatingStatus {
    Updating,
    NotUpdating,
}
