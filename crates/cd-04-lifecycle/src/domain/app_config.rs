//! # Application Configuration
//!
//! The structural model replayed by the configuration manager:
//!
//! ```text
//! AppConfig
//! ├── parameters   name → default value, used by ${name}
//! ├── objects      { uid, type, deferred, value? }
//! ├── components   { uid, type, worker?, auto_connect, objects[..], group_minimum, config }
//! ├── start        component uids started once their requirements are met
//! ├── update       component uids updated after every start
//! └── connections  { channel?, signals: ["uid/signal"], slots: ["uid/slot"] }
//! ```
//!
//! Documents are JSON. Two rewrites run before validation: `${name}`
//! substitution over every string, then `<prefix>_` on every locally
//! declared uid.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{ComponentId, Endpoint, TypeTag};

use crate::domain::config::ComponentConfig;
use crate::error::{ConfigurationError, ConfigurationResult};

/// A data object declared by the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectConfig {
    pub uid: String,
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
    /// Produced later as a component output instead of being created here.
    #[serde(default)]
    pub deferred: bool,
    /// Initial value assigned after creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Signals and slots attached to one channel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Anonymous when absent; a name is generated at launch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default)]
    pub signals: Vec<String>,
    #[serde(default)]
    pub slots: Vec<String>,
}

/// A channel after merging declarations and parsing endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPlan {
    pub name: String,
    pub signals: Vec<Endpoint>,
    pub slots: Vec<Endpoint>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub objects: Vec<ObjectConfig>,
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
    #[serde(default)]
    pub start: Vec<String>,
    #[serde(default)]
    pub update: Vec<String>,
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
}

impl AppConfig {
    pub fn from_json(source_name: &str, text: &str) -> ConfigurationResult<Self> {
        serde_json::from_str(text).map_err(|e| ConfigurationError::Parse {
            source_name: source_name.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn from_file(path: &Path) -> ConfigurationResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&path.display().to_string(), &text)
    }

    /// Replace `${name}` in every string field. `overrides` win over the
    /// document's own parameter defaults; an unknown name is an error.
    pub fn substitute(&self, overrides: &BTreeMap<String, String>) -> ConfigurationResult<Self> {
        let mut parameters = self.parameters.clone();
        parameters.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));

        let body = Self {
            parameters: BTreeMap::new(),
            ..self.clone()
        };
        let mut value = serde_json::to_value(&body).map_err(|e| parse_error("substitution", e))?;
        substitute_value(&mut value, &parameters)?;
        let mut resolved: Self =
            serde_json::from_value(value).map_err(|e| parse_error("substitution", e))?;
        resolved.parameters = parameters;
        Ok(resolved)
    }

    /// Prefix every locally declared uid, and every reference to one, with
    /// `<prefix>_`. Anonymous channels get a generated, prefixed name.
    #[must_use]
    pub fn prefixed(&self, prefix: &str) -> Self {
        let declared = self.declared_uids();
        let rename = |uid: &str| -> String {
            if declared.contains(uid) {
                format!("{prefix}_{uid}")
            } else {
                uid.to_string()
            }
        };
        let rename_endpoint = |text: &str| -> String {
            match text.split_once('/') {
                Some((uid, member)) => format!("{}/{}", rename(uid), member),
                None => text.to_string(),
            }
        };

        let mut config = self.clone();
        for object in &mut config.objects {
            object.uid = rename(&object.uid);
        }
        for component in &mut config.components {
            component.uid = ComponentId::new(rename(component.uid.as_str()));
            for spec in &mut component.objects {
                spec.uid = rename(&spec.uid);
            }
        }
        for uid in config.start.iter_mut().chain(config.update.iter_mut()) {
            *uid = rename(uid);
        }
        for (index, connection) in config.connections.iter_mut().enumerate() {
            if connection.channel.is_none() {
                connection.channel = Some(format!("{prefix}_channel_{index}"));
            }
            for endpoint in connection.signals.iter_mut().chain(connection.slots.iter_mut()) {
                *endpoint = rename_endpoint(endpoint);
            }
        }
        config
    }

    /// Uids of declared objects and components.
    #[must_use]
    pub fn declared_uids(&self) -> BTreeSet<&str> {
        self.objects
            .iter()
            .map(|o| o.uid.as_str())
            .chain(self.components.iter().map(|c| c.uid.as_str()))
            .collect()
    }

    #[must_use]
    pub fn object(&self, uid: &str) -> Option<&ObjectConfig> {
        self.objects.iter().find(|o| o.uid == uid)
    }

    #[must_use]
    pub fn component(&self, uid: &str) -> Option<&ComponentConfig> {
        self.components.iter().find(|c| c.uid.as_str() == uid)
    }

    /// Merge declarations sharing a channel name and parse their endpoints.
    /// Anonymous declarations are named `<anonymous_prefix>_<index>`.
    pub fn channel_plans(&self, anonymous_prefix: &str) -> ConfigurationResult<Vec<ChannelPlan>> {
        let mut plans: Vec<ChannelPlan> = Vec::new();
        for (index, connection) in self.connections.iter().enumerate() {
            let name = connection
                .channel
                .clone()
                .unwrap_or_else(|| format!("{anonymous_prefix}_{index}"));
            let signals = parse_endpoints(&connection.signals)?;
            let slots = parse_endpoints(&connection.slots)?;
            match plans.iter_mut().find(|p| p.name == name) {
                Some(plan) => {
                    plan.signals.extend(signals);
                    plan.slots.extend(slots);
                }
                None => plans.push(ChannelPlan {
                    name,
                    signals,
                    slots,
                }),
            }
        }
        Ok(plans)
    }
}

fn parse_endpoints(texts: &[String]) -> ConfigurationResult<Vec<Endpoint>> {
    texts
        .iter()
        .map(|text| text.parse::<Endpoint>().map_err(ConfigurationError::from))
        .collect()
}

fn parse_error(source_name: &str, error: serde_json::Error) -> ConfigurationError {
    ConfigurationError::Parse {
        source_name: source_name.to_string(),
        reason: error.to_string(),
    }
}

fn substitute_value(value: &mut Value, parameters: &BTreeMap<String, String>) -> ConfigurationResult<()> {
    match value {
        Value::String(text) => {
            if text.contains("${") {
                *text = substitute_str(text, parameters)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                substitute_value(item, parameters)?;
            }
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                substitute_value(item, parameters)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// `${name}` → value. An unterminated `${` is kept as text.
fn substitute_str(text: &str, parameters: &BTreeMap<String, String>) -> ConfigurationResult<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let name = &after[..end];
        let value = parameters
            .get(name)
            .ok_or_else(|| ConfigurationError::MissingParameter(name.to_string()))?;
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
