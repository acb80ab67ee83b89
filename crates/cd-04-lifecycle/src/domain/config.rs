//! Per-component configuration: declared bindings, groups and requirements.

use std::collections::{BTreeMap, BTreeSet};

use cd_03_object_registry::BindingOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{Access, ComponentId, Key, ObjectId};

/// One declared binding of a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSpec {
    pub key: String,
    /// Identifier of the object bound (or produced) under `key`.
    pub uid: String,
    #[serde(default = "default_access")]
    pub access: Access,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub auto_connect: bool,
    /// Slot in a key group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

fn default_access() -> Access {
    Access::Input
}

impl ObjectSpec {
    pub fn new(key: impl Into<String>, uid: impl Into<String>, access: Access) -> Self {
        Self {
            key: key.into(),
            uid: uid.into(),
            access,
            optional: false,
            auto_connect: false,
            index: None,
        }
    }

    pub fn input(key: impl Into<String>, uid: impl Into<String>) -> Self {
        Self::new(key, uid, Access::Input)
    }

    pub fn inout(key: impl Into<String>, uid: impl Into<String>) -> Self {
        Self::new(key, uid, Access::InOut)
    }

    pub fn output(key: impl Into<String>, uid: impl Into<String>) -> Self {
        Self::new(key, uid, Access::Output)
    }

    #[must_use]
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    #[must_use]
    pub fn auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    #[must_use]
    pub fn at(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Registry key: plain, or `key#index` for group slots.
    #[must_use]
    pub fn binding_key(&self) -> Key {
        match self.index {
            Some(index) => Key::group(self.key.as_str(), index),
            None => Key::new(self.key.as_str()),
        }
    }

    #[must_use]
    pub fn object_id(&self) -> ObjectId {
        ObjectId::new(self.uid.as_str())
    }

    /// Registry flags; `component_auto_connect` turns auto-connection on for
    /// every consumed binding.
    #[must_use]
    pub fn options(&self, component_auto_connect: bool) -> BindingOptions {
        BindingOptions::new(self.access)
            .optional(self.optional)
            .auto_connect(self.auto_connect || (component_auto_connect && self.access.is_consumed()))
    }
}

/// Everything the manager needs to create and drive one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
    pub uid: ComponentId,
    /// Implementation id passed to the service factory.
    #[serde(rename = "type")]
    pub impl_id: String,
    /// Named worker; the default worker when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<String>,
    #[serde(default)]
    pub auto_connect: bool,
    #[serde(default)]
    pub objects: Vec<ObjectSpec>,
    /// Minimum non-empty slots per key group.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub group_minimum: BTreeMap<String, usize>,
    /// Component-specific block handed to `configure`.
    #[serde(default)]
    pub config: Value,
}

impl ComponentConfig {
    pub fn new(uid: impl Into<ComponentId>, impl_id: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            impl_id: impl_id.into(),
            worker: None,
            auto_connect: false,
            objects: Vec::new(),
            group_minimum: BTreeMap::new(),
            config: Value::Null,
        }
    }

    #[must_use]
    pub fn with_object(mut self, spec: ObjectSpec) -> Self {
        self.objects.push(spec);
        self
    }

    #[must_use]
    pub fn with_worker(mut self, worker: impl Into<String>) -> Self {
        self.worker = Some(worker.into());
        self
    }

    #[must_use]
    pub fn with_auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    #[must_use]
    pub fn with_group_minimum(mut self, group: impl Into<String>, minimum: usize) -> Self {
        self.group_minimum.insert(group.into(), minimum);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// Consumed bindings that reference `uid`.
    pub fn consumers_of<'a>(&'a self, uid: &'a ObjectId) -> impl Iterator<Item = &'a ObjectSpec> + 'a {
        self.objects
            .iter()
            .filter(move |spec| spec.access.is_consumed() && spec.uid == uid.as_str())
    }

    /// Configured uid per output key.
    #[must_use]
    pub fn output_ids(&self) -> BTreeMap<Key, ObjectId> {
        self.objects
            .iter()
            .filter(|spec| spec.access == Access::Output)
            .map(|spec| (spec.binding_key(), spec.object_id()))
            .collect()
    }

    #[must_use]
    pub fn output_uid(&self, key: &Key) -> Option<ObjectId> {
        self.objects
            .iter()
            .find(|spec| spec.access == Access::Output && spec.binding_key() == *key)
            .map(ObjectSpec::object_id)
    }

    /// Minimum non-empty slots of a group: configured, or the number of
    /// declared non-optional slots.
    #[must_use]
    pub fn group_minimum(&self, group: &str) -> usize {
        self.group_minimum.get(group).copied().unwrap_or_else(|| {
            self.objects
                .iter()
                .filter(|s| s.index.is_some() && s.key == group && s.access.is_consumed() && !s.optional)
                .count()
        })
    }

    /// True when every mandatory plain key is bound and every group holds
    /// at least its minimum of bound slots. `is_bound` reports the current
    /// registry state of one key.
    pub fn has_all_required<F>(&self, is_bound: F) -> bool
    where
        F: Fn(&Key) -> bool,
    {
        let mut groups = BTreeSet::new();
        for spec in self.objects.iter().filter(|s| s.access.is_consumed()) {
            if spec.index.is_some() {
                groups.insert(spec.key.as_str());
            } else if !spec.optional && !is_bound(&spec.binding_key()) {
                return false;
            }
        }
        groups.into_iter().all(|group| {
            let bound = self
                .objects
                .iter()
                .filter(|s| s.key == group && s.index.is_some() && s.access.is_consumed())
                .filter(|s| is_bound(&s.binding_key()))
                .count();
            bound >= self.group_minimum(group)
        })
    }
}
