//! Output binder
//!
//! Collects the observed attributes of resources that reached `Ready` during
//! the current pass and feeds them into dependent descriptors. Nothing is
//! ever exposed from a resource that is not `Ready`.

use crate::error::{CloudError, Result};
use crate::resource::{Config, ResourceDescriptor, ResourceId};
use crate::state::ResourceState;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Final attributes of ready resources
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outputs {
    resources: BTreeMap<ResourceId, BTreeMap<String, serde_json::Value>>,
}

impl Outputs {
    pub fn get(&self, id: &ResourceId) -> Option<&BTreeMap<String, serde_json::Value>> {
        self.resources.get(id)
    }

    pub fn attribute(&self, id: &ResourceId, attribute: &str) -> Option<&serde_json::Value> {
        self.resources.get(id).and_then(|attrs| attrs.get(attribute))
    }

    /// Lookup by resource name alone; first match in identity order
    pub fn by_name(&self, name: &str) -> Option<&BTreeMap<String, serde_json::Value>> {
        self.resources
            .iter()
            .find(|(id, _)| id.name == name)
            .map(|(_, attrs)| attrs)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceId, &BTreeMap<String, serde_json::Value>)> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl Serialize for Outputs {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.resources.len()))?;
        for (id, attrs) in &self.resources {
            map.serialize_entry(&id.key(), attrs)?;
        }
        map.end()
    }
}

/// Ready states of the current pass, used as binding sources
#[derive(Debug, Default)]
pub struct OutputBinder {
    ready: BTreeMap<ResourceId, ResourceState>,
}

impl OutputBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a producer's state; returns false (and records nothing) unless it is Ready
    pub fn publish(&mut self, id: ResourceId, state: &ResourceState) -> bool {
        if !state.is_ready() {
            tracing::debug!(resource = %id, status = %state.status, "not publishing outputs");
            return false;
        }
        self.ready.insert(id, state.clone());
        true
    }

    pub fn is_ready(&self, id: &ResourceId) -> bool {
        self.ready.contains_key(id)
    }

    pub fn state(&self, id: &ResourceId) -> Option<&ResourceState> {
        self.ready.get(id)
    }

    /// Declared config with every binding target filled from its producer
    pub fn resolve(&self, descriptor: &ResourceDescriptor) -> Result<Config> {
        let mut config = descriptor.config.clone();
        for binding in &descriptor.bindings {
            let value = self
                .ready
                .get(&binding.producer)
                .and_then(|state| state.attributes.get(&binding.attribute))
                .ok_or_else(|| CloudError::BindingUnresolved {
                    resource: descriptor.id.clone(),
                    producer: binding.producer.clone(),
                    attribute: binding.attribute.clone(),
                })?;
            config.insert(binding.target.clone(), value.clone());
        }
        Ok(config)
    }

    /// Resolve what can be resolved; returns the config and the targets still unknown
    pub fn resolve_partial(&self, descriptor: &ResourceDescriptor) -> (Config, Vec<String>) {
        let mut config = descriptor.config.clone();
        let mut pending = Vec::new();
        for binding in &descriptor.bindings {
            match self
                .ready
                .get(&binding.producer)
                .and_then(|state| state.attributes.get(&binding.attribute))
            {
                Some(value) => {
                    config.insert(binding.target.clone(), value.clone());
                }
                None => {
                    config.remove(&binding.target);
                    pending.push(binding.target.clone());
                }
            }
        }
        (config, pending)
    }

    /// Attributes of every ready resource
    pub fn outputs(&self) -> Outputs {
        Outputs {
            resources: self
                .ready
                .iter()
                .map(|(id, state)| (id.clone(), state.attributes.clone()))
                .collect(),
        }
    }
}
