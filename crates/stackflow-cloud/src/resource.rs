//! Resource descriptor model
//!
//! A [`Topology`] is an ordered set of [`ResourceDescriptor`]s. Each
//! descriptor names a resource by `(kind, name)`, carries the declared
//! configuration, and lists the resources it depends on. Bindings copy a
//! producer's observed attribute into the consumer's configuration once the
//! producer is ready.

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declared or observed configuration of a resource
pub type Config = BTreeMap<String, serde_json::Value>;

/// Kind of infrastructure resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Network,
    Registry,
    Cluster,
    TaskDefinition,
    Service,
    Certificate,
    DnsRecord,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Network,
        ResourceKind::Registry,
        ResourceKind::Cluster,
        ResourceKind::TaskDefinition,
        ResourceKind::Service,
        ResourceKind::Certificate,
        ResourceKind::DnsRecord,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Network => "network",
            ResourceKind::Registry => "registry",
            ResourceKind::Cluster => "cluster",
            ResourceKind::TaskDefinition => "task-definition",
            ResourceKind::Service => "service",
            ResourceKind::Certificate => "certificate",
            ResourceKind::DnsRecord => "dns-record",
        }
    }

    /// Parse from the kebab-case name
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Fields that cannot be changed in place; divergence requires a replace
    pub fn immutable_fields(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::Network => &["cidr", "az_count"],
            ResourceKind::Registry => &["repository_name"],
            ResourceKind::Cluster => &["network_id"],
            ResourceKind::TaskDefinition => &["family"],
            ResourceKind::Service => &["cluster_arn", "public_load_balancer"],
            ResourceKind::Certificate => &["domain_name", "validation_method"],
            ResourceKind::DnsRecord => &["zone", "record_name", "record_type"],
        }
    }

    /// Attributes the control plane generates for this kind
    pub fn output_attributes(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::Network => &["network_id"],
            ResourceKind::Registry => &["repository_uri"],
            ResourceKind::Cluster => &["cluster_arn"],
            ResourceKind::TaskDefinition => &["task_definition_arn"],
            ResourceKind::Service => &["service_arn", "load_balancer_dns"],
            ResourceKind::Certificate => &["certificate_arn"],
            ResourceKind::DnsRecord => &["fqdn"],
        }
    }

    pub fn is_immutable(&self, field: &str) -> bool {
        self.immutable_fields().contains(&field)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a resource within a topology
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceId {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Parse a `kind:name` key
    pub fn parse(key: &str) -> Option<Self> {
        let (kind, name) = key.split_once(':')?;
        if name.is_empty() {
            return None;
        }
        Some(Self::new(ResourceKind::parse(kind)?, name))
    }

    /// Full resource key (kind:name)
    pub fn key(&self) -> String {
        format!("{}:{}", self.kind, self.name)
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// Copies `producer.attributes[attribute]` into the consumer's `target` config key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub producer: ResourceId,
    pub attribute: String,
    pub target: String,
}

/// Declared description of one resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub id: ResourceId,

    /// Declared configuration (bound fields are filled in at apply time)
    pub config: Config,

    /// Declared dependencies, in declaration order
    pub depends_on: Vec<ResourceId>,

    /// Attribute bindings from producers
    pub bindings: Vec<Binding>,
}

impl ResourceDescriptor {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(kind, name),
            config: Config::new(),
            depends_on: Vec::new(),
            bindings: Vec::new(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.id.kind
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    pub fn depends_on(mut self, producer: ResourceId) -> Self {
        if !self.depends_on.contains(&producer) {
            self.depends_on.push(producer);
        }
        self
    }

    /// Bind a producer attribute into `target`; also declares the dependency
    pub fn bind(
        mut self,
        producer: ResourceId,
        attribute: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        self.bindings.push(Binding {
            producer: producer.clone(),
            attribute: attribute.into(),
            target: target.into(),
        });
        self.depends_on(producer)
    }

    /// Config keys that are filled in from bindings
    pub fn bound_fields(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.target.as_str())
    }

    /// Get a configuration value as a specific type
    pub fn get_config<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.config
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Ordered set of resource descriptors
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topology {
    resources: Vec<ResourceDescriptor>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor; identities must be unique
    pub fn add(&mut self, descriptor: ResourceDescriptor) -> Result<ResourceId> {
        if self.contains(&descriptor.id) {
            return Err(CloudError::DuplicateResource(descriptor.id));
        }
        let id = descriptor.id.clone();
        self.resources.push(descriptor);
        Ok(id)
    }

    pub fn get(&self, id: &ResourceId) -> Option<&ResourceDescriptor> {
        self.resources.iter().find(|r| &r.id == id)
    }

    pub fn position(&self, id: &ResourceId) -> Option<usize> {
        self.resources.iter().position(|r| &r.id == id)
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.position(id).is_some()
    }

    pub fn resources(&self) -> &[ResourceDescriptor] {
        &self.resources
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_id_roundtrip_key() {
        let id = ResourceId::new(ResourceKind::TaskDefinition, "shop-task");
        assert_eq!(id.key(), "task-definition:shop-task");
        assert_eq!(ResourceId::parse("task-definition:shop-task"), Some(id));
        assert_eq!(ResourceId::parse("bogus:shop"), None);
        assert_eq!(ResourceId::parse("service:"), None);
    }

    #[test]
    fn test_bind_declares_dependency_once() {
        let cluster = ResourceId::new(ResourceKind::Cluster, "c");
        let svc = ResourceDescriptor::new(ResourceKind::Service, "s")
            .depends_on(cluster.clone())
            .bind(cluster.clone(), "cluster_arn", "cluster_arn");

        assert_eq!(svc.depends_on, vec![cluster]);
        assert_eq!(svc.bound_fields().collect::<Vec<_>>(), vec!["cluster_arn"]);
    }

    #[test]
    fn test_topology_rejects_duplicates() {
        let mut topology = Topology::new();
        topology
            .add(ResourceDescriptor::new(ResourceKind::Network, "n"))
            .unwrap();
        let err = topology
            .add(ResourceDescriptor::new(ResourceKind::Network, "n").with_config("cidr", json!("10.0.0.0/16")))
            .unwrap_err();
        assert!(matches!(err, CloudError::DuplicateResource(_)));

        // same name under another kind is a different identity
        topology
            .add(ResourceDescriptor::new(ResourceKind::Registry, "n"))
            .unwrap();
        assert_eq!(topology.len(), 2);
    }

    #[test]
    fn test_immutable_fields() {
        assert!(ResourceKind::Network.is_immutable("cidr"));
        assert!(!ResourceKind::Service.is_immutable("desired_count"));
        assert_eq!(
            serde_json::to_value(ResourceKind::DnsRecord).unwrap(),
            json!("dns-record")
        );
    }
}
