//! Topology builder
//!
//! Turns a [`StackSpec`] into the resource descriptors the engine converges.
//! Names are derived from the project name only, so repeated runs always
//! address the same live resources.

use crate::error::Result;
use crate::model::{ContainerSpec, StackSpec};
use serde_json::{Value, json};
use stackflow_cloud::{ResourceDescriptor, ResourceId, ResourceKind, Topology};

/// Resource identities of a stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackNames {
    pub network: ResourceId,
    pub registry: ResourceId,
    pub cluster: ResourceId,
    pub task: ResourceId,
    pub service: ResourceId,
    pub certificate: Option<ResourceId>,
    pub dns: Option<ResourceId>,
}

impl StackNames {
    pub fn new(stack: &StackSpec) -> Self {
        let name = |role: &str| format!("{}-{}", stack.project, role);
        Self {
            network: ResourceId::new(ResourceKind::Network, name("network")),
            registry: ResourceId::new(ResourceKind::Registry, name("registry")),
            cluster: ResourceId::new(ResourceKind::Cluster, name("cluster")),
            task: ResourceId::new(ResourceKind::TaskDefinition, name("task")),
            service: ResourceId::new(ResourceKind::Service, name("service")),
            certificate: stack
                .certificate
                .as_ref()
                .map(|_| ResourceId::new(ResourceKind::Certificate, name("certificate"))),
            // DNS records are named by what they resolve
            dns: stack
                .dns
                .as_ref()
                .map(|dns| ResourceId::new(ResourceKind::DnsRecord, dns.fqdn())),
        }
    }
}

/// Build the topology of a stack
pub fn build_topology(stack: &StackSpec) -> Result<Topology> {
    let names = StackNames::new(stack);
    let service = &stack.service;
    let mut topology = Topology::new();

    topology.add(
        ResourceDescriptor::new(ResourceKind::Network, &names.network.name)
            .with_config("cidr", json!(stack.network.cidr))
            .with_config("az_count", json!(stack.network.az_count)),
    )?;

    topology.add(
        ResourceDescriptor::new(ResourceKind::Registry, &names.registry.name)
            .with_config("repository_name", json!(stack.repository_name()))
            .with_config("scan_on_push", json!(stack.registry.scan_on_push)),
    )?;

    topology.add(
        ResourceDescriptor::new(ResourceKind::Cluster, &names.cluster.name)
            .with_config("container_insights", json!(stack.cluster.container_insights))
            .bind(names.network.clone(), "network_id", "network_id"),
    )?;

    topology.add(
        ResourceDescriptor::new(ResourceKind::TaskDefinition, &names.task.name)
            .with_config("family", json!(names.task.name))
            .with_config("cpu", json!(service.cpu))
            .with_config("memory", json!(service.memory))
            .with_config(
                "containers",
                Value::Array(service.containers.iter().map(container_config).collect()),
            )
            .bind(names.registry.clone(), "repository_uri", "repository_uri"),
    )?;

    let (target_container, target_port) = service
        .target_container()
        .map(|c| (json!(c.name), json!(c.port)))
        .unwrap_or((Value::Null, Value::Null));
    let mut service_descriptor = ResourceDescriptor::new(ResourceKind::Service, &names.service.name)
        .with_config("desired_count", json!(service.desired_count))
        .with_config("public_load_balancer", json!(service.public))
        .with_config("listener_port", json!(service.listener.port))
        .with_config("listener_protocol", json!(service.listener.protocol.as_str()))
        .with_config("target_container", target_container)
        .with_config("target_port", target_port)
        .bind(names.cluster.clone(), "cluster_arn", "cluster_arn")
        .bind(names.task.clone(), "task_definition_arn", "task_definition_arn");

    if let (Some(certificate), Some(id)) = (&stack.certificate, &names.certificate) {
        topology.add(
            ResourceDescriptor::new(ResourceKind::Certificate, &id.name)
                .with_config("domain_name", json!(certificate.domain))
                .with_config("validation_method", json!("DNS")),
        )?;
        service_descriptor = service_descriptor.bind(id.clone(), "certificate_arn", "certificate_arn");
    }
    topology.add(service_descriptor)?;

    if let (Some(dns), Some(id)) = (&stack.dns, &names.dns) {
        let mut record = ResourceDescriptor::new(ResourceKind::DnsRecord, &id.name)
            .with_config("zone", json!(dns.zone))
            .with_config("record_type", json!("CNAME"))
            .with_config("ttl", json!(300));
        if let Some(label) = &dns.record {
            record = record.with_config("record_name", json!(label));
        }
        topology.add(record.bind(names.service.clone(), "load_balancer_dns", "target"))?;
    }

    tracing::debug!(project = %stack.project, resources = topology.len(), "Built topology");
    Ok(topology)
}

fn container_config(container: &ContainerSpec) -> Value {
    let mut config = json!({
        "name": container.name,
        "cpu": container.cpu,
        "memory": container.memory,
        "essential": container.essential,
    });
    if let Some(port) = container.port {
        config["port"] = json!(port);
    }
    match &container.image {
        Some(image) => config["image"] = json!(image),
        // resolved against the bound repository_uri
        None => config["tag"] = json!(container.name),
    }
    config
}
