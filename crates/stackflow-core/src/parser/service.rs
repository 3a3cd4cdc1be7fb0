//! Service section

use super::{children, first_bool, first_string, first_u32, invalid, missing, to_u16, to_u32};
use crate::error::Result;
use crate::model::{ContainerSpec, ListenerProtocol, ListenerSpec, ServiceSpec};
use kdl::KdlNode;

/// Parse the service section; the flag tells whether a listener was declared
pub fn parse_service(node: &KdlNode) -> Result<(ServiceSpec, bool)> {
    let mut service = ServiceSpec::default();
    let mut containers = Vec::new();
    let mut listener_declared = false;

    for child in children(node) {
        match child.name().value() {
            "desired-count" | "desired_count" | "replicas" => {
                service.desired_count = first_u32(child)?
            }
            "cpu" => service.cpu = first_u32(child)?,
            "memory" => service.memory = first_u32(child)?,
            "public" => service.public = first_bool(child)?,
            "listener" => {
                service.listener = parse_listener(child)?;
                listener_declared = true;
            }
            "container" => containers.push(parse_container(child)?),
            other => tracing::warn!(section = "service", field = other, "Ignoring unknown field"),
        }
    }

    // declared containers replace the default pair
    if !containers.is_empty() {
        service.containers = containers;
    }
    Ok((service, listener_declared))
}

/// listener port=443 protocol="HTTPS" container="nginx"
fn parse_listener(node: &KdlNode) -> Result<ListenerSpec> {
    let mut listener = ListenerSpec::default();
    if let Some(port) = node.get("port").and_then(|v| v.as_integer()) {
        listener.port = to_u16("listener.port", port)?;
    }
    if let Some(protocol) = node.get("protocol").and_then(|v| v.as_string()) {
        listener.protocol = ListenerProtocol::parse(protocol)
            .ok_or_else(|| invalid("listener.protocol", &format!("unknown protocol '{}'", protocol)))?;
    }
    if let Some(container) = node.get("container").and_then(|v| v.as_string()) {
        listener.container = Some(container.to_string());
    }
    Ok(listener)
}

/// container "app" image="..." port=9000 cpu=256 memory=512 essential=#true
fn parse_container(node: &KdlNode) -> Result<ContainerSpec> {
    let name = first_string(node).ok_or_else(|| missing(node, "name"))?;
    let mut container = ContainerSpec::new(name);

    if let Some(image) = node.get("image").and_then(|v| v.as_string()) {
        container.image = Some(image.to_string());
    }
    if let Some(port) = node.get("port").and_then(|v| v.as_integer()) {
        container.port = Some(to_u16("container.port", port)?);
    }
    if let Some(cpu) = node.get("cpu").and_then(|v| v.as_integer()) {
        container.cpu = to_u32("container.cpu", cpu)?;
    }
    if let Some(memory) = node.get("memory").and_then(|v| v.as_integer()) {
        container.memory = to_u32("container.memory", memory)?;
    }
    if let Some(essential) = node.get("essential").and_then(|v| v.as_bool()) {
        container.essential = essential;
    }
    Ok(container)
}
