//! KDL parser
//!
//! Parses a stack file into a [`StackSpec`]. Each top-level section has its
//! own parse function; sections left out keep their defaults.

mod resources;
mod service;

use resources::{parse_certificate, parse_cluster, parse_dns, parse_network, parse_registry};
use service::parse_service;

use crate::error::{Result, StackError};
use crate::model::{ListenerProtocol, StackSpec};
use kdl::{KdlDocument, KdlNode, KdlValue};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Parse a stack file
pub fn parse_stack_file<P: AsRef<Path>>(path: P) -> Result<StackSpec> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| StackError::IoError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    // project name falls back to the directory holding the file,
    // skipping hidden directories such as `.stackflow/`
    let name = path
        .canonicalize()
        .ok()
        .and_then(|p| {
            p.ancestors()
                .skip(1)
                .filter_map(|dir| dir.file_name().and_then(|n| n.to_str()))
                .find(|n| !n.starts_with('.'))
                .map(str::to_string)
        })
        .unwrap_or_else(|| "unnamed".to_string());
    parse_stack_string(&content, name)
}

/// Parse stack file contents
pub fn parse_stack_string(content: &str, default_name: String) -> Result<StackSpec> {
    let doc: KdlDocument = content.parse()?;

    let mut stack = StackSpec::new(default_name);
    let mut seen = HashSet::new();
    let mut listener_declared = false;

    for node in doc.nodes() {
        let section = node.name().value();
        if section != "project" && !seen.insert(section.to_string()) {
            return Err(StackError::DuplicateNode(section.to_string()));
        }

        match section {
            "project" => {
                stack.project = first_string(node)
                    .ok_or_else(|| missing(node, "name"))?
                    .to_string();
            }
            "network" => stack.network = parse_network(node)?,
            "registry" => stack.registry = parse_registry(node)?,
            "cluster" => stack.cluster = parse_cluster(node)?,
            "service" => {
                let (service, declared) = parse_service(node)?;
                stack.service = service;
                listener_declared = declared;
            }
            "certificate" => stack.certificate = Some(parse_certificate(node)?),
            "dns" => stack.dns = Some(parse_dns(node)?),
            other => {
                tracing::warn!(node = other, "Ignoring unknown stack section");
            }
        }
    }

    // a certificate moves the default listener to HTTPS
    if stack.certificate.is_some() && !listener_declared {
        stack.service.listener.port = 443;
        stack.service.listener.protocol = ListenerProtocol::Https;
    }

    validate(&stack)?;
    tracing::debug!(
        project = %stack.project,
        containers = stack.service.containers.len(),
        "Parsed stack"
    );
    Ok(stack)
}

/// Check cross-field constraints of a parsed stack
pub fn validate(stack: &StackSpec) -> Result<()> {
    if !is_valid_name(&stack.project) {
        return Err(StackError::InvalidValue {
            field: "project".to_string(),
            message: format!(
                "'{}' must be lowercase letters, digits and dashes",
                stack.project
            ),
        });
    }

    if !stack.network.cidr.contains('/') {
        return Err(StackError::InvalidValue {
            field: "cidr".to_string(),
            message: format!("'{}' is not a CIDR block", stack.network.cidr),
        });
    }
    if stack.network.az_count == 0 {
        return Err(StackError::InvalidValue {
            field: "az-count".to_string(),
            message: "at least one availability zone is required".to_string(),
        });
    }

    let service = &stack.service;
    if service.containers.is_empty() {
        return Err(StackError::InvalidConfig(
            "service declares no containers".to_string(),
        ));
    }
    let mut names = HashSet::new();
    for container in &service.containers {
        if !names.insert(container.name.as_str()) {
            return Err(StackError::InvalidConfig(format!(
                "container '{}' declared more than once",
                container.name
            )));
        }
    }

    let target = service.target_container().ok_or_else(|| {
        StackError::ContainerNotFound(
            service
                .listener
                .container
                .clone()
                .unwrap_or_else(|| "<any container with a port>".to_string()),
        )
    })?;
    if target.port.is_none() {
        return Err(StackError::InvalidConfig(format!(
            "listener container '{}' exposes no port",
            target.name
        )));
    }

    let cpu: u64 = service.containers.iter().map(|c| u64::from(c.cpu)).sum();
    let memory: u64 = service.containers.iter().map(|c| u64::from(c.memory)).sum();
    if cpu > u64::from(service.cpu) || memory > u64::from(service.memory) {
        return Err(StackError::InvalidConfig(format!(
            "containers need {} CPU units / {} MiB but the task has {} / {}",
            cpu, memory, service.cpu, service.memory
        )));
    }

    if service.listener.protocol == ListenerProtocol::Https && stack.certificate.is_none() {
        return Err(StackError::InvalidConfig(
            "HTTPS listener requires a certificate".to_string(),
        ));
    }

    Ok(())
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn missing(node: &KdlNode, field: &str) -> StackError {
    StackError::MissingField {
        node: node.name().value().to_string(),
        field: field.to_string(),
    }
}

fn first_value(node: &KdlNode) -> Option<&KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .map(|e| e.value())
}

fn first_string(node: &KdlNode) -> Option<&str> {
    first_value(node).and_then(|v| v.as_string())
}

fn first_bool(node: &KdlNode) -> Result<bool> {
    first_value(node)
        .and_then(|v| v.as_bool())
        .ok_or_else(|| invalid(node.name().value(), "expected #true or #false"))
}

fn first_u32(node: &KdlNode) -> Result<u32> {
    let field = node.name().value();
    let value = first_value(node)
        .and_then(|v| v.as_integer())
        .ok_or_else(|| invalid(field, "expected an integer"))?;
    to_u32(field, value)
}

fn to_u32(field: &str, value: i128) -> Result<u32> {
    u32::try_from(value).map_err(|_| invalid(field, &format!("{} is out of range", value)))
}

fn to_u16(field: &str, value: i128) -> Result<u16> {
    u16::try_from(value).map_err(|_| invalid(field, &format!("{} is out of range", value)))
}

fn invalid(field: &str, message: &str) -> StackError {
    StackError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Children of a node; an empty list when it has no block
fn children(node: &KdlNode) -> &[KdlNode] {
    node.children().map(|doc| doc.nodes()).unwrap_or(&[])
}
