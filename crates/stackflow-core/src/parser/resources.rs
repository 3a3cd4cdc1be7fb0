//! Network, registry, cluster, certificate and DNS sections

use super::{children, first_bool, first_string, first_u32, missing};
use crate::error::Result;
use crate::model::{CertificateSpec, ClusterSpec, DnsSpec, NetworkSpec, RegistrySpec};
use kdl::KdlNode;

/// network { cidr "10.0.0.0/16"; az-count 2 }
pub fn parse_network(node: &KdlNode) -> Result<NetworkSpec> {
    let mut network = NetworkSpec::default();
    for child in children(node) {
        match child.name().value() {
            "cidr" => {
                network.cidr = first_string(child)
                    .ok_or_else(|| missing(node, "cidr"))?
                    .to_string();
            }
            "az-count" | "az_count" | "max-azs" => network.az_count = first_u32(child)?,
            other => tracing::warn!(section = "network", field = other, "Ignoring unknown field"),
        }
    }
    Ok(network)
}

/// registry { repository "shop-app"; scan-on-push #true }
pub fn parse_registry(node: &KdlNode) -> Result<RegistrySpec> {
    let mut registry = RegistrySpec::default();
    for child in children(node) {
        match child.name().value() {
            "repository" => {
                registry.repository = Some(
                    first_string(child)
                        .ok_or_else(|| missing(node, "repository"))?
                        .to_string(),
                );
            }
            "scan-on-push" | "scan_on_push" => registry.scan_on_push = first_bool(child)?,
            other => tracing::warn!(section = "registry", field = other, "Ignoring unknown field"),
        }
    }
    Ok(registry)
}

/// cluster { container-insights #true }
pub fn parse_cluster(node: &KdlNode) -> Result<ClusterSpec> {
    let mut cluster = ClusterSpec::default();
    for child in children(node) {
        match child.name().value() {
            "container-insights" | "container_insights" => {
                cluster.container_insights = first_bool(child)?
            }
            other => tracing::warn!(section = "cluster", field = other, "Ignoring unknown field"),
        }
    }
    Ok(cluster)
}

/// certificate { domain "shop.example.com" }
pub fn parse_certificate(node: &KdlNode) -> Result<CertificateSpec> {
    let domain = children(node)
        .iter()
        .find(|c| c.name().value() == "domain")
        .and_then(first_string)
        .ok_or_else(|| missing(node, "domain"))?;
    Ok(CertificateSpec {
        domain: domain.to_string(),
    })
}

/// dns { zone "example.com"; record "shop" }
pub fn parse_dns(node: &KdlNode) -> Result<DnsSpec> {
    let mut zone = None;
    let mut record = None;
    for child in children(node) {
        match child.name().value() {
            "zone" => zone = first_string(child).map(str::to_string),
            "record" => record = first_string(child).map(str::to_string),
            other => tracing::warn!(section = "dns", field = other, "Ignoring unknown field"),
        }
    }
    Ok(DnsSpec {
        zone: zone.ok_or_else(|| missing(node, "zone"))?,
        record,
    })
}
