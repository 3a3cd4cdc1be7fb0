//! Stack model
//!
//! Everything a stack file declares, with the defaults of a two-container
//! web application behind a public load balancer.

use super::ServiceSpec;
use serde::{Deserialize, Serialize};

/// A whole application stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackSpec {
    /// Project name; every resource name is derived from it
    pub project: String,
    pub network: NetworkSpec,
    pub registry: RegistrySpec,
    pub cluster: ClusterSpec,
    pub service: ServiceSpec,
    pub certificate: Option<CertificateSpec>,
    pub dns: Option<DnsSpec>,
}

impl StackSpec {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            network: NetworkSpec::default(),
            registry: RegistrySpec::default(),
            cluster: ClusterSpec::default(),
            service: ServiceSpec::default(),
            certificate: None,
            dns: None,
        }
    }

    /// Repository name, defaulting to the project name
    pub fn repository_name(&self) -> &str {
        self.registry.repository.as_deref().unwrap_or(&self.project)
    }
}

/// Isolated network the stack runs in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub cidr: String,
    /// Number of availability zones to spread subnets over
    pub az_count: u32,
}

impl Default for NetworkSpec {
    fn default() -> Self {
        Self {
            cidr: "10.0.0.0/16".to_string(),
            az_count: 2,
        }
    }
}

/// Container image registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySpec {
    pub repository: Option<String>,
    pub scan_on_push: bool,
}

impl Default for RegistrySpec {
    fn default() -> Self {
        Self {
            repository: None,
            scan_on_push: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub container_insights: bool,
}

/// TLS certificate for the public listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateSpec {
    pub domain: String,
}

/// DNS record pointing at the load balancer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsSpec {
    pub zone: String,
    /// Record label within the zone; `None` for the zone apex
    pub record: Option<String>,
}

impl DnsSpec {
    pub fn fqdn(&self) -> String {
        match &self.record {
            Some(record) => format!("{}.{}", record, self.zone),
            None => self.zone.clone(),
        }
    }
}
