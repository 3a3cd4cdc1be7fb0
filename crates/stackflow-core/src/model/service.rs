//! Service model
//!
//! A load-balanced service running one task definition.

use serde::{Deserialize, Serialize};

/// Listener protocol of the load balancer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ListenerProtocol {
    Http,
    Https,
}

impl ListenerProtocol {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "HTTP",
            Self::Https => "HTTPS",
        }
    }
}

/// Load balancer listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerSpec {
    pub port: u16,
    pub protocol: ListenerProtocol,
    /// Container receiving the traffic; the first container exposing a port when unset
    pub container: Option<String>,
}

impl Default for ListenerSpec {
    fn default() -> Self {
        Self {
            port: 80,
            protocol: ListenerProtocol::Http,
            container: Some("nginx".to_string()),
        }
    }
}

/// One container of the task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    /// Full image reference; the registry image tagged with the container name when unset
    pub image: Option<String>,
    pub port: Option<u16>,
    /// CPU units (1024 = one vCPU)
    pub cpu: u32,
    /// Memory limit in MiB
    pub memory: u32,
    pub essential: bool,
}

impl ContainerSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: None,
            port: None,
            cpu: 256,
            memory: 512,
            essential: true,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub desired_count: u32,
    /// Task-level CPU units
    pub cpu: u32,
    /// Task-level memory in MiB
    pub memory: u32,
    /// Load balancer reachable from the internet
    pub public: bool,
    pub listener: ListenerSpec,
    pub containers: Vec<ContainerSpec>,
}

impl Default for ServiceSpec {
    fn default() -> Self {
        Self {
            desired_count: 1,
            cpu: 512,
            memory: 1024,
            public: true,
            listener: ListenerSpec::default(),
            containers: default_containers(),
        }
    }
}

impl ServiceSpec {
    pub fn container(&self, name: &str) -> Option<&ContainerSpec> {
        self.containers.iter().find(|c| c.name == name)
    }

    /// Container the listener forwards to
    pub fn target_container(&self) -> Option<&ContainerSpec> {
        match &self.listener.container {
            Some(name) => self.container(name),
            None => self.containers.iter().find(|c| c.port.is_some()),
        }
    }
}

/// php-fpm application container plus the nginx front container
pub fn default_containers() -> Vec<ContainerSpec> {
    vec![
        ContainerSpec::new("app").with_port(9000),
        ContainerSpec::new("nginx").with_port(80),
    ]
}
