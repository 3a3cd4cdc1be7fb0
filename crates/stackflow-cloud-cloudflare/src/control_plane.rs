//! DNS records as a control-plane backend
//!
//! Serves the `dns-record` kind only. Cloudflare applies record changes
//! synchronously, so a record is either `Ready` or `Missing`.

use crate::dns::{CloudflareDns, DnsConfig, DnsRecordInfo};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::json;
use stackflow_cloud::{
    Config, ControlPlane, ControlPlaneError, ControlPlaneResult, ResourceKind, ResourceState,
    ResourceStatus,
};

const DEFAULT_TTL: u32 = 300;

/// Cloudflare DNS control plane
pub struct CloudflareDnsControlPlane {
    dns: CloudflareDns,
}

impl CloudflareDnsControlPlane {
    pub fn new(config: DnsConfig) -> Self {
        Self {
            dns: CloudflareDns::new(config),
        }
    }

    /// Build from `CLOUDFLARE_*` environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(DnsConfig::from_env()?))
    }

    pub fn dns(&self) -> &CloudflareDns {
        &self.dns
    }

    /// Configuration as the engine compares it against the declared one
    pub fn observed_config(&self, record: &DnsRecordInfo) -> Config {
        let mut observed = Config::new();
        observed.insert("zone".to_string(), json!(self.dns.domain()));
        if let Some(label) = self.dns.label_of(&record.name) {
            observed.insert("record_name".to_string(), json!(label));
        }
        observed.insert("record_type".to_string(), json!(record.record_type));
        observed.insert("ttl".to_string(), json!(record.ttl));
        observed.insert("target".to_string(), json!(record.content));
        observed
    }

    fn check_kind(kind: ResourceKind) -> ControlPlaneResult<()> {
        if kind != ResourceKind::DnsRecord {
            return Err(ControlPlaneError::invalid_config(format!(
                "cloudflare backend does not manage {}",
                kind
            )));
        }
        Ok(())
    }

    fn check_zone(&self, name: &str, config: &Config) -> ControlPlaneResult<()> {
        if let Some(zone) = config.get("zone").and_then(|v| v.as_str()) {
            if zone != self.dns.domain() {
                return Err(ControlPlaneError::invalid_config(format!(
                    "zone '{}' is not managed by this account (configured: {})",
                    zone,
                    self.dns.domain()
                )));
            }
        }
        if !self.dns.in_zone(name) {
            return Err(ControlPlaneError::invalid_config(format!(
                "{} is outside zone {}",
                name,
                self.dns.domain()
            )));
        }
        Ok(())
    }
}

fn target(config: &Config) -> ControlPlaneResult<Option<&str>> {
    match config.get("target") {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| ControlPlaneError::invalid_config("target must be a host name")),
    }
}

fn ttl(config: &Config) -> ControlPlaneResult<Option<u32>> {
    match config.get("ttl") {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|t| u32::try_from(t).ok())
            .map(Some)
            .ok_or_else(|| ControlPlaneError::invalid_config("ttl must be a positive integer")),
    }
}

#[async_trait]
impl ControlPlane for CloudflareDnsControlPlane {
    fn name(&self) -> &str {
        "cloudflare"
    }

    async fn describe(&self, kind: ResourceKind, name: &str) -> ControlPlaneResult<ResourceState> {
        Self::check_kind(kind)?;
        let Some(record) = self.dns.find_record(name).await? else {
            return Ok(ResourceState::missing());
        };

        Ok(ResourceState::new(&record.id, ResourceStatus::Ready)
            .with_observed(self.observed_config(&record))
            .with_attribute("fqdn", json!(record.name)))
    }

    async fn create(
        &self,
        kind: ResourceKind,
        name: &str,
        config: &Config,
    ) -> ControlPlaneResult<String> {
        Self::check_kind(kind)?;
        self.check_zone(name, config)?;

        let content = target(config)?
            .ok_or_else(|| ControlPlaneError::invalid_config(format!("{} has no target", name)))?;
        let record_type = config
            .get("record_type")
            .and_then(|v| v.as_str())
            .unwrap_or("CNAME");
        let ttl = ttl(config)?.unwrap_or(DEFAULT_TTL);

        let record = self
            .dns
            .create_record(record_type, name, content, ttl)
            .await?;
        Ok(record.id)
    }

    async fn update(
        &self,
        kind: ResourceKind,
        id: &str,
        config: &Config,
    ) -> ControlPlaneResult<()> {
        Self::check_kind(kind)?;
        self.dns
            .update_record(id, target(config)?, ttl(config)?)
            .await?;
        Ok(())
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> ControlPlaneResult<()> {
        Self::check_kind(kind)?;
        self.dns.delete_record(id).await?;
        Ok(())
    }
}
