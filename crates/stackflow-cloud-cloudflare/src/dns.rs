//! Cloudflare DNS API client
//!
//! Thin wrapper over the zone `dns_records` endpoints. Records are addressed
//! by their fully qualified name; the record ID returned by Cloudflare is the
//! provider ID the engine stores.

use crate::error::{CloudflareError, Result};
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// A DNS record as Cloudflare reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecordInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub content: String,
    pub ttl: u32,
    #[serde(default)]
    pub proxied: bool,
}

/// Configuration for the DNS client
#[derive(Debug, Clone)]
pub struct DnsConfig {
    pub api_token: String,
    pub zone_id: String,
    /// Zone apex, e.g. `example.com`
    pub domain: String,
    pub base_url: String,
}

impl DnsConfig {
    pub fn new(
        api_token: impl Into<String>,
        zone_id: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            api_token: api_token.into(),
            zone_id: zone_id.into(),
            domain: domain.into(),
            base_url: CLOUDFLARE_API_BASE.to_string(),
        }
    }

    /// Read `CLOUDFLARE_API_TOKEN`, `CLOUDFLARE_ZONE_ID` and `CLOUDFLARE_DOMAIN`
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| CloudflareError::MissingEnvVar(name.to_string()))
        };
        let mut config = Self::new(
            var("CLOUDFLARE_API_TOKEN")?,
            var("CLOUDFLARE_ZONE_ID")?,
            var("CLOUDFLARE_DOMAIN")?,
        );
        if let Ok(base_url) = std::env::var("CLOUDFLARE_API_BASE") {
            config.base_url = base_url;
        }
        Ok(config)
    }

    /// True when all credentials are present in the environment
    pub fn is_configured() -> bool {
        Self::from_env().is_ok()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Cloudflare DNS client
pub struct CloudflareDns {
    client: reqwest::Client,
    config: DnsConfig,
}

impl CloudflareDns {
    pub fn new(config: DnsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn domain(&self) -> &str {
        &self.config.domain
    }

    /// Fully qualified name for a label; `None` is the zone apex
    pub fn full_domain(&self, label: Option<&str>) -> String {
        match label {
            Some(label) if !label.is_empty() => format!("{}.{}", label, self.config.domain),
            _ => self.config.domain.clone(),
        }
    }

    /// Label of a fully qualified name within this zone
    pub fn label_of<'a>(&self, fqdn: &'a str) -> Option<&'a str> {
        fqdn.strip_suffix(self.config.domain.as_str())
            .and_then(|rest| rest.strip_suffix('.'))
            .filter(|label| !label.is_empty())
    }

    /// True when `fqdn` is the apex or a name under it
    pub fn in_zone(&self, fqdn: &str) -> bool {
        fqdn == self.config.domain || self.label_of(fqdn).is_some()
    }

    fn records_url(&self) -> String {
        format!(
            "{}/zones/{}/dns_records",
            self.config.base_url.trim_end_matches('/'),
            self.config.zone_id
        )
    }

    fn record_url(&self, record_id: &str) -> String {
        format!("{}/{}", self.records_url(), record_id)
    }

    /// Find a record by fully qualified name
    pub async fn find_record(&self, fqdn: &str) -> Result<Option<DnsRecordInfo>> {
        let url = Url::parse_with_params(&self.records_url(), &[("name", fqdn)])
            .map_err(|e| CloudflareError::InvalidConfig(format!("bad API URL: {}", e)))?;

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;

        let records: Vec<DnsRecordInfo> = decode(response).await?;
        Ok(records.into_iter().next())
    }

    /// Create a record
    pub async fn create_record(
        &self,
        record_type: &str,
        fqdn: &str,
        content: &str,
        ttl: u32,
    ) -> Result<DnsRecordInfo> {
        let body = CreateDnsRecordRequest {
            record_type,
            name: fqdn,
            content,
            ttl,
            proxied: false,
        };

        let response = self
            .client
            .post(self.records_url())
            .bearer_auth(&self.config.api_token)
            .json(&body)
            .send()
            .await?;

        let record = decode(response).await?;
        tracing::info!(name = fqdn, record_type, content, "Created DNS record");
        Ok(record)
    }

    /// Update the content and TTL of a record
    pub async fn update_record(
        &self,
        record_id: &str,
        content: Option<&str>,
        ttl: Option<u32>,
    ) -> Result<DnsRecordInfo> {
        let body = UpdateDnsRecordRequest { content, ttl };

        let response = self
            .client
            .patch(self.record_url(record_id))
            .bearer_auth(&self.config.api_token)
            .json(&body)
            .send()
            .await?;

        let record = decode(response).await?;
        tracing::info!(record_id, "Updated DNS record");
        Ok(record)
    }

    /// Delete a record
    pub async fn delete_record(&self, record_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.record_url(record_id))
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;

        let _: DeleteResult = decode(response).await?;
        tracing::info!(record_id, "Deleted DNS record");
        Ok(())
    }
}

/// Check the HTTP status before decoding the envelope
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<ApiEnvelope>(&body)
            .ok()
            .and_then(|e| e.first_error())
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        return Err(CloudflareError::Api {
            status: Some(status.as_u16()),
            message,
        });
    }

    let envelope: ApiResponse<T> = serde_json::from_str(&body)?;
    if !envelope.success {
        return Err(CloudflareError::Api {
            status: None,
            message: envelope
                .errors
                .first()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "Unknown error".to_string()),
        });
    }
    envelope
        .result
        .ok_or_else(|| CloudflareError::Api {
            status: None,
            message: "response carried no result".to_string(),
        })
}

// ============ API Types ============

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    result: Option<T>,
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    errors: Vec<ApiError>,
}

impl ApiEnvelope {
    fn first_error(self) -> Option<String> {
        self.errors
            .into_iter()
            .next()
            .map(|e| format!("{} (code {})", e.message, e.code))
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    message: String,
}

#[derive(Debug, Serialize)]
struct CreateDnsRecordRequest<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    proxied: bool,
}

#[derive(Debug, Serialize)]
struct UpdateDnsRecordRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct DeleteResult {
    #[allow(dead_code)]
    id: String,
}
