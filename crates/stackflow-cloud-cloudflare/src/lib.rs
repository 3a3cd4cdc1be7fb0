//! Cloudflare backend for stackflow
//!
//! Manages DNS records through the Cloudflare API and exposes them to the
//! engine as a [`ControlPlane`](stackflow_cloud::ControlPlane) serving the
//! `dns-record` kind.
//!
//! # Requirements
//!
//! `CLOUDFLARE_API_TOKEN`, `CLOUDFLARE_ZONE_ID` and `CLOUDFLARE_DOMAIN`
//! must be set. `CLOUDFLARE_API_BASE` overrides the API endpoint.
//!
//! # Example
//!
//! ```ignore
//! use stackflow_cloud::{ControlPlaneRouter, ResourceKind};
//! use stackflow_cloud_cloudflare::CloudflareDnsControlPlane;
//!
//! let dns = Arc::new(CloudflareDnsControlPlane::from_env()?);
//! let router = ControlPlaneRouter::new(sandbox).route(ResourceKind::DnsRecord, dns);
//! ```

pub mod control_plane;
pub mod dns;
pub mod error;

pub use control_plane::CloudflareDnsControlPlane;
pub use dns::{CloudflareDns, DnsConfig, DnsRecordInfo};
pub use error::{CloudflareError, Result};
