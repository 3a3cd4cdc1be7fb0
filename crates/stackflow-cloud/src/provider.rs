//! Control-plane trait definition

use crate::error::{ControlPlaneError, ErrorClass};
use crate::resource::{Config, ResourceKind};
use crate::state::ResourceState;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub type ControlPlaneResult<T> = std::result::Result<T, ControlPlaneError>;

/// Cloud control-plane abstraction
///
/// Every backend (sandbox, Cloudflare DNS, ...) implements this trait. The
/// reconciler only ever talks to the cloud through it.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Returns the backend name (e.g., "sandbox", "cloudflare")
    fn name(&self) -> &str;

    /// Observe a resource by identity; `Missing` when it does not exist
    async fn describe(&self, kind: ResourceKind, name: &str) -> ControlPlaneResult<ResourceState>;

    /// Create a resource and return its provider ID
    async fn create(
        &self,
        kind: ResourceKind,
        name: &str,
        config: &Config,
    ) -> ControlPlaneResult<String>;

    /// Update a resource in place
    async fn update(&self, kind: ResourceKind, id: &str, config: &Config)
    -> ControlPlaneResult<()>;

    /// Delete a resource
    async fn delete(&self, kind: ResourceKind, id: &str) -> ControlPlaneResult<()>;

    /// Abort an in-flight operation in place; `false` when unsupported
    async fn cancel(&self, _kind: ResourceKind, _id: &str) -> ControlPlaneResult<bool> {
        Ok(false)
    }
}

/// Dispatches each resource kind to a backend
#[derive(Clone, Default)]
pub struct ControlPlaneRouter {
    default: Option<Arc<dyn ControlPlane>>,
    routes: HashMap<ResourceKind, Arc<dyn ControlPlane>>,
}

impl ControlPlaneRouter {
    pub fn new(default: Arc<dyn ControlPlane>) -> Self {
        Self {
            default: Some(default),
            routes: HashMap::new(),
        }
    }

    /// Router with no fallback; unrouted kinds are rejected
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn route(mut self, kind: ResourceKind, backend: Arc<dyn ControlPlane>) -> Self {
        self.routes.insert(kind, backend);
        self
    }

    /// Name of the backend serving `kind`
    pub fn backend_name(&self, kind: ResourceKind) -> Option<&str> {
        self.routes
            .get(&kind)
            .or(self.default.as_ref())
            .map(|b| b.name())
    }

    fn backend(&self, kind: ResourceKind) -> ControlPlaneResult<&Arc<dyn ControlPlane>> {
        self.routes
            .get(&kind)
            .or(self.default.as_ref())
            .ok_or_else(|| {
                ControlPlaneError::new(
                    ErrorClass::InvalidConfig,
                    format!("no control plane configured for {}", kind),
                )
            })
    }
}

#[async_trait]
impl ControlPlane for ControlPlaneRouter {
    fn name(&self) -> &str {
        "router"
    }

    async fn describe(&self, kind: ResourceKind, name: &str) -> ControlPlaneResult<ResourceState> {
        self.backend(kind)?.describe(kind, name).await
    }

    async fn create(
        &self,
        kind: ResourceKind,
        name: &str,
        config: &Config,
    ) -> ControlPlaneResult<String> {
        self.backend(kind)?.create(kind, name, config).await
    }

    async fn update(
        &self,
        kind: ResourceKind,
        id: &str,
        config: &Config,
    ) -> ControlPlaneResult<()> {
        self.backend(kind)?.update(kind, id, config).await
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> ControlPlaneResult<()> {
        self.backend(kind)?.delete(kind, id).await
    }

    async fn cancel(&self, kind: ResourceKind, id: &str) -> ControlPlaneResult<bool> {
        self.backend(kind)?.cancel(kind, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryControlPlane;
    use crate::state::ResourceStatus;

    #[tokio::test]
    async fn test_router_dispatches_by_kind() {
        let sandbox = Arc::new(InMemoryControlPlane::new());
        let dns = Arc::new(InMemoryControlPlane::named("dns"));
        let router = ControlPlaneRouter::new(sandbox.clone()).route(ResourceKind::DnsRecord, dns.clone());

        router
            .create(ResourceKind::DnsRecord, "shop.example.com", &Config::new())
            .await
            .unwrap();
        router
            .create(ResourceKind::Network, "shop-network", &Config::new())
            .await
            .unwrap();

        assert_eq!(dns.mutating_calls().len(), 1);
        assert_eq!(sandbox.mutating_calls().len(), 1);
        assert_eq!(router.backend_name(ResourceKind::DnsRecord), Some("dns"));
        assert_eq!(router.backend_name(ResourceKind::Network), Some("memory"));

        let state = router
            .describe(ResourceKind::DnsRecord, "shop.example.com")
            .await
            .unwrap();
        assert_eq!(state.status, ResourceStatus::Ready);
    }

    #[tokio::test]
    async fn test_empty_router_rejects_unrouted_kind() {
        let router = ControlPlaneRouter::empty();
        let err = router
            .describe(ResourceKind::Service, "svc")
            .await
            .unwrap_err();
        assert_eq!(err.class, ErrorClass::InvalidConfig);
    }
}
