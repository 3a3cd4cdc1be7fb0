//! File-backed sandbox control plane
//!
//! The in-memory backend persisted under `.stackflow/sandbox.json`, so that
//! successive CLI runs see the resources earlier runs created.

use crate::error::{ControlPlaneError, ErrorClass, Result};
use crate::memory::{InMemoryControlPlane, MemorySnapshot, StoredResource};
use crate::provider::{ControlPlane, ControlPlaneResult};
use crate::resource::{Config, ResourceKind};
use crate::state::{ResourceState, StateLock, StateManager};
use async_trait::async_trait;
use std::path::Path;
use tokio::sync::Mutex;

pub struct SandboxControlPlane {
    backend: InMemoryControlPlane,
    state: StateManager,
    save: Mutex<()>,
}

impl SandboxControlPlane {
    /// Load the sandbox of `project_root`, empty when none was saved yet
    pub async fn open(project_root: impl AsRef<Path>) -> Result<Self> {
        let state = StateManager::new(project_root);
        let snapshot: MemorySnapshot = state.load().await?;
        tracing::debug!(
            resources = snapshot.resources.len(),
            "Opened sandbox at {}",
            state.state_dir().display()
        );
        Ok(Self {
            backend: InMemoryControlPlane::from_snapshot("sandbox", snapshot),
            state,
            save: Mutex::new(()),
        })
    }

    pub fn with_settle_after(mut self, describes: u32) -> Self {
        self.backend = self.backend.with_settle_after(describes);
        self
    }

    pub fn backend(&self) -> &InMemoryControlPlane {
        &self.backend
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Take the sandbox lock for the duration of a mutating command
    pub async fn lock(&self) -> Result<StateLock> {
        self.state.acquire_lock().await
    }

    pub fn resources(&self) -> Vec<StoredResource> {
        self.backend.snapshot().resources
    }

    async fn persist(&self) -> ControlPlaneResult<()> {
        let _guard = self.save.lock().await;
        self.state
            .save(&self.backend.snapshot())
            .await
            .map_err(|e| {
                ControlPlaneError::new(
                    ErrorClass::Permanent,
                    format!("failed to persist sandbox: {}", e),
                )
            })
    }
}

#[async_trait]
impl ControlPlane for SandboxControlPlane {
    fn name(&self) -> &str {
        self.backend.name()
    }

    async fn describe(&self, kind: ResourceKind, name: &str) -> ControlPlaneResult<ResourceState> {
        // describing may settle a transitional resource
        let state = self.backend.describe(kind, name).await?;
        self.persist().await?;
        Ok(state)
    }

    async fn create(
        &self,
        kind: ResourceKind,
        name: &str,
        config: &Config,
    ) -> ControlPlaneResult<String> {
        let id = self.backend.create(kind, name, config).await?;
        self.persist().await?;
        Ok(id)
    }

    async fn update(
        &self,
        kind: ResourceKind,
        id: &str,
        config: &Config,
    ) -> ControlPlaneResult<()> {
        self.backend.update(kind, id, config).await?;
        self.persist().await
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> ControlPlaneResult<()> {
        self.backend.delete(kind, id).await?;
        self.persist().await
    }

    async fn cancel(&self, kind: ResourceKind, id: &str) -> ControlPlaneResult<bool> {
        let cancelled = self.backend.cancel(kind, id).await?;
        if cancelled {
            self.persist().await?;
        }
        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceId;
    use crate::state::ResourceStatus;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_sandbox_survives_reopen() {
        let temp_dir = tempdir().unwrap();

        let sandbox = SandboxControlPlane::open(temp_dir.path()).await.unwrap();
        let id = sandbox
            .create(ResourceKind::Registry, "shop-registry", &Config::new())
            .await
            .unwrap();
        assert_eq!(
            sandbox
                .describe(ResourceKind::Registry, "shop-registry")
                .await
                .unwrap()
                .status,
            ResourceStatus::Ready
        );
        drop(sandbox);

        let reopened = SandboxControlPlane::open(temp_dir.path()).await.unwrap();
        let state = reopened
            .describe(ResourceKind::Registry, "shop-registry")
            .await
            .unwrap();
        assert_eq!(state.id.as_deref(), Some(id.as_str()));
        assert_eq!(reopened.resources().len(), 1);
        assert!(
            reopened
                .backend()
                .peek(&ResourceId::new(ResourceKind::Registry, "shop-registry"))
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_sandbox_lock() {
        let temp_dir = tempdir().unwrap();
        let sandbox = SandboxControlPlane::open(temp_dir.path()).await.unwrap();

        let lock = sandbox.lock().await.unwrap();
        assert!(sandbox.lock().await.is_err());
        drop(lock);
        assert!(sandbox.lock().await.is_ok());
    }
}
