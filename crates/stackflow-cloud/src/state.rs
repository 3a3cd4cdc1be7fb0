//! Observed resource state and the on-disk state store
//!
//! [`ResourceState`] is what the control plane reports for one resource.
//! [`StateManager`] persists snapshots under `.stackflow/` and guards them
//! with an advisory lock. The engine never treats a stored snapshot as the
//! truth about a live resource; only `describe` is authoritative.

use crate::error::{CloudError, Result};
use crate::resource::Config;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".stackflow";
const STATE_FILE: &str = "sandbox.json";
const STAGING_FILE: &str = "sandbox.json.tmp";
const LOCK_FILE: &str = "lock.json";

/// Lifecycle status of a resource as reported by the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Control plane has no such resource
    Missing,
    /// Resource is being created
    Creating,
    /// Resource is live and settled
    Ready,
    /// Resource is applying an update
    Updating,
    /// Resource is in an unrecoverable error state
    Failed,
    /// Resource is being deleted
    Deleting,
}

impl ResourceStatus {
    /// Creating, Updating or Deleting
    pub fn is_transitional(&self) -> bool {
        matches!(
            self,
            ResourceStatus::Creating | ResourceStatus::Updating | ResourceStatus::Deleting
        )
    }

    pub fn exists(&self) -> bool {
        !matches!(self, ResourceStatus::Missing)
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Missing => write!(f, "missing"),
            ResourceStatus::Creating => write!(f, "creating"),
            ResourceStatus::Ready => write!(f, "ready"),
            ResourceStatus::Updating => write!(f, "updating"),
            ResourceStatus::Failed => write!(f, "failed"),
            ResourceStatus::Deleting => write!(f, "deleting"),
        }
    }
}

/// Observed state of a single resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Provider-specific resource ID
    pub id: Option<String>,

    /// Current status
    pub status: ResourceStatus,

    /// Configuration as the control plane sees it
    pub observed: Config,

    /// Generated attributes (ARN, DNS name, URI, ...)
    pub attributes: BTreeMap<String, serde_json::Value>,

    /// Provider error message when `status` is `Failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When this observation was made
    pub observed_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn missing() -> Self {
        Self {
            id: None,
            status: ResourceStatus::Missing,
            observed: Config::new(),
            attributes: BTreeMap::new(),
            error: None,
            observed_at: Utc::now(),
        }
    }

    pub fn new(id: impl Into<String>, status: ResourceStatus) -> Self {
        Self {
            id: Some(id.into()),
            status,
            ..Self::missing()
        }
    }

    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_observed(mut self, observed: Config) -> Self {
        self.observed = observed;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn is_ready(&self) -> bool {
        self.status == ResourceStatus::Ready
    }

    pub fn get_attribute<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Versioned envelope for persisted snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot<T> {
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    pub data: T,
}

/// Who holds the sandbox, as written to `lock.json`
#[derive(Debug, Serialize, Deserialize)]
struct LockHolder {
    holder: String,
    acquired_at: DateTime<Utc>,
}

impl LockHolder {
    fn current() -> Self {
        Self {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("USER"))
                .unwrap_or_else(|_| format!("pid {}", std::process::id())),
            acquired_at: Utc::now(),
        }
    }

    fn is_stale(&self) -> bool {
        Utc::now().signed_duration_since(self.acquired_at) >= chrono::Duration::hours(1)
    }
}

/// Snapshot store rooted at `<project>/.stackflow`
#[derive(Debug, Clone)]
pub struct StateManager {
    dir: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            dir: project_root.as_ref().join(STATE_DIR),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.dir
    }

    /// Load the current snapshot, or the default when none exists yet
    pub async fn load<T: DeserializeOwned + Default>(&self) -> Result<T> {
        let path = self.dir.join(STATE_FILE);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(e.into()),
        };

        let snapshot: Snapshot<T> = serde_json::from_str(&content)?;
        if snapshot.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "{} was written by a newer stackflow (version {}, this build reads {})",
                path.display(),
                snapshot.version,
                STATE_VERSION
            )));
        }
        Ok(snapshot.data)
    }

    /// Replace the snapshot; readers see either the old or the new file
    pub async fn save<T: Serialize>(&self, data: &T) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;

        let content = serde_json::to_vec_pretty(&Snapshot {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            data,
        })?;
        let staging = self.dir.join(STAGING_FILE);
        fs::write(&staging, content).await?;
        fs::rename(&staging, self.dir.join(STATE_FILE)).await?;

        tracing::trace!(dir = %self.dir.display(), "sandbox snapshot saved");
        Ok(())
    }

    /// Take the advisory lock; a lock older than an hour is taken over
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(LOCK_FILE);
        let mine = serde_json::to_vec_pretty(&LockHolder::current())?;

        for _ in 0..2 {
            let created = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            match created {
                Ok(mut file) => {
                    file.write_all(&mine).await?;
                    tracing::debug!(path = %path.display(), "sandbox locked");
                    return Ok(StateLock { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let current: LockHolder =
                        serde_json::from_str(&fs::read_to_string(&path).await?)?;
                    if !current.is_stale() {
                        return Err(CloudError::LockError(format!(
                            "sandbox is locked by {} since {}",
                            current.holder, current.acquired_at
                        )));
                    }
                    tracing::warn!(holder = %current.holder, "taking over stale sandbox lock");
                    fs::remove_file(&path).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CloudError::LockError(format!(
            "could not lock {}",
            path.display()
        )))
    }
}

/// Held for the duration of a mutating command; unlocks on drop
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != ErrorKind::NotFound
        {
            tracing::warn!(error = %e, "failed to remove sandbox lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Sample {
        entries: BTreeMap<String, ResourceState>,
    }

    #[tokio::test]
    async fn test_state_save_load() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let mut sample = Sample::default();
        sample.entries.insert(
            "network:shop-network".to_string(),
            ResourceState::new("network-0001", ResourceStatus::Ready)
                .with_attribute("network_id", serde_json::json!("network-0001")),
        );

        manager.save(&sample).await.unwrap();
        manager.save(&sample).await.unwrap();
        assert!(!manager.state_dir().join(STAGING_FILE).exists());

        let loaded: Sample = manager.load().await.unwrap();
        let state = &loaded.entries["network:shop-network"];
        assert!(state.is_ready());
        assert_eq!(
            state.get_attribute::<String>("network_id").as_deref(),
            Some("network-0001")
        );
    }

    #[tokio::test]
    async fn test_empty_state() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let state: Sample = manager.load().await.unwrap();
        assert!(state.entries.is_empty());
    }

    #[tokio::test]
    async fn test_newer_state_version_rejected() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());
        std::fs::create_dir_all(manager.state_dir()).unwrap();
        std::fs::write(
            manager.state_dir().join(STATE_FILE),
            r#"{"version": 99, "updated_at": "2026-01-01T00:00:00Z", "data": {"entries": {}}}"#,
        )
        .unwrap();

        let err = manager.load::<Sample>().await.unwrap_err();
        assert!(matches!(err, CloudError::StateError(_)));
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_until_dropped() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let lock = manager.acquire_lock().await.unwrap();
        let err = manager.acquire_lock().await.unwrap_err();
        assert!(matches!(err, CloudError::LockError(_)));

        drop(lock);
        assert!(!manager.state_dir().join(LOCK_FILE).exists());
        let _again = manager.acquire_lock().await.unwrap();
    }

    #[tokio::test]
    async fn test_stale_lock_is_taken_over() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());
        std::fs::create_dir_all(manager.state_dir()).unwrap();
        std::fs::write(
            manager.state_dir().join(LOCK_FILE),
            r#"{"holder": "old-runner", "acquired_at": "2020-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let lock = manager.acquire_lock().await.unwrap();
        let content = std::fs::read_to_string(manager.state_dir().join(LOCK_FILE)).unwrap();
        assert!(!content.contains("old-runner"));
        drop(lock);
    }
}
