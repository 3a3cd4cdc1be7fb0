//! In-memory control plane
//!
//! A deterministic stand-in for a real cloud. Resources move through
//! `Creating`/`Updating`/`Deleting` and settle after a configurable number
//! of `describe` calls. Every call is logged so tests can assert exactly
//! which mutations an apply issued, and faults can be injected per call.

use crate::error::{ControlPlaneError, ErrorClass};
use crate::provider::{ControlPlane, ControlPlaneResult};
use crate::resource::{Config, ResourceId, ResourceKind};
use crate::state::{ResourceState, ResourceStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// Control-plane operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Describe,
    Create,
    Update,
    Delete,
    Cancel,
}

impl Operation {
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Operation::Create | Operation::Update | Operation::Delete
        )
    }
}

/// One logged control-plane call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Operation,
    pub resource: ResourceId,
}

/// A resource as stored by the in-memory backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResource {
    pub id: String,
    pub resource: ResourceId,
    pub status: ResourceStatus,
    pub config: Config,
    pub attributes: BTreeMap<String, serde_json::Value>,
    /// Describes left before a transitional status settles
    pub pending_describes: u32,
    pub revision: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StoredResource {
    fn to_state(&self) -> ResourceState {
        let mut state = ResourceState::new(self.id.clone(), self.status)
            .with_observed(self.config.clone());
        state.attributes = self.attributes.clone();
        state.error = self.error.clone();
        state
    }
}

/// Serializable contents of the backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub next_id: u64,
    pub resources: Vec<StoredResource>,
}

#[derive(Debug, Clone)]
struct Fault {
    op: Operation,
    resource: ResourceId,
    error: ControlPlaneError,
    /// `None` fails every matching call
    remaining: Option<u32>,
    /// Perform the operation before reporting the error
    apply_anyway: bool,
}

#[derive(Debug, Default)]
struct Inner {
    resources: BTreeMap<ResourceId, StoredResource>,
    next_id: u64,
    calls: Vec<Call>,
    faults: Vec<Fault>,
    settle_after: u32,
    stalled: HashSet<ResourceId>,
    fail_on_settle: BTreeMap<ResourceId, String>,
    cancellable: bool,
}

impl Inner {
    fn take_fault(&mut self, op: Operation, resource: &ResourceId) -> Option<Fault> {
        let pos = self
            .faults
            .iter()
            .position(|f| f.op == op && &f.resource == resource)?;
        let fault = self.faults[pos].clone();
        match fault.remaining {
            Some(n) if n <= 1 => {
                self.faults.remove(pos);
            }
            Some(n) => self.faults[pos].remaining = Some(n - 1),
            None => {}
        }
        Some(fault)
    }

    fn resource_by_id(&self, id: &str) -> Option<ResourceId> {
        self.resources
            .values()
            .find(|r| r.id == id)
            .map(|r| r.resource.clone())
    }

    fn settle(&mut self, resource: &ResourceId) {
        if self.stalled.contains(resource) {
            return;
        }
        let failure = self.fail_on_settle.get(resource).cloned();
        let Some(stored) = self.resources.get_mut(resource) else {
            return;
        };
        if !stored.status.is_transitional() {
            return;
        }
        if stored.pending_describes > 0 {
            stored.pending_describes -= 1;
            return;
        }
        match stored.status {
            ResourceStatus::Deleting => {
                self.resources.remove(resource);
            }
            _ => {
                if let Some(reason) = failure {
                    stored.status = ResourceStatus::Failed;
                    stored.error = Some(reason);
                } else {
                    stored.status = ResourceStatus::Ready;
                }
            }
        }
    }
}

/// In-memory control plane
#[derive(Debug)]
pub struct InMemoryControlPlane {
    name: String,
    inner: Mutex<Inner>,
}

impl Default for InMemoryControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryControlPlane {
    pub fn new() -> Self {
        Self::named("memory")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(Inner {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Rebuild a backend from a snapshot
    pub fn from_snapshot(name: impl Into<String>, snapshot: MemorySnapshot) -> Self {
        let backend = Self::named(name);
        {
            let mut inner = backend.lock();
            inner.next_id = snapshot.next_id.max(1);
            inner.resources = snapshot
                .resources
                .into_iter()
                .map(|r| (r.resource.clone(), r))
                .collect();
        }
        backend
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // a poisoned lock only means a test panicked mid-call
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Transitional statuses stay visible for `describes` describe calls
    pub fn with_settle_after(self, describes: u32) -> Self {
        self.lock().settle_after = describes;
        self
    }

    /// Allow in-place cancellation of in-flight creates and updates
    pub fn with_cancel_support(self) -> Self {
        self.lock().cancellable = true;
        self
    }

    /// Fail the next `op` on `resource`
    pub fn fail_next(&self, op: Operation, resource: ResourceId, error: ControlPlaneError) {
        self.push_fault(op, resource, error, Some(1), false);
    }

    /// Fail every `op` on `resource`
    pub fn fail_always(&self, op: Operation, resource: ResourceId, error: ControlPlaneError) {
        self.push_fault(op, resource, error, None, false);
    }

    /// Perform the next `op` on `resource` but report `error` to the caller
    pub fn fail_next_after_apply(
        &self,
        op: Operation,
        resource: ResourceId,
        error: ControlPlaneError,
    ) {
        self.push_fault(op, resource, error, Some(1), true);
    }

    fn push_fault(
        &self,
        op: Operation,
        resource: ResourceId,
        error: ControlPlaneError,
        remaining: Option<u32>,
        apply_anyway: bool,
    ) {
        self.lock().faults.push(Fault {
            op,
            resource,
            error,
            remaining,
            apply_anyway,
        });
    }

    /// The resource settles into `Failed` instead of `Ready`
    pub fn fail_on_settle(&self, resource: ResourceId, reason: impl Into<String>) {
        self.lock().fail_on_settle.insert(resource, reason.into());
    }

    /// The resource never leaves its transitional status
    pub fn stall(&self, resource: ResourceId) {
        self.lock().stalled.insert(resource);
    }

    /// Insert a live resource directly
    pub fn seed(&self, resource: ResourceId, status: ResourceStatus, config: Config) -> String {
        let mut inner = self.lock();
        let id = format!("{}-{:04}", resource.kind, inner.next_id);
        inner.next_id += 1;
        let attributes = generate_attributes(&resource, &id, 1, &config);
        inner.resources.insert(
            resource.clone(),
            StoredResource {
                id: id.clone(),
                resource,
                status,
                config,
                attributes,
                pending_describes: 0,
                revision: 1,
                error: None,
            },
        );
        id
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Create/update/delete calls made so far
    pub fn mutating_calls(&self) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.op.is_mutating())
            .cloned()
            .collect()
    }

    pub fn calls_for(&self, resource: &ResourceId) -> Vec<Operation> {
        self.lock()
            .calls
            .iter()
            .filter(|c| &c.resource == resource)
            .map(|c| c.op)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Current stored state, without settling anything or logging a call
    pub fn peek(&self, resource: &ResourceId) -> Option<StoredResource> {
        self.lock().resources.get(resource).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        let inner = self.lock();
        MemorySnapshot {
            next_id: inner.next_id,
            resources: inner.resources.values().cloned().collect(),
        }
    }
}

#[async_trait]
impl ControlPlane for InMemoryControlPlane {
    fn name(&self) -> &str {
        &self.name
    }

    async fn describe(&self, kind: ResourceKind, name: &str) -> ControlPlaneResult<ResourceState> {
        let resource = ResourceId::new(kind, name);
        let mut inner = self.lock();
        inner.calls.push(Call {
            op: Operation::Describe,
            resource: resource.clone(),
        });
        if let Some(fault) = inner.take_fault(Operation::Describe, &resource) {
            return Err(fault.error);
        }

        inner.settle(&resource);
        Ok(inner
            .resources
            .get(&resource)
            .map(StoredResource::to_state)
            .unwrap_or_else(ResourceState::missing))
    }

    async fn create(
        &self,
        kind: ResourceKind,
        name: &str,
        config: &Config,
    ) -> ControlPlaneResult<String> {
        let resource = ResourceId::new(kind, name);
        let mut inner = self.lock();
        inner.calls.push(Call {
            op: Operation::Create,
            resource: resource.clone(),
        });
        let fault = inner.take_fault(Operation::Create, &resource);
        if let Some(fault) = &fault
            && !fault.apply_anyway
        {
            return Err(fault.error.clone());
        }

        if inner.resources.contains_key(&resource) {
            return Err(ControlPlaneError::new(
                ErrorClass::Permanent,
                format!("{} already exists", resource),
            ));
        }

        let id = format!("{}-{:04}", kind, inner.next_id);
        inner.next_id += 1;
        let attributes = generate_attributes(&resource, &id, 1, config);
        let pending_describes = inner.settle_after;
        inner.resources.insert(
            resource.clone(),
            StoredResource {
                id: id.clone(),
                resource,
                status: ResourceStatus::Creating,
                config: config.clone(),
                attributes,
                pending_describes,
                revision: 1,
                error: None,
            },
        );

        match fault {
            Some(fault) => Err(fault.error),
            None => Ok(id),
        }
    }

    async fn update(
        &self,
        kind: ResourceKind,
        id: &str,
        config: &Config,
    ) -> ControlPlaneResult<()> {
        let mut inner = self.lock();
        let resource = inner
            .resource_by_id(id)
            .filter(|r| r.kind == kind)
            .ok_or_else(|| ControlPlaneError::not_found(format!("{} {} not found", kind, id)))?;
        inner.calls.push(Call {
            op: Operation::Update,
            resource: resource.clone(),
        });
        let fault = inner.take_fault(Operation::Update, &resource);
        if let Some(fault) = &fault
            && !fault.apply_anyway
        {
            return Err(fault.error.clone());
        }

        let pending_describes = inner.settle_after;
        if let Some(stored) = inner.resources.get_mut(&resource) {
            stored.revision += 1;
            stored.config = config.clone();
            stored.attributes = generate_attributes(&resource, id, stored.revision, config);
            stored.status = ResourceStatus::Updating;
            stored.pending_describes = pending_describes;
        }

        match fault {
            Some(fault) => Err(fault.error),
            None => Ok(()),
        }
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> ControlPlaneResult<()> {
        let mut inner = self.lock();
        let resource = inner
            .resource_by_id(id)
            .filter(|r| r.kind == kind)
            .ok_or_else(|| ControlPlaneError::not_found(format!("{} {} not found", kind, id)))?;
        inner.calls.push(Call {
            op: Operation::Delete,
            resource: resource.clone(),
        });
        if let Some(fault) = inner.take_fault(Operation::Delete, &resource) {
            return Err(fault.error);
        }

        let pending_describes = inner.settle_after;
        if let Some(stored) = inner.resources.get_mut(&resource) {
            stored.status = ResourceStatus::Deleting;
            stored.pending_describes = pending_describes;
        }
        Ok(())
    }

    async fn cancel(&self, kind: ResourceKind, id: &str) -> ControlPlaneResult<bool> {
        let mut inner = self.lock();
        let Some(resource) = inner.resource_by_id(id).filter(|r| r.kind == kind) else {
            return Ok(false);
        };
        inner.calls.push(Call {
            op: Operation::Cancel,
            resource: resource.clone(),
        });
        if !inner.cancellable {
            return Ok(false);
        }

        let status = inner.resources.get(&resource).map(|r| r.status);
        match status {
            Some(ResourceStatus::Creating) => {
                inner.resources.remove(&resource);
                inner.stalled.remove(&resource);
                Ok(true)
            }
            Some(ResourceStatus::Updating) => {
                if let Some(stored) = inner.resources.get_mut(&resource) {
                    stored.status = ResourceStatus::Ready;
                }
                inner.stalled.remove(&resource);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Attributes the sandbox cloud generates for each kind
fn generate_attributes(
    resource: &ResourceId,
    id: &str,
    revision: u32,
    config: &Config,
) -> BTreeMap<String, serde_json::Value> {
    let name = resource.name.as_str();
    let config_str = |key: &str| config.get(key).and_then(|v| v.as_str()).unwrap_or(name);
    let arn = |service: &str| format!("arn:sandbox:{}:{}/{}", service, id, name);

    let mut attributes = BTreeMap::new();
    match resource.kind {
        ResourceKind::Network => {
            attributes.insert("network_id".to_string(), json!(id));
        }
        ResourceKind::Registry => {
            attributes.insert(
                "repository_uri".to_string(),
                json!(format!(
                    "registry.sandbox.local/{}",
                    config_str("repository_name")
                )),
            );
        }
        ResourceKind::Cluster => {
            attributes.insert("cluster_arn".to_string(), json!(arn("cluster")));
        }
        ResourceKind::TaskDefinition => {
            attributes.insert(
                "task_definition_arn".to_string(),
                json!(format!(
                    "arn:sandbox:task-definition/{}:{}",
                    config_str("family"),
                    revision
                )),
            );
        }
        ResourceKind::Service => {
            attributes.insert("service_arn".to_string(), json!(arn("service")));
            attributes.insert(
                "load_balancer_dns".to_string(),
                json!(format!("{}-{}.lb.sandbox.local", name, id)),
            );
        }
        ResourceKind::Certificate => {
            attributes.insert("certificate_arn".to_string(), json!(arn("certificate")));
        }
        ResourceKind::DnsRecord => {
            let fqdn = match (
                config.get("record_name").and_then(|v| v.as_str()),
                config.get("zone").and_then(|v| v.as_str()),
            ) {
                (Some(record), Some(zone)) => format!("{}.{}", record, zone),
                _ => name.to_string(),
            };
            attributes.insert("fqdn".to_string(), json!(fqdn));
        }
    }
    attributes
}
