//! Plans, per-resource outcomes and apply reports

use crate::binder::Outputs;
use crate::error::CloudError;
use crate::resource::ResourceId;
use crate::state::ResourceStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Action decided for a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Update an existing resource in place
    Update,
    /// No changes needed
    NoOp,
    /// An immutable field diverged; needs an operator-confirmed replace
    ReplaceRequired,
    /// Resource is mid-transition; wait and re-check
    Await,
    /// Control plane reports the resource as failed
    Failed,
    /// Delete the resource (decommission only)
    Delete,
}

impl ActionType {
    /// Whether carrying out this action calls a mutating control-plane API
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            ActionType::Create | ActionType::Update | ActionType::Delete
        )
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::NoOp => write!(f, "no-op"),
            ActionType::ReplaceRequired => write!(f, "replace-required"),
            ActionType::Await => write!(f, "await"),
            ActionType::Failed => write!(f, "failed"),
            ActionType::Delete => write!(f, "delete"),
        }
    }
}

/// One diverging field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub before: Option<serde_json::Value>,
    /// `None` when the value is only known after apply
    pub after: Option<serde_json::Value>,
    pub immutable: bool,
}

/// Planned action for one resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedAction {
    pub resource: ResourceId,
    pub action: ActionType,
    /// Status reported by `describe`
    pub observed_status: ResourceStatus,
    pub changes: Vec<FieldChange>,
    /// Bound fields whose producer is not ready yet
    pub pending_bindings: Vec<String>,
}

/// Plan containing the decided action of every resource, in dependency order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub actions: Vec<PlannedAction>,

    /// Whether the plan has any changes
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<PlannedAction>) -> Self {
        let has_changes = actions.iter().any(|a| a.action != ActionType::NoOp);
        Self {
            actions,
            has_changes,
        }
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&PlannedAction> {
        self.actions
            .iter()
            .filter(|a| a.action == action_type)
            .collect()
    }

    pub fn action_for(&self, id: &ResourceId) -> Option<&PlannedAction> {
        self.actions.iter().find(|a| &a.resource == id)
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            update: self.actions_by_type(ActionType::Update).len(),
            replace: self.actions_by_type(ActionType::ReplaceRequired).len(),
            no_change: self.actions_by_type(ActionType::NoOp).len(),
            waiting: self.actions_by_type(ActionType::Await).len(),
            failed: self.actions_by_type(ActionType::Failed).len(),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub no_change: usize,
    pub waiting: usize,
    pub failed: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} need replace, {} unchanged",
            self.create, self.update, self.replace, self.no_change
        )?;
        if self.waiting > 0 {
            write!(f, ", {} in progress", self.waiting)?;
        }
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        Ok(())
    }
}

/// Terminal status of a resource at the end of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Converged and live
    Ready,
    /// Reconciliation failed
    Failed,
    /// Not attempted because a dependency did not become ready
    Blocked,
    /// Not attempted because the pass was cancelled
    Cancelled,
    /// Cancelled while a control-plane operation was in flight
    Interrupted,
    /// Removed by a decommission
    Deleted,
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeStatus::Ready => write!(f, "ready"),
            OutcomeStatus::Failed => write!(f, "failed"),
            OutcomeStatus::Blocked => write!(f, "blocked"),
            OutcomeStatus::Cancelled => write!(f, "cancelled"),
            OutcomeStatus::Interrupted => write!(f, "interrupted"),
            OutcomeStatus::Deleted => write!(f, "deleted"),
        }
    }
}

/// Preserved error of a failed resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Error variant name (e.g. "provisioning_timeout")
    pub kind: String,
    pub message: String,
    pub retryable: bool,
}

impl From<&CloudError> for Failure {
    fn from(err: &CloudError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// Result of a single resource in a pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceOutcome {
    pub resource: ResourceId,
    pub status: OutcomeStatus,

    /// Action actually carried out
    pub action: ActionType,

    /// Provider ID, when the resource exists
    pub id: Option<String>,

    /// Last status the control plane reported
    pub observed_status: Option<ResourceStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,

    /// Producer that blocked this resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<ResourceId>,
}

impl ResourceOutcome {
    pub fn new(resource: ResourceId, status: OutcomeStatus, action: ActionType) -> Self {
        Self {
            resource,
            status,
            action,
            id: None,
            observed_status: None,
            failure: None,
            blocked_by: None,
        }
    }

    pub fn with_error(mut self, err: &CloudError) -> Self {
        self.failure = Some(Failure::from(err));
        self
    }
}

/// Result of an apply (or destroy) pass
#[derive(Debug, Clone, Serialize)]
pub struct ApplyResult {
    /// Every resource of the topology, in dependency order
    pub resources: Vec<ResourceOutcome>,

    /// Attributes of the resources that are ready
    pub outputs: Outputs,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        self.resources
            .iter()
            .all(|r| matches!(r.status, OutcomeStatus::Ready | OutcomeStatus::Deleted))
    }

    pub fn outcome(&self, id: &ResourceId) -> Option<&ResourceOutcome> {
        self.resources.iter().find(|r| &r.resource == id)
    }

    pub fn with_status(&self, status: OutcomeStatus) -> Vec<&ResourceOutcome> {
        self.resources.iter().filter(|r| r.status == status).collect()
    }

    /// Count of outcomes per status
    pub fn counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for r in &self.resources {
            *counts.entry(r.status.to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Outputs on full convergence, otherwise the per-resource report
    pub fn into_result(self) -> std::result::Result<Outputs, PartialFailureReport> {
        if self.is_success() {
            Ok(self.outputs)
        } else {
            Err(PartialFailureReport {
                resources: self.resources,
                outputs: self.outputs,
            })
        }
    }
}

/// Per-resource terminal statuses of a pass that did not fully converge
#[derive(Debug, Clone, Serialize)]
pub struct PartialFailureReport {
    pub resources: Vec<ResourceOutcome>,

    /// Attributes of the resources that did become ready
    pub outputs: Outputs,
}

impl PartialFailureReport {
    pub fn failed(&self) -> Vec<&ResourceOutcome> {
        self.resources
            .iter()
            .filter(|r| !matches!(r.status, OutcomeStatus::Ready | OutcomeStatus::Deleted))
            .collect()
    }
}

impl std::fmt::Display for PartialFailureReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let failed = self.failed();
        write!(
            f,
            "{} of {} resources did not converge:",
            failed.len(),
            self.resources.len()
        )?;
        for r in failed {
            write!(f, " {} ({})", r.resource, r.status)?;
        }
        Ok(())
    }
}

impl std::error::Error for PartialFailureReport {}
