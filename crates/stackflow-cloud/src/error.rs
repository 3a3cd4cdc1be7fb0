//! Engine error types

use crate::resource::ResourceId;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Classification of a control-plane failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Request was rate limited
    Throttled,
    /// Control plane has not caught up with a recent write yet
    EventualConsistency,
    /// Endpoint temporarily unavailable
    Unavailable,
    /// Declared configuration was rejected
    InvalidConfig,
    /// Account quota would be exceeded
    QuotaExceeded,
    /// Referenced resource does not exist
    NotFound,
    /// Any other non-retryable failure
    Permanent,
}

impl ErrorClass {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorClass::Throttled | ErrorClass::EventualConsistency | ErrorClass::Unavailable
        )
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::Throttled => write!(f, "throttled"),
            ErrorClass::EventualConsistency => write!(f, "eventual-consistency"),
            ErrorClass::Unavailable => write!(f, "unavailable"),
            ErrorClass::InvalidConfig => write!(f, "invalid-config"),
            ErrorClass::QuotaExceeded => write!(f, "quota-exceeded"),
            ErrorClass::NotFound => write!(f, "not-found"),
            ErrorClass::Permanent => write!(f, "permanent"),
        }
    }
}

/// Error returned by a control-plane backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{class}: {message}")]
pub struct ControlPlaneError {
    pub class: ErrorClass,
    pub message: String,
}

impl ControlPlaneError {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }

    pub fn throttled(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Throttled, message)
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvalidConfig, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::NotFound, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.class.is_retryable()
    }
}

/// Engine errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Dependency cycle detected: {}", format_cycle(.cycle))]
    CycleDetected { cycle: Vec<ResourceId> },

    #[error("{resource} depends on unknown resource {missing}")]
    UnknownDependency {
        resource: ResourceId,
        missing: ResourceId,
    },

    #[error("Resource declared twice: {0}")]
    DuplicateResource(ResourceId),

    #[error("Immutable field conflict on {resource}: {} (replace required)", .fields.join(", "))]
    ImmutableFieldConflict {
        resource: ResourceId,
        fields: Vec<String>,
    },

    #[error("Timed out after {waited:?} waiting for {resource} to settle")]
    ProvisioningTimeout {
        resource: ResourceId,
        waited: Duration,
    },

    #[error("Control plane error on {resource}: {source}")]
    ControlPlane {
        resource: ResourceId,
        #[source]
        source: ControlPlaneError,
    },

    #[error("{resource} is in failed state: {reason}")]
    ResourceFailed { resource: ResourceId, reason: String },

    #[error("{resource} cannot bind {attribute} from {producer}")]
    BindingUnresolved {
        resource: ResourceId,
        producer: ResourceId,
        attribute: String,
    },

    #[error("{resource} still has live dependents: {}", format_ids(.dependents))]
    HasLiveDependents {
        resource: ResourceId,
        dependents: Vec<ResourceId>,
    },

    #[error("Resource not in topology: {0}")]
    ResourceNotFound(ResourceId),

    #[error("Cancelled while reconciling {0}")]
    Cancelled(ResourceId),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// Short machine-readable name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            CloudError::CycleDetected { .. } => "cycle_detected",
            CloudError::UnknownDependency { .. } => "unknown_dependency",
            CloudError::DuplicateResource(_) => "duplicate_resource",
            CloudError::ImmutableFieldConflict { .. } => "immutable_field_conflict",
            CloudError::ProvisioningTimeout { .. } => "provisioning_timeout",
            CloudError::ControlPlane { .. } => "control_plane_error",
            CloudError::ResourceFailed { .. } => "resource_failed",
            CloudError::BindingUnresolved { .. } => "binding_unresolved",
            CloudError::HasLiveDependents { .. } => "has_live_dependents",
            CloudError::ResourceNotFound(_) => "resource_not_found",
            CloudError::Cancelled(_) => "cancelled",
            CloudError::StateError(_) => "state_error",
            CloudError::LockError(_) => "lock_error",
            CloudError::Io(_) => "io",
            CloudError::Json(_) => "json",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            CloudError::ControlPlane { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// True for errors raised while building the dependency graph
    pub fn is_graph_error(&self) -> bool {
        matches!(
            self,
            CloudError::CycleDetected { .. }
                | CloudError::UnknownDependency { .. }
                | CloudError::DuplicateResource(_)
        )
    }
}

fn format_cycle(cycle: &[ResourceId]) -> String {
    cycle
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn format_ids(ids: &[ResourceId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, CloudError>;
