//! StackFlow Cloud Engine
//!
//! Declarative provisioning of interdependent cloud resources. A
//! [`Topology`] of resource descriptors is sorted by dependency, each
//! resource is reconciled against what the control plane reports, and the
//! attributes of ready resources are bound into the resources that need
//! them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 StackFlow CLI                    │
//! │           (stack plan/apply/destroy)             │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                stackflow-cloud                   │
//! │  ┌──────────────┐  ┌──────────────┐             │
//! │  │ Dependency   │  │   Executor   │             │
//! │  │ Graph        │──▶  (JoinSet)   │             │
//! │  └──────────────┘  └──────┬───────┘             │
//! │  ┌──────────────┐  ┌──────▼───────┐             │
//! │  │ Output Binder│◀─│  Reconciler  │             │
//! │  └──────────────┘  └──────┬───────┘             │
//! │              trait ControlPlane { ... }          │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │    sandbox    │ │  cloudflare   │
//! │  (file-backed)│ │  dns records  │
//! └───────────────┘ └───────────────┘
//! ```

pub mod action;
pub mod binder;
pub mod error;
pub mod executor;
pub mod graph;
pub mod memory;
pub mod provider;
pub mod reconciler;
pub mod resource;
pub mod retry;
pub mod sandbox;
pub mod state;

// Re-exports
pub use action::{
    ActionType, ApplyResult, FieldChange, OutcomeStatus, PartialFailureReport, Plan,
    PlanSummary, PlannedAction, ResourceOutcome,
};
pub use binder::{OutputBinder, Outputs};
pub use error::{CloudError, ControlPlaneError, ErrorClass, Result};
pub use executor::{ApplyOptions, DEFAULT_CONCURRENCY, Executor};
pub use graph::DependencyGraph;
pub use memory::{InMemoryControlPlane, Operation};
pub use provider::{ControlPlane, ControlPlaneResult, ControlPlaneRouter};
pub use reconciler::{Decision, Reconciler};
pub use resource::{Binding, Config, ResourceDescriptor, ResourceId, ResourceKind, Topology};
pub use retry::{PollConfig, RetryConfig};
pub use sandbox::SandboxControlPlane;
pub use state::{ResourceState, ResourceStatus, StateLock, StateManager};
pub use tokio_util::sync::CancellationToken;
