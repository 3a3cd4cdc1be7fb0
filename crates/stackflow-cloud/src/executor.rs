//! Apply executor
//!
//! Runs the reconciler over a whole topology. A resource is started as soon
//! as every one of its dependencies is `Ready`, so independent branches make
//! progress concurrently up to the configured limit. A failure only stops the
//! resources downstream of it.

use crate::action::{
    ActionType, ApplyResult, FieldChange, OutcomeStatus, Plan, PlannedAction, ResourceOutcome,
};
use crate::binder::OutputBinder;
use crate::error::{CloudError, Result};
use crate::graph::DependencyGraph;
use crate::provider::ControlPlane;
use crate::reconciler::{Decision, ReconcileFailure, Reconciled, Reconciler, decide};
use crate::resource::{ResourceId, Topology};
use crate::retry::{PollConfig, RetryConfig};
use crate::state::ResourceStatus;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_CONCURRENCY: usize = 4;

/// Tuning knobs of an apply pass
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Maximum number of resources reconciled at once
    pub concurrency: usize,
    pub poll: PollConfig,
    pub retry: RetryConfig,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            poll: PollConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl ApplyOptions {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

type TaskResult = (usize, std::result::Result<Reconciled, ReconcileFailure>);

/// Converges topologies against one control plane
#[derive(Clone)]
pub struct Executor {
    reconciler: Reconciler,
    options: ApplyOptions,
}

impl Executor {
    pub fn new(control_plane: Arc<dyn ControlPlane>, options: ApplyOptions) -> Self {
        Self {
            reconciler: Reconciler::new(control_plane, options.poll.clone(), options.retry.clone()),
            options,
        }
    }

    pub fn options(&self) -> &ApplyOptions {
        &self.options
    }

    /// Describe every resource and decide its action without mutating anything
    pub async fn plan(&self, topology: &Topology) -> Result<Plan> {
        let graph = DependencyGraph::build(topology)?;
        let mut binder = OutputBinder::new();
        let mut actions = Vec::with_capacity(graph.len());

        for &idx in graph.order() {
            let descriptor = &topology.resources()[idx];
            let state = self.reconciler.describe(&descriptor.id).await?;
            let (config, pending) = binder.resolve_partial(descriptor);
            let kind = descriptor.kind();

            let unknown = |field: &String| FieldChange {
                field: field.clone(),
                before: None,
                after: None,
                immutable: kind.is_immutable(field),
            };

            let (action, changes) = match decide(kind, &config, &state) {
                Decision::Create => {
                    let mut changes: Vec<FieldChange> = config
                        .iter()
                        .map(|(field, value)| FieldChange {
                            field: field.clone(),
                            before: None,
                            after: Some(value.clone()),
                            immutable: kind.is_immutable(field),
                        })
                        .collect();
                    changes.extend(pending.iter().map(unknown));
                    (ActionType::Create, changes)
                }
                Decision::Update(mut changes) => {
                    changes.extend(pending.iter().map(unknown));
                    (ActionType::Update, changes)
                }
                Decision::NoOp if !pending.is_empty() => {
                    // value known only once the producer is ready
                    (ActionType::Update, pending.iter().map(unknown).collect())
                }
                Decision::NoOp => (ActionType::NoOp, Vec::new()),
                Decision::ReplaceRequired(changes) => (ActionType::ReplaceRequired, changes),
                Decision::Wait => (ActionType::Await, Vec::new()),
                Decision::Fatal(_) => (ActionType::Failed, Vec::new()),
            };

            tracing::debug!(resource = %descriptor.id, action = %action, status = %state.status, "planned");
            binder.publish(descriptor.id.clone(), &state);
            actions.push(PlannedAction {
                resource: descriptor.id.clone(),
                action,
                observed_status: state.status,
                changes,
                pending_bindings: pending,
            });
        }

        Ok(Plan::new(actions))
    }

    /// Converge the whole topology
    pub async fn apply(&self, topology: &Topology) -> Result<ApplyResult> {
        self.apply_with_cancel(topology, CancellationToken::new())
            .await
    }

    /// Converge the whole topology, stopping early when `cancel` fires
    ///
    /// Graph errors are returned before any control-plane call is made.
    /// Everything else is reported per resource in the [`ApplyResult`].
    pub async fn apply_with_cancel(
        &self,
        topology: &Topology,
        cancel: CancellationToken,
    ) -> Result<ApplyResult> {
        let graph = DependencyGraph::build(topology)?;
        let started = Instant::now();
        let n = graph.len();
        tracing::info!(
            resources = n,
            concurrency = self.options.concurrency,
            "Applying topology"
        );

        // ready queue ordered by topological position, then index
        let mut position = vec![0usize; n];
        for (pos, &idx) in graph.order().iter().enumerate() {
            position[idx] = pos;
        }
        let mut remaining: Vec<usize> = (0..n).map(|i| graph.dependency_indices(i).len()).collect();
        let mut ready: BTreeSet<(usize, usize)> = (0..n)
            .filter(|&i| remaining[i] == 0)
            .map(|i| (position[i], i))
            .collect();

        let mut outcomes: Vec<Option<ResourceOutcome>> = vec![None; n];
        let mut in_flight: HashMap<task::Id, usize> = HashMap::new();
        let mut binder = OutputBinder::new();
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut tasks: JoinSet<TaskResult> = JoinSet::new();

        loop {
            // a node is only spawned once it holds a permit, so the lowest
            // ready position always goes first
            while !cancel.is_cancelled() {
                if ready.is_empty() {
                    break;
                }
                let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                    break;
                };
                let Some((_, idx)) = ready.pop_first() else {
                    break;
                };
                let descriptor = &topology.resources()[idx];
                let config = match binder.resolve(descriptor) {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::error!(resource = %descriptor.id, error = %e, "binding failed");
                        outcomes[idx] = Some(
                            ResourceOutcome::new(
                                descriptor.id.clone(),
                                OutcomeStatus::Failed,
                                ActionType::NoOp,
                            )
                            .with_error(&e),
                        );
                        mark_downstream(&graph, &mut outcomes, idx, OutcomeStatus::Blocked);
                        continue;
                    }
                };

                let reconciler = self.reconciler.clone();
                let cancel = cancel.clone();
                let id = descriptor.id.clone();
                let handle = tasks.spawn(async move {
                    let _permit = permit;
                    (idx, reconciler.reconcile(&id, &config, &cancel).await)
                });
                in_flight.insert(handle.id(), idx);
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            let (idx, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    let Some(idx) = in_flight.remove(&e.id()) else {
                        tracing::error!(error = %e, "reconcile task aborted");
                        continue;
                    };
                    let id = graph.id(idx).clone();
                    tracing::error!(resource = %id, error = %e, "reconcile task aborted");
                    let err = CloudError::ResourceFailed {
                        resource: id.clone(),
                        reason: format!("reconcile task aborted: {}", e),
                    };
                    outcomes[idx] = Some(
                        ResourceOutcome::new(id, OutcomeStatus::Failed, ActionType::NoOp)
                            .with_error(&err),
                    );
                    mark_downstream(&graph, &mut outcomes, idx, OutcomeStatus::Blocked);
                    continue;
                }
            };
            in_flight.retain(|_, &mut i| i != idx);
            let id = graph.id(idx).clone();

            match result {
                Ok(done) => {
                    tracing::info!("{} ready ({})", id, done.action);
                    binder.publish(id.clone(), &done.state);
                    let mut outcome =
                        ResourceOutcome::new(id, OutcomeStatus::Ready, done.action);
                    outcome.id = done.state.id.clone();
                    outcome.observed_status = Some(done.state.status);
                    outcomes[idx] = Some(outcome);

                    for &dependent in graph.dependent_indices(idx) {
                        remaining[dependent] -= 1;
                        if remaining[dependent] == 0 && outcomes[dependent].is_none() {
                            ready.insert((position[dependent], dependent));
                        }
                    }
                }
                Err(failure) => {
                    let status = if failure.is_interrupted() {
                        OutcomeStatus::Interrupted
                    } else if matches!(failure.error, CloudError::Cancelled(_)) {
                        OutcomeStatus::Cancelled
                    } else {
                        OutcomeStatus::Failed
                    };
                    match status {
                        OutcomeStatus::Failed => {
                            tracing::error!(resource = %id, error = %failure.error, "reconcile failed")
                        }
                        _ => tracing::warn!(resource = %id, status = %status, "reconcile stopped"),
                    }

                    let mut outcome = ResourceOutcome::new(id, status, failure.action);
                    if status == OutcomeStatus::Failed {
                        outcome = outcome.with_error(&failure.error);
                    }
                    outcome.id = failure.state.as_ref().and_then(|s| s.id.clone());
                    outcome.observed_status = failure.state.as_ref().map(|s| s.status);
                    outcomes[idx] = Some(outcome);

                    let downstream = if status == OutcomeStatus::Failed {
                        OutcomeStatus::Blocked
                    } else {
                        OutcomeStatus::Cancelled
                    };
                    mark_downstream(&graph, &mut outcomes, idx, downstream);
                }
            }
        }

        let resources = graph
            .order()
            .iter()
            .map(|&idx| {
                outcomes[idx].take().unwrap_or_else(|| {
                    ResourceOutcome::new(
                        graph.id(idx).clone(),
                        OutcomeStatus::Cancelled,
                        ActionType::NoOp,
                    )
                })
            })
            .collect();

        let result = ApplyResult {
            resources,
            outputs: binder.outputs(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(counts = ?result.counts(), duration_ms = result.duration_ms, "Apply finished");
        Ok(result)
    }

    /// Delete every resource in reverse dependency order
    ///
    /// A resource whose delete fails keeps its producers alive; they are
    /// reported as blocked.
    pub async fn destroy(
        &self,
        topology: &Topology,
        cancel: CancellationToken,
    ) -> Result<ApplyResult> {
        let graph = DependencyGraph::build(topology)?;
        let started = Instant::now();
        let mut outcomes: Vec<Option<ResourceOutcome>> = vec![None; graph.len()];

        for &idx in graph.order().iter().rev() {
            if outcomes[idx].is_some() {
                continue;
            }
            let id = graph.id(idx).clone();
            let outcome = match self.reconciler.remove(&id, &cancel).await {
                Ok(done) => {
                    let mut outcome = ResourceOutcome::new(id, OutcomeStatus::Deleted, done.action);
                    outcome.observed_status = Some(done.state.status);
                    outcome
                }
                Err(failure) => {
                    let cancelled = matches!(failure.error, CloudError::Cancelled(_));
                    let status = if failure.is_interrupted() {
                        OutcomeStatus::Interrupted
                    } else if cancelled {
                        OutcomeStatus::Cancelled
                    } else {
                        OutcomeStatus::Failed
                    };
                    let mut outcome = ResourceOutcome::new(id.clone(), status, failure.action);
                    if !cancelled {
                        outcome = outcome.with_error(&failure.error);
                    }
                    outcome.id = failure.state.as_ref().and_then(|s| s.id.clone());
                    outcome.observed_status = failure.state.as_ref().map(|s| s.status);

                    for &dep in graph.dependency_indices(idx) {
                        mark_upstream(&graph, &mut outcomes, dep, &id, cancelled);
                    }
                    outcome
                }
            };
            outcomes[idx] = Some(outcome);
        }

        let resources = graph
            .reverse_sorted()
            .into_iter()
            .filter_map(|id| graph.index_of(id))
            .filter_map(|idx| outcomes[idx].take())
            .collect();

        Ok(ApplyResult {
            resources,
            outputs: Default::default(),
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Delete one resource and converge the topology again
    pub async fn replace(
        &self,
        topology: &Topology,
        id: &ResourceId,
        cancel: CancellationToken,
    ) -> Result<ApplyResult> {
        DependencyGraph::build(topology)?;
        if !topology.contains(id) {
            return Err(CloudError::ResourceNotFound(id.clone()));
        }

        tracing::info!("Replacing {}", id);
        self.reconciler
            .remove(id, &cancel)
            .await
            .map_err(|failure| failure.error)?;

        self.apply_with_cancel(topology, cancel).await
    }

    /// Remove one resource that nothing live depends on
    pub async fn decommission(
        &self,
        topology: &Topology,
        id: &ResourceId,
        cancel: CancellationToken,
    ) -> Result<ResourceOutcome> {
        let graph = DependencyGraph::build(topology)?;
        if graph.index_of(id).is_none() {
            return Err(CloudError::ResourceNotFound(id.clone()));
        }

        let mut live = Vec::new();
        for dependent in graph.dependents(id) {
            let state = self.reconciler.describe(dependent).await?;
            if state.status.exists() {
                live.push(dependent.clone());
            }
        }
        if !live.is_empty() {
            return Err(CloudError::HasLiveDependents {
                resource: id.clone(),
                dependents: live,
            });
        }

        let done = self
            .reconciler
            .remove(id, &cancel)
            .await
            .map_err(|failure| failure.error)?;
        let mut outcome = ResourceOutcome::new(id.clone(), OutcomeStatus::Deleted, done.action);
        outcome.observed_status = Some(ResourceStatus::Missing);
        Ok(outcome)
    }
}

/// Give every not-yet-settled transitive dependent of `idx` the status `status`
fn mark_downstream(
    graph: &DependencyGraph,
    outcomes: &mut [Option<ResourceOutcome>],
    idx: usize,
    status: OutcomeStatus,
) {
    let cause = graph.id(idx).clone();
    for dependent in graph.reach_dependents(idx) {
        if outcomes[dependent].is_some() {
            continue;
        }
        let mut outcome =
            ResourceOutcome::new(graph.id(dependent).clone(), status, ActionType::NoOp);
        if status == OutcomeStatus::Blocked {
            outcome.blocked_by = Some(cause.clone());
        }
        outcomes[dependent] = Some(outcome);
    }
}

/// Producers of a resource that could not be deleted stay in place
fn mark_upstream(
    graph: &DependencyGraph,
    outcomes: &mut [Option<ResourceOutcome>],
    idx: usize,
    cause: &ResourceId,
    cancelled: bool,
) {
    let mut stack = vec![idx];
    while let Some(i) = stack.pop() {
        if outcomes[i].is_some() {
            continue;
        }
        let mut outcome = if cancelled {
            ResourceOutcome::new(graph.id(i).clone(), OutcomeStatus::Cancelled, ActionType::NoOp)
        } else {
            ResourceOutcome::new(graph.id(i).clone(), OutcomeStatus::Blocked, ActionType::NoOp)
        };
        if !cancelled {
            outcome.blocked_by = Some(cause.clone());
        }
        outcomes[i] = Some(outcome);
        stack.extend(graph.dependency_indices(i).iter().copied());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryControlPlane;
    use crate::resource::{ResourceDescriptor, ResourceKind};
    use serde_json::json;
    use std::time::Duration;

    fn fast_options() -> ApplyOptions {
        ApplyOptions {
            concurrency: 4,
            poll: PollConfig {
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                multiplier: 2.0,
                timeout: Duration::from_millis(500),
            },
            retry: RetryConfig {
                max_attempts: 3,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                backoff_multiplier: 2.0,
            },
        }
    }

    fn chain() -> Topology {
        let net = ResourceId::new(ResourceKind::Network, "n");
        let mut topology = Topology::new();
        topology
            .add(ResourceDescriptor::new(ResourceKind::Network, "n").with_config("cidr", json!("10.0.0.0/16")))
            .unwrap();
        topology
            .add(
                ResourceDescriptor::new(ResourceKind::Cluster, "c").bind(
                    net,
                    "network_id",
                    "network_id",
                ),
            )
            .unwrap();
        topology
    }

    #[tokio::test]
    async fn test_plan_marks_unknown_bound_values() {
        let cp = Arc::new(InMemoryControlPlane::new());
        let executor = Executor::new(cp.clone(), fast_options());

        let plan = executor.plan(&chain()).await.unwrap();
        assert_eq!(plan.summary().create, 2);

        let cluster = plan
            .action_for(&ResourceId::new(ResourceKind::Cluster, "c"))
            .unwrap();
        assert_eq!(cluster.pending_bindings, vec!["network_id".to_string()]);
        assert_eq!(cluster.changes[0].after, None);
        assert!(cp.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_apply_binds_producer_outputs() {
        let cp = Arc::new(InMemoryControlPlane::new().with_settle_after(1));
        let executor = Executor::new(cp.clone(), fast_options());

        let result = executor.apply(&chain()).await.unwrap();
        assert!(result.is_success());

        let cluster = cp
            .peek(&ResourceId::new(ResourceKind::Cluster, "c"))
            .unwrap();
        let network = cp
            .peek(&ResourceId::new(ResourceKind::Network, "n"))
            .unwrap();
        assert_eq!(cluster.config["network_id"], json!(network.id));
    }

    #[tokio::test]
    async fn test_decommission_refuses_live_dependents() {
        let cp = Arc::new(InMemoryControlPlane::new());
        let executor = Executor::new(cp.clone(), fast_options());
        executor.apply(&chain()).await.unwrap();
        cp.clear_calls();

        let err = executor
            .decommission(
                &chain(),
                &ResourceId::new(ResourceKind::Network, "n"),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::HasLiveDependents { .. }));
        assert!(cp.mutating_calls().is_empty());

        let outcome = executor
            .decommission(
                &chain(),
                &ResourceId::new(ResourceKind::Cluster, "c"),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Deleted);
        assert_eq!(cp.len(), 1);
    }

    /// Panics whenever the network is touched
    struct PanickingNetwork(InMemoryControlPlane);

    #[async_trait::async_trait]
    impl ControlPlane for PanickingNetwork {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn describe(
            &self,
            kind: ResourceKind,
            name: &str,
        ) -> crate::provider::ControlPlaneResult<crate::state::ResourceState> {
            if kind == ResourceKind::Network {
                panic!("network backend crashed");
            }
            self.0.describe(kind, name).await
        }

        async fn create(
            &self,
            kind: ResourceKind,
            name: &str,
            config: &crate::resource::Config,
        ) -> crate::provider::ControlPlaneResult<String> {
            self.0.create(kind, name, config).await
        }

        async fn update(
            &self,
            kind: ResourceKind,
            id: &str,
            config: &crate::resource::Config,
        ) -> crate::provider::ControlPlaneResult<()> {
            self.0.update(kind, id, config).await
        }

        async fn delete(&self, kind: ResourceKind, id: &str) -> crate::provider::ControlPlaneResult<()> {
            self.0.delete(kind, id).await
        }
    }

    #[tokio::test]
    async fn test_panicked_task_blocks_its_dependents() {
        let cp = Arc::new(PanickingNetwork(InMemoryControlPlane::new()));
        let executor = Executor::new(cp, fast_options());

        let result = executor.apply(&chain()).await.unwrap();
        let network = ResourceId::new(ResourceKind::Network, "n");
        let cluster = result
            .outcome(&ResourceId::new(ResourceKind::Cluster, "c"))
            .unwrap();

        let failed = result.outcome(&network).unwrap();
        assert_eq!(failed.status, OutcomeStatus::Failed);
        assert!(
            failed
                .failure
                .as_ref()
                .unwrap()
                .message
                .contains("reconcile task aborted")
        );
        assert_eq!(cluster.status, OutcomeStatus::Blocked);
        assert_eq!(cluster.blocked_by, Some(network));
    }

    #[tokio::test]
    async fn test_unknown_resource_rejected() {
        let cp = Arc::new(InMemoryControlPlane::new());
        let executor = Executor::new(cp, fast_options());
        let err = executor
            .replace(
                &chain(),
                &ResourceId::new(ResourceKind::Service, "nope"),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::ResourceNotFound(_)));
    }
}
