//! State reconciler
//!
//! Drives one resource from whatever the control plane reports towards its
//! declared configuration. Every mutation is preceded by a fresh `describe`,
//! so a retried call never duplicates a resource that already landed.

use crate::action::{ActionType, FieldChange};
use crate::error::CloudError;
use crate::provider::ControlPlane;
use crate::resource::{Config, ResourceId, ResourceKind};
use crate::retry::{PollConfig, RetryConfig, retry_with_backoff};
use crate::state::{ResourceState, ResourceStatus};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// What the reconciler decides for one observation
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Create,
    Update(Vec<FieldChange>),
    NoOp,
    ReplaceRequired(Vec<FieldChange>),
    /// Transitional status; re-check after a backoff
    Wait,
    /// Control plane reports the resource failed
    Fatal(String),
}

impl Decision {
    pub fn action(&self) -> ActionType {
        match self {
            Decision::Create => ActionType::Create,
            Decision::Update(_) => ActionType::Update,
            Decision::NoOp => ActionType::NoOp,
            Decision::ReplaceRequired(_) => ActionType::ReplaceRequired,
            Decision::Wait => ActionType::Await,
            Decision::Fatal(_) => ActionType::Failed,
        }
    }
}

/// Declared fields whose observed value differs
///
/// Only keys present in `declared` are compared; attributes the control
/// plane adds on its own never count as drift.
pub fn diff(kind: ResourceKind, declared: &Config, observed: &Config) -> Vec<FieldChange> {
    declared
        .iter()
        .filter(|(field, value)| observed.get(field.as_str()) != Some(value))
        .map(|(field, value)| FieldChange {
            field: field.clone(),
            before: observed.get(field).cloned(),
            after: Some(value.clone()),
            immutable: kind.is_immutable(field),
        })
        .collect()
}

/// Decide the action for a resource given its resolved config and observed state
pub fn decide(kind: ResourceKind, declared: &Config, state: &ResourceState) -> Decision {
    match state.status {
        ResourceStatus::Missing => Decision::Create,
        ResourceStatus::Creating | ResourceStatus::Updating | ResourceStatus::Deleting => {
            Decision::Wait
        }
        ResourceStatus::Failed => Decision::Fatal(
            state
                .error
                .clone()
                .unwrap_or_else(|| "control plane reports failed status".to_string()),
        ),
        ResourceStatus::Ready => {
            let changes = diff(kind, declared, &state.observed);
            if changes.is_empty() {
                Decision::NoOp
            } else if changes.iter().any(|c| c.immutable) {
                Decision::ReplaceRequired(changes)
            } else {
                Decision::Update(changes)
            }
        }
    }
}

/// Successful reconciliation
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub state: ResourceState,
    /// Mutation carried out (NoOp when already converged)
    pub action: ActionType,
}

/// Failed reconciliation, with the underlying error preserved
#[derive(Debug)]
pub struct ReconcileFailure {
    pub error: CloudError,
    pub action: ActionType,
    /// Last state observed before giving up
    pub state: Option<ResourceState>,
}

impl ReconcileFailure {
    /// Cancelled while a mutation was in flight
    pub fn is_interrupted(&self) -> bool {
        matches!(self.error, CloudError::Cancelled(_))
            && (self.action.is_change()
                || self
                    .state
                    .as_ref()
                    .is_some_and(|s| s.status.is_transitional()))
    }
}

type ReconcileResult = std::result::Result<Reconciled, ReconcileFailure>;

/// Per-resource reconciler bound to a control plane
#[derive(Clone)]
pub struct Reconciler {
    control_plane: Arc<dyn ControlPlane>,
    poll: PollConfig,
    retry: RetryConfig,
}

/// Tracks the shared deadline of one reconciliation
struct Waiter<'a> {
    poll: &'a PollConfig,
    started: Instant,
    attempt: u32,
}

impl Reconciler {
    pub fn new(control_plane: Arc<dyn ControlPlane>, poll: PollConfig, retry: RetryConfig) -> Self {
        Self {
            control_plane,
            poll,
            retry,
        }
    }

    pub fn control_plane(&self) -> &Arc<dyn ControlPlane> {
        &self.control_plane
    }

    /// Observe a resource, retrying retryable errors
    pub async fn describe(&self, id: &ResourceId) -> crate::error::Result<ResourceState> {
        retry_with_backoff(&self.retry, "describe", || {
            self.control_plane.describe(id.kind, &id.name)
        })
        .await
        .map_err(|source| CloudError::ControlPlane {
            resource: id.clone(),
            source,
        })
    }

    /// Converge one resource to `config`
    pub async fn reconcile(
        &self,
        id: &ResourceId,
        config: &Config,
        cancel: &CancellationToken,
    ) -> ReconcileResult {
        let mut waiter = Waiter {
            poll: &self.poll,
            started: Instant::now(),
            attempt: 0,
        };
        let mut action = ActionType::NoOp;
        let mut applied = false;
        let mut mutation_attempts = 0u32;
        let mut last_state: Option<ResourceState> = None;

        let fail = |error: CloudError, action: ActionType, state: Option<ResourceState>| {
            Err(ReconcileFailure {
                error,
                action,
                state,
            })
        };

        loop {
            if cancel.is_cancelled() {
                if action.is_change() {
                    last_state = self.interrupt(id).await.or(last_state);
                }
                return fail(CloudError::Cancelled(id.clone()), action, last_state);
            }

            let state = match self.describe(id).await {
                Ok(state) => state,
                Err(error) => return fail(error, action, last_state),
            };
            last_state = Some(state.clone());

            let decision = match decide(id.kind, config, &state) {
                // a mutation we issued may not be visible yet
                Decision::Create | Decision::Update(_) if applied => Decision::Wait,
                decision => decision,
            };

            match decision {
                Decision::NoOp => {
                    tracing::debug!(resource = %id, action = %action, "converged");
                    return Ok(Reconciled { state, action });
                }
                Decision::Wait => {
                    tracing::debug!(resource = %id, status = %state.status, "waiting for resource to settle");
                    if let Err(error) = self.wait(id, &state, &mut waiter, cancel).await {
                        return fail(error, action, last_state);
                    }
                }
                Decision::Fatal(reason) => {
                    return fail(
                        CloudError::ResourceFailed {
                            resource: id.clone(),
                            reason,
                        },
                        action,
                        last_state,
                    );
                }
                Decision::ReplaceRequired(changes) => {
                    let fields = changes
                        .into_iter()
                        .filter(|c| c.immutable)
                        .map(|c| c.field)
                        .collect();
                    return fail(
                        CloudError::ImmutableFieldConflict {
                            resource: id.clone(),
                            fields,
                        },
                        action,
                        last_state,
                    );
                }
                Decision::Create => {
                    tracing::info!("Creating {}", id);
                    action = ActionType::Create;
                    match self.control_plane.create(id.kind, &id.name, config).await {
                        Ok(provider_id) => {
                            tracing::debug!(resource = %id, id = %provider_id, "create accepted");
                            applied = true;
                        }
                        Err(source) => {
                            if let Err(error) = self
                                .back_off_mutation(id, source, &mut mutation_attempts, cancel)
                                .await
                            {
                                return fail(error, action, last_state);
                            }
                        }
                    }
                }
                Decision::Update(changes) => {
                    let Some(provider_id) = state.id.clone() else {
                        return fail(
                            CloudError::ResourceFailed {
                                resource: id.clone(),
                                reason: "control plane reported no id for a ready resource"
                                    .to_string(),
                            },
                            action,
                            last_state,
                        );
                    };
                    tracing::info!(
                        "Updating {} ({})",
                        id,
                        changes
                            .iter()
                            .map(|c| c.field.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    );
                    action = ActionType::Update;
                    match self
                        .control_plane
                        .update(id.kind, &provider_id, config)
                        .await
                    {
                        Ok(()) => applied = true,
                        Err(source) => {
                            if let Err(error) = self
                                .back_off_mutation(id, source, &mut mutation_attempts, cancel)
                                .await
                            {
                                return fail(error, action, last_state);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Make a resource absent (destroy, replace and decommission)
    pub async fn remove(&self, id: &ResourceId, cancel: &CancellationToken) -> ReconcileResult {
        let mut waiter = Waiter {
            poll: &self.poll,
            started: Instant::now(),
            attempt: 0,
        };
        let mut action = ActionType::NoOp;
        let mut deleted = false;
        let mut mutation_attempts = 0u32;
        let mut last_state: Option<ResourceState> = None;

        loop {
            if cancel.is_cancelled() {
                return Err(ReconcileFailure {
                    error: CloudError::Cancelled(id.clone()),
                    action,
                    state: last_state,
                });
            }

            let state = match self.describe(id).await {
                Ok(state) => state,
                Err(error) => {
                    return Err(ReconcileFailure {
                        error,
                        action,
                        state: last_state,
                    });
                }
            };
            last_state = Some(state.clone());

            let step = match (state.status, state.id.clone()) {
                (ResourceStatus::Missing, _) => return Ok(Reconciled { state, action }),
                (status, _) if status.is_transitional() => {
                    self.wait(id, &state, &mut waiter, cancel).await
                }
                (status, _) if deleted => Err(CloudError::ResourceFailed {
                    resource: id.clone(),
                    reason: format!("resource still {} after delete", status),
                }),
                (_, None) => Err(CloudError::ResourceFailed {
                    resource: id.clone(),
                    reason: "control plane reported no id for a live resource".to_string(),
                }),
                (_, Some(provider_id)) => {
                    tracing::info!("Deleting {}", id);
                    action = ActionType::Delete;
                    match self.control_plane.delete(id.kind, &provider_id).await {
                        Ok(()) => {
                            deleted = true;
                            Ok(())
                        }
                        Err(source) => {
                            self.back_off_mutation(id, source, &mut mutation_attempts, cancel)
                                .await
                        }
                    }
                }
            };

            if let Err(error) = step {
                return Err(ReconcileFailure {
                    error,
                    action,
                    state: last_state,
                });
            }
        }
    }

    /// Sleep with backoff before re-checking a transitional resource
    async fn wait(
        &self,
        id: &ResourceId,
        state: &ResourceState,
        waiter: &mut Waiter<'_>,
        cancel: &CancellationToken,
    ) -> crate::error::Result<()> {
        let elapsed = waiter.started.elapsed();
        if elapsed >= waiter.poll.timeout {
            tracing::warn!(resource = %id, status = %state.status, waited_ms = elapsed.as_millis() as u64, "provisioning timeout");
            return Err(CloudError::ProvisioningTimeout {
                resource: id.clone(),
                waited: elapsed,
            });
        }

        let delay = waiter
            .poll
            .delay_for_attempt(waiter.attempt)
            .min(waiter.poll.timeout - elapsed);
        waiter.attempt += 1;

        tokio::select! {
            _ = cancel.cancelled() => {
                self.abort_in_place(id, state).await;
                Err(CloudError::Cancelled(id.clone()))
            }
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Back off after a failed mutation; permanent errors are returned as-is
    async fn back_off_mutation(
        &self,
        id: &ResourceId,
        source: crate::error::ControlPlaneError,
        attempts: &mut u32,
        cancel: &CancellationToken,
    ) -> crate::error::Result<()> {
        *attempts += 1;
        if !source.is_retryable() || *attempts >= self.retry.max_attempts.max(1) {
            tracing::error!(resource = %id, error = %source, attempts = *attempts, "control plane call failed");
            return Err(CloudError::ControlPlane {
                resource: id.clone(),
                source,
            });
        }

        let delay: Duration = self.retry.delay_for_attempt(*attempts - 1);
        tracing::warn!(
            resource = %id,
            error = %source,
            delay_ms = delay.as_millis() as u64,
            "mutation failed, re-describing after backoff"
        );
        tokio::select! {
            _ = cancel.cancelled() => Err(CloudError::Cancelled(id.clone())),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Abort whatever mutation of ours is still in flight on `id`
    async fn interrupt(&self, id: &ResourceId) -> Option<ResourceState> {
        let state = self
            .control_plane
            .describe(id.kind, &id.name)
            .await
            .ok()?;
        if state.status.is_transitional() {
            self.abort_in_place(id, &state).await;
        }
        Some(state)
    }

    async fn abort_in_place(&self, id: &ResourceId, state: &ResourceState) {
        let Some(provider_id) = state.id.as_deref() else {
            return;
        };
        match self.control_plane.cancel(id.kind, provider_id).await {
            Ok(true) => tracing::info!("Aborted in-flight operation on {}", id),
            Ok(false) => {
                tracing::info!("{} left {} (cancel-in-place unsupported)", id, state.status)
            }
            Err(e) => tracing::warn!(resource = %id, error = %e, "cancel-in-place failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryControlPlane, Operation};
    use crate::provider::ControlPlaneResult;
    use serde_json::json;

    fn config(pairs: &[(&str, serde_json::Value)]) -> Config {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn fast_poll() -> PollConfig {
        PollConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
            timeout: Duration::from_millis(200),
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
        }
    }

    fn reconciler(cp: Arc<InMemoryControlPlane>) -> Reconciler {
        Reconciler::new(cp, fast_poll(), fast_retry())
    }

    #[test]
    fn test_decide_policy() {
        let declared = config(&[("desired_count", json!(2)), ("cluster_arn", json!("a"))]);
        let kind = ResourceKind::Service;

        assert_eq!(
            decide(kind, &declared, &ResourceState::missing()),
            Decision::Create
        );
        assert_eq!(
            decide(kind, &declared, &ResourceState::new("s", ResourceStatus::Updating)),
            Decision::Wait
        );
        assert!(matches!(
            decide(
                kind,
                &declared,
                &ResourceState::new("s", ResourceStatus::Failed).with_error("boom")
            ),
            Decision::Fatal(reason) if reason == "boom"
        ));

        let converged = ResourceState::new("s", ResourceStatus::Ready).with_observed(config(&[
            ("desired_count", json!(2)),
            ("cluster_arn", json!("a")),
            ("provider_only", json!(true)),
        ]));
        assert_eq!(decide(kind, &declared, &converged), Decision::NoOp);

        let scaled = ResourceState::new("s", ResourceStatus::Ready).with_observed(config(&[
            ("desired_count", json!(1)),
            ("cluster_arn", json!("a")),
        ]));
        match decide(kind, &declared, &scaled) {
            Decision::Update(changes) => {
                assert_eq!(changes.len(), 1);
                assert_eq!(changes[0].field, "desired_count");
                assert_eq!(changes[0].before, Some(json!(1)));
            }
            other => panic!("expected update, got {:?}", other),
        }

        let moved = ResourceState::new("s", ResourceStatus::Ready).with_observed(config(&[
            ("desired_count", json!(1)),
            ("cluster_arn", json!("b")),
        ]));
        assert!(matches!(
            decide(kind, &declared, &moved),
            Decision::ReplaceRequired(_)
        ));
    }

    #[tokio::test]
    async fn test_create_then_poll_until_ready() {
        let cp = Arc::new(InMemoryControlPlane::new().with_settle_after(2));
        let id = ResourceId::new(ResourceKind::Network, "n");
        let declared = config(&[("cidr", json!("10.0.0.0/16"))]);

        let done = reconciler(cp.clone())
            .reconcile(&id, &declared, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(done.action, ActionType::Create);
        assert!(done.state.is_ready());
        assert_eq!(
            cp.calls_for(&id),
            vec![
                Operation::Describe,
                Operation::Create,
                Operation::Describe,
                Operation::Describe,
                Operation::Describe
            ]
        );
    }

    #[tokio::test]
    async fn test_converged_resource_only_describes() {
        let cp = Arc::new(InMemoryControlPlane::new());
        let id = ResourceId::new(ResourceKind::Network, "n");
        let declared = config(&[("cidr", json!("10.0.0.0/16"))]);
        cp.seed(id.clone(), ResourceStatus::Ready, declared.clone());

        let done = reconciler(cp.clone())
            .reconcile(&id, &declared, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(done.action, ActionType::NoOp);
        assert!(cp.mutating_calls().is_empty());
    }

    /// Keeps reporting the pre-update state for `lag` describes after an update
    struct LaggingUpdates {
        inner: Arc<InMemoryControlPlane>,
        lag: u32,
        stale: std::sync::Mutex<Option<(ResourceState, u32)>>,
    }

    #[async_trait::async_trait]
    impl ControlPlane for LaggingUpdates {
        fn name(&self) -> &str {
            "lagging"
        }

        async fn describe(&self, kind: ResourceKind, name: &str) -> ControlPlaneResult<ResourceState> {
            let stale = {
                let mut guard = self.stale.lock().unwrap();
                match guard.as_mut() {
                    Some((state, left)) if *left > 0 => {
                        *left -= 1;
                        Some(state.clone())
                    }
                    _ => None,
                }
            };
            match stale {
                Some(state) => Ok(state),
                None => self.inner.describe(kind, name).await,
            }
        }

        async fn create(&self, kind: ResourceKind, name: &str, config: &Config) -> ControlPlaneResult<String> {
            self.inner.create(kind, name, config).await
        }

        async fn update(&self, kind: ResourceKind, id: &str, config: &Config) -> ControlPlaneResult<()> {
            let name = self
                .inner
                .snapshot()
                .resources
                .into_iter()
                .find(|r| r.id == id)
                .map(|r| r.resource.name)
                .unwrap();
            let before = self.inner.describe(kind, &name).await?;
            self.inner.update(kind, id, config).await?;
            *self.stale.lock().unwrap() = Some((before, self.lag));
            Ok(())
        }

        async fn delete(&self, kind: ResourceKind, id: &str) -> ControlPlaneResult<()> {
            self.inner.delete(kind, id).await
        }
    }

    fn lagging(lag: u32) -> (Arc<InMemoryControlPlane>, Reconciler, ResourceId) {
        let inner = Arc::new(InMemoryControlPlane::new());
        let id = ResourceId::new(ResourceKind::Service, "s");
        inner.seed(id.clone(), ResourceStatus::Ready, config(&[("desired_count", json!(2))]));
        let cp = Arc::new(LaggingUpdates {
            inner: inner.clone(),
            lag,
            stale: std::sync::Mutex::new(None),
        });
        (inner, Reconciler::new(cp, fast_poll(), fast_retry()), id)
    }

    #[tokio::test]
    async fn test_stale_read_after_update_is_waited_out() {
        let (inner, reconciler, id) = lagging(2);
        let declared = config(&[("desired_count", json!(3))]);

        let done = reconciler
            .reconcile(&id, &declared, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(done.action, ActionType::Update);
        assert_eq!(done.state.observed["desired_count"], json!(3));
        let updates = inner
            .calls_for(&id)
            .into_iter()
            .filter(|op| *op == Operation::Update)
            .count();
        assert_eq!(updates, 1);
    }

    #[tokio::test]
    async fn test_update_that_never_shows_up_times_out() {
        let (_inner, reconciler, id) = lagging(u32::MAX);
        let declared = config(&[("desired_count", json!(3))]);

        let failure = reconciler
            .reconcile(&id, &declared, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(failure.error, CloudError::ProvisioningTimeout { .. }));
        assert_eq!(failure.action, ActionType::Update);
    }

    #[tokio::test]
    async fn test_failed_status_is_not_recreated() {
        let cp = Arc::new(InMemoryControlPlane::new());
        let id = ResourceId::new(ResourceKind::Cluster, "c");
        cp.seed(id.clone(), ResourceStatus::Failed, Config::new());

        let failure = reconciler(cp.clone())
            .reconcile(&id, &Config::new(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(failure.error, CloudError::ResourceFailed { .. }));
        assert!(cp.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_immutable_divergence_is_reported_not_updated() {
        let cp = Arc::new(InMemoryControlPlane::new());
        let id = ResourceId::new(ResourceKind::Network, "n");
        cp.seed(
            id.clone(),
            ResourceStatus::Ready,
            config(&[("cidr", json!("10.0.0.0/16"))]),
        );

        let failure = reconciler(cp.clone())
            .reconcile(
                &id,
                &config(&[("cidr", json!("10.1.0.0/16"))]),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        match failure.error {
            CloudError::ImmutableFieldConflict { fields, .. } => {
                assert_eq!(fields, vec!["cidr".to_string()])
            }
            other => panic!("expected immutable conflict, got {:?}", other),
        }
        assert!(cp.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_stalled_resource_times_out() {
        let cp = Arc::new(InMemoryControlPlane::new());
        let id = ResourceId::new(ResourceKind::Certificate, "cert");
        cp.stall(id.clone());

        let failure = reconciler(cp.clone())
            .reconcile(&id, &Config::new(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            failure.error,
            CloudError::ProvisioningTimeout { .. }
        ));
        assert_eq!(failure.action, ActionType::Create);
        assert_eq!(
            failure.state.map(|s| s.status),
            Some(ResourceStatus::Creating)
        );
    }

    #[tokio::test]
    async fn test_retryable_create_error_does_not_duplicate() {
        let cp = Arc::new(InMemoryControlPlane::new());
        let id = ResourceId::new(ResourceKind::Registry, "r");
        // the create lands, but the caller only sees a throttling error
        cp.fail_next_after_apply(
            Operation::Create,
            id.clone(),
            crate::error::ControlPlaneError::throttled("Rate exceeded"),
        );

        let done = reconciler(cp.clone())
            .reconcile(&id, &Config::new(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(done.state.is_ready());
        let creates = cp
            .calls_for(&id)
            .into_iter()
            .filter(|op| *op == Operation::Create)
            .count();
        assert_eq!(creates, 1);
    }

    #[tokio::test]
    async fn test_permanent_create_error_preserved() {
        let cp = Arc::new(InMemoryControlPlane::new());
        let id = ResourceId::new(ResourceKind::Registry, "r");
        cp.fail_next(
            Operation::Create,
            id.clone(),
            crate::error::ControlPlaneError::new(
                crate::error::ErrorClass::QuotaExceeded,
                "repository limit reached",
            ),
        );

        let failure = reconciler(cp.clone())
            .reconcile(&id, &Config::new(), &CancellationToken::new())
            .await
            .unwrap_err();

        match &failure.error {
            CloudError::ControlPlane { source, .. } => {
                assert_eq!(source.message, "repository limit reached");
                assert!(!failure.error.is_retryable());
            }
            other => panic!("expected control plane error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_while_polling_aborts_in_place() {
        let cp = Arc::new(InMemoryControlPlane::new().with_cancel_support());
        let id = ResourceId::new(ResourceKind::Service, "s");
        cp.stall(id.clone());

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let failure = reconciler(cp.clone())
            .reconcile(&id, &Config::new(), &cancel)
            .await
            .unwrap_err();

        assert!(failure.is_interrupted());
        assert!(cp.calls_for(&id).contains(&Operation::Cancel));
        assert!(cp.peek(&id).is_none());
    }

    #[tokio::test]
    async fn test_remove_waits_until_missing() {
        let cp = Arc::new(InMemoryControlPlane::new().with_settle_after(1));
        let id = ResourceId::new(ResourceKind::DnsRecord, "www.example.com");
        cp.seed(id.clone(), ResourceStatus::Ready, Config::new());

        let done = reconciler(cp.clone())
            .remove(&id, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(done.action, ActionType::Delete);
        assert_eq!(done.state.status, ResourceStatus::Missing);
        assert!(cp.is_empty());
    }
}
