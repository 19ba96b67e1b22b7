// ABOUTME: LoadBalancer trait for the target pool the orchestrator shifts traffic in.
// ABOUTME: Registration, drain initiation, and drain progress queries.

use crate::types::{ServiceName, TaskId};
use async_trait::async_trait;
use serde::Deserialize;

/// Where a target stands in the draining process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainState {
    /// Still holding in-flight connections.
    Draining,
    /// No connections left; safe to stop the task.
    Drained,
    /// Not in the pool (never registered, or drain already completed
    /// and the target was removed).
    NotRegistered,
}

/// Errors from load balancer operations.
#[derive(Debug, thiserror::Error)]
pub enum BalancerError {
    /// The balancer API could not be reached; retryable.
    #[error("load balancer unavailable: {0}")]
    Unavailable(String),

    #[error("load balancer API error: {0}")]
    Api(String),
}

impl BalancerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BalancerError::Unavailable(_))
    }
}

/// Load balancer target pool operations.
///
/// Callers must serialize mutations per service (the Registrar does);
/// implementations are not required to tolerate interleaved register and
/// drain calls for the same pool.
#[async_trait]
pub trait LoadBalancer: Send + Sync {
    /// Add a task to the routed target pool. Registering an
    /// already-registered target is a no-op.
    async fn register(
        &self,
        service: &ServiceName,
        task: &TaskId,
        address: &str,
    ) -> Result<(), BalancerError>;

    /// Stop routing new connections to a target and begin draining the
    /// existing ones. No-op if the target is not registered.
    async fn begin_drain(&self, service: &ServiceName, task: &TaskId)
    -> Result<(), BalancerError>;

    /// Drain progress for a target.
    async fn drain_state(
        &self,
        service: &ServiceName,
        task: &TaskId,
    ) -> Result<DrainState, BalancerError>;

    /// Task ids currently registered in the pool for a service.
    async fn registered_targets(&self, service: &ServiceName)
    -> Result<Vec<TaskId>, BalancerError>;
}
