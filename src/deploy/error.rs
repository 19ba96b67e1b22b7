// ABOUTME: Error taxonomy for deployment orchestration.
// ABOUTME: Distinguishes terminal, retryable, and rollback-triggering failures.

use chrono::{DateTime, Utc};

use crate::cluster::{BalancerError, ScheduleError};
use crate::store::StoreError;
use crate::types::TaskId;

/// Errors that can occur while orchestrating a deployment.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Another deployment holds the per-service lock. Reported to the
    /// caller; never queued or retried.
    #[error(
        "another deployment is active for this service \
         (deployment {deployment}, held by {holder} pid {pid} since {since})"
    )]
    Conflict {
        deployment: String,
        holder: String,
        pid: u32,
        since: DateTime<Utc>,
    },

    /// The request itself is unusable; rejected before the lock is
    /// taken or anything is mutated.
    #[error("invalid deployment request: {0}")]
    Invalid(String),

    /// The cluster cannot launch the requested task count.
    #[error("insufficient cluster capacity: {0}")]
    Capacity(String),

    /// Scheduler unreachable after the retry budget.
    #[error("scheduler unavailable: {0}")]
    SchedulerUnavailable(String),

    /// Non-transient scheduler failure.
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// Load balancer failure after the retry budget.
    #[error("registrar error: {0}")]
    Registrar(String),

    /// A candidate task accumulated failures past the threshold.
    #[error("task {task} failed health checks past the failure threshold")]
    HealthCheckFailed { task: TaskId },

    /// The validation phase as a whole exceeded its deadline.
    #[error("validation did not complete within {0} seconds")]
    ValidationTimeout(u64),

    /// The scheduler never confirmed a task running.
    #[error("task {task} was not running within the launch timeout")]
    LaunchTimeout { task: TaskId },

    /// Old task still held connections when the drain timeout elapsed.
    /// Logged and the task is forcibly stopped; not fatal on its own.
    #[error("task {task} did not finish draining within the drain timeout")]
    DrainTimeout { task: TaskId },

    /// Cancellation was requested and observed.
    #[error("deployment cancelled")]
    Cancelled,

    /// Rollback could not restore the prior stable state.
    #[error("rollback failed: {0}")]
    RollbackFailed(String),

    #[error("deploy lock error: {0}")]
    Lock(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ScheduleError> for DeployError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::Capacity(msg) => DeployError::Capacity(msg),
            ScheduleError::Unavailable(msg) => DeployError::SchedulerUnavailable(msg),
            other => DeployError::Scheduler(other.to_string()),
        }
    }
}

impl From<BalancerError> for DeployError {
    fn from(err: BalancerError) -> Self {
        DeployError::Registrar(err.to_string())
    }
}
