// ABOUTME: Scheduler trait for launching and stopping tasks on the compute cluster.
// ABOUTME: The orchestrator never talks to the cluster except through this seam.

use crate::types::{ImageRef, ServiceName, TaskId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What to launch: one task of a service at a given image.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSpec {
    pub service: ServiceName,
    pub image: ImageRef,
}

/// A task the scheduler has accepted, with the address it will serve on.
#[derive(Debug, Clone, Deserialize)]
pub struct LaunchedTask {
    pub id: TaskId,
    /// host:port the task serves traffic (and health checks) on.
    pub address: String,
}

/// Scheduler-reported lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskRunState {
    Provisioning,
    Running,
    Stopped,
}

/// Errors from cluster scheduler operations.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// The cluster cannot place the requested task.
    #[error("insufficient cluster capacity: {0}")]
    Capacity(String),

    /// The scheduler could not be reached; retryable.
    #[error("scheduler unavailable: {0}")]
    Unavailable(String),

    #[error("task not found: {0}")]
    NotFound(String),

    #[error("scheduler API error: {0}")]
    Api(String),
}

impl ScheduleError {
    /// Whether the error is transient and worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, ScheduleError::Unavailable(_))
    }
}

/// Compute cluster task operations.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Ask the cluster to launch one task. Returns once the scheduler has
    /// accepted the placement, not once the task is running; poll
    /// `task_state` for that.
    async fn launch_task(&self, spec: &TaskSpec) -> Result<LaunchedTask, ScheduleError>;

    /// Current lifecycle state of a task.
    async fn task_state(&self, id: &TaskId) -> Result<TaskRunState, ScheduleError>;

    /// Stop a task. Stopping an already-stopped task is a no-op.
    async fn stop_task(&self, id: &TaskId) -> Result<(), ScheduleError>;

    /// All tasks the cluster is running for a service.
    async fn list_tasks(&self, service: &ServiceName) -> Result<Vec<LaunchedTask>, ScheduleError>;
}
