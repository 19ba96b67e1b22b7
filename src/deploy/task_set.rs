// ABOUTME: Task and TaskSet types plus the manager that launches and stops them.
// ABOUTME: Launches fan out concurrently; the manager waits for running confirmation.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::cluster::{ScheduleError, Scheduler, TaskRunState, TaskSpec};
use crate::config::{LaunchConfig, RetryConfig};
use crate::types::TaskId;

use super::error::DeployError;
use super::retry::with_backoff;

/// Which deployment generation a task set belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Generation {
    /// Currently serving version.
    Stable,
    /// New version being rolled out.
    Candidate,
}

/// Lifecycle status of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Launching,
    Healthy,
    Unhealthy,
    Draining,
    Stopped,
}

/// One running instance of a service version.
///
/// Owned exclusively by its TaskSet; the coordinator mutates tasks only
/// through the manager and registrar.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    /// host:port the task serves on.
    pub address: String,
    pub status: TaskStatus,
    /// Whether the load balancer currently routes to this task.
    pub registered: bool,
    pub consecutive_passes: u32,
    pub consecutive_failures: u32,
    /// Timeouts tracked separately from plain failures for diagnosis;
    /// both count against the failure threshold.
    pub timeout_failures: u32,
}

impl Task {
    pub fn new(id: TaskId, address: String) -> Self {
        Self {
            id,
            address,
            status: TaskStatus::Launching,
            registered: false,
            consecutive_passes: 0,
            consecutive_failures: 0,
            timeout_failures: 0,
        }
    }

    /// Failures counted against the threshold: plain failures plus
    /// timeouts since the last pass.
    pub fn failure_total(&self) -> u32 {
        self.consecutive_failures + self.timeout_failures
    }
}

/// The ordered set of tasks belonging to one deployment generation.
/// Insertion order is launch order.
#[derive(Debug, Clone)]
pub struct TaskSet {
    pub generation: Generation,
    pub desired_count: u32,
    pub tasks: Vec<Task>,
}

impl TaskSet {
    pub fn new(generation: Generation, desired_count: u32) -> Self {
        Self {
            generation,
            desired_count,
            tasks: Vec::new(),
        }
    }

    /// Tasks not yet stopped. Always ≤ desired_count.
    pub fn running_count(&self) -> u32 {
        self.tasks
            .iter()
            .filter(|t| t.status != TaskStatus::Stopped)
            .count() as u32
    }

    pub fn all_healthy(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(|t| t.status == TaskStatus::Healthy)
    }

    /// Promote a candidate set once the old generation is retired.
    pub fn relabel_stable(&mut self) {
        self.generation = Generation::Stable;
    }
}

/// Launches, tracks, and terminates task sets on the compute cluster.
///
/// Performs no health checks and no traffic control; those belong to the
/// monitor and registrar.
pub struct TaskSetManager<S> {
    scheduler: Arc<S>,
    launch: LaunchConfig,
    retry: RetryConfig,
}

impl<S: Scheduler> TaskSetManager<S> {
    pub fn new(scheduler: Arc<S>, launch: LaunchConfig, retry: RetryConfig) -> Self {
        Self {
            scheduler,
            launch,
            retry,
        }
    }

    /// Launch a candidate task set of `count` tasks.
    ///
    /// Launch requests fan out concurrently, then the manager waits for
    /// the scheduler to confirm every task running (a phase barrier).
    ///
    /// On failure the partially launched set is returned alongside the
    /// error so the caller can roll it back.
    pub async fn launch(
        &self,
        spec: &TaskSpec,
        count: u32,
    ) -> Result<TaskSet, (TaskSet, DeployError)> {
        let results = join_all((0..count).map(|_| self.launch_one(spec))).await;

        let mut set = TaskSet::new(Generation::Candidate, count);
        let mut first_err = None;
        for result in results {
            match result {
                Ok(task) => set.tasks.push(task),
                Err(e) if first_err.is_none() => first_err = Some(e),
                Err(_) => {}
            }
        }
        if let Some(e) = first_err {
            return Err((set, e));
        }

        let waits = join_all(set.tasks.iter().map(|t| self.wait_running(&t.id))).await;
        if let Some(e) = waits.into_iter().find_map(Result::err) {
            return Err((set, e));
        }

        Ok(set)
    }

    /// Launch a single task and wait for it to run. Used to replace a
    /// task retired during validation.
    pub async fn launch_replacement(&self, spec: &TaskSpec) -> Result<Task, DeployError> {
        let task = self.launch_one(spec).await?;
        self.wait_running(&task.id).await?;
        Ok(task)
    }

    /// Stop one task. Stopping an already-stopped task is a no-op.
    pub async fn stop_task(&self, task: &mut Task) -> Result<(), DeployError> {
        if task.status == TaskStatus::Stopped {
            return Ok(());
        }
        with_backoff(&self.retry, ScheduleError::is_transient, || {
            self.scheduler.stop_task(&task.id)
        })
        .await?;
        task.status = TaskStatus::Stopped;
        Ok(())
    }

    async fn launch_one(&self, spec: &TaskSpec) -> Result<Task, DeployError> {
        let launched = with_backoff(&self.retry, ScheduleError::is_transient, || {
            self.scheduler.launch_task(spec)
        })
        .await?;
        Ok(Task::new(launched.id, launched.address))
    }

    /// Poll the scheduler until it confirms the task running, bounded by
    /// the launch timeout.
    async fn wait_running(&self, id: &TaskId) -> Result<(), DeployError> {
        let deadline = Instant::now() + self.launch.timeout;
        loop {
            let state = with_backoff(&self.retry, ScheduleError::is_transient, || {
                self.scheduler.task_state(id)
            })
            .await?;

            match state {
                TaskRunState::Running => return Ok(()),
                TaskRunState::Stopped => {
                    return Err(DeployError::Scheduler(format!(
                        "task {} stopped before it ever ran",
                        id
                    )));
                }
                TaskRunState::Provisioning => {}
            }

            if Instant::now() >= deadline {
                return Err(DeployError::LaunchTimeout { task: id.clone() });
            }
            tokio::time::sleep(self.launch.poll_interval).await;
        }
    }
}
