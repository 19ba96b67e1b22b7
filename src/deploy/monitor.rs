// ABOUTME: Health check monitor driving candidate validation.
// ABOUTME: Fan-out probe rounds with per-task consecutive pass/fail counters.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;

use crate::config::HealthcheckConfig;
use crate::health::{HealthCheckResult, HealthProbe, Outcome};

use super::task_set::{Task, TaskSet, TaskStatus};

/// Verdict of the validation phase for a candidate task set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// Every task reached Healthy.
    AllHealthy,
    /// A task accumulated failures past the threshold.
    TaskFailed { index: usize },
    /// The phase exceeded its overall deadline.
    TimedOut,
    /// Cancellation observed at a round boundary.
    Cancelled,
}

/// Polls candidate tasks until all are healthy, one fails past the
/// threshold, the phase times out, or the deployment is cancelled.
pub struct HealthMonitor<P> {
    probe: Arc<P>,
    config: HealthcheckConfig,
}

impl<P: HealthProbe> HealthMonitor<P> {
    pub fn new(probe: Arc<P>, config: HealthcheckConfig) -> Self {
        Self { probe, config }
    }

    /// Apply one probe outcome to a task's counters.
    ///
    /// Only a task still launching can be promoted to Healthy: a pass
    /// never clears a task already past its failure threshold.
    pub fn observe(&self, task: &mut Task, outcome: Outcome) {
        match outcome {
            Outcome::Pass => {
                task.consecutive_passes += 1;
                task.consecutive_failures = 0;
                task.timeout_failures = 0;
                if task.status == TaskStatus::Launching
                    && task.consecutive_passes >= self.config.healthy_threshold
                {
                    task.status = TaskStatus::Healthy;
                }
            }
            Outcome::Fail => {
                task.consecutive_passes = 0;
                task.consecutive_failures += 1;
            }
            Outcome::Timeout => {
                task.consecutive_passes = 0;
                task.timeout_failures += 1;
            }
        }

        // A healthy task can regress: the threshold applies for as long
        // as the task is being polled, not just until its first promotion.
        if matches!(task.status, TaskStatus::Launching | TaskStatus::Healthy)
            && task.failure_total() >= self.config.failure_threshold
        {
            task.status = TaskStatus::Unhealthy;
        }
    }

    /// Run validation rounds over a candidate set.
    ///
    /// Each round probes every launching and healthy task concurrently
    /// (a task keeps being polled after promotion, so a later regression
    /// is still caught) and only proceeds once all probes resolve;
    /// `cancelled` is consulted at round boundaries so cancellation is
    /// observable without tearing a round in half.
    pub async fn validate<F>(&self, set: &mut TaskSet, cancelled: F) -> Validation
    where
        F: Fn() -> bool,
    {
        let started = Instant::now();

        loop {
            if cancelled() {
                return Validation::Cancelled;
            }
            if started.elapsed() >= self.config.validation_timeout {
                return Validation::TimedOut;
            }

            let active: Vec<usize> = set
                .tasks
                .iter()
                .enumerate()
                .filter(|(_, t)| {
                    matches!(t.status, TaskStatus::Launching | TaskStatus::Healthy)
                })
                .map(|(i, _)| i)
                .collect();

            let outcomes =
                join_all(active.iter().map(|&i| self.probe.probe(&set.tasks[i].address))).await;

            for (&i, outcome) in active.iter().zip(outcomes) {
                let task = &mut set.tasks[i];
                let result = HealthCheckResult::now(task.id.clone(), outcome);
                tracing::debug!(
                    "health check {:?} for task {} at {}",
                    result.outcome,
                    result.task,
                    result.checked_at
                );

                self.observe(task, outcome);
                if task.status == TaskStatus::Unhealthy {
                    return Validation::TaskFailed { index: i };
                }
            }

            if set.all_healthy() {
                return Validation::AllHealthy;
            }
            tokio::time::sleep(self.config.interval).await;
        }
    }
}
