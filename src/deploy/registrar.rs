// ABOUTME: Load balancer registrar: serialized register/deregister with draining.
// ABOUTME: Deregistration is idempotent and bounded by the drain timeout.

use std::sync::Arc;
use std::time::Instant;

use crate::cluster::{BalancerError, DrainState, LoadBalancer};
use crate::config::{DrainConfig, RetryConfig};
use crate::types::{ServiceName, TaskId};

use super::error::DeployError;
use super::retry::with_backoff;
use super::task_set::{Task, TaskStatus};

/// How a deregistration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Existing connections closed before the timeout.
    Drained,
    /// Drain timeout elapsed with connections still open; the task will
    /// be forcibly stopped. Logged, not fatal.
    TimedOut,
    /// The target was not in the pool; nothing to do.
    AlreadyRemoved,
}

/// Mediates all target pool mutations for one service.
///
/// Register and deregister are serialized through an async mutex so a
/// draining removal and a new registration can never interleave and
/// momentarily drop the pool below minimum capacity.
pub struct Registrar<B> {
    balancer: Arc<B>,
    service: ServiceName,
    drain: DrainConfig,
    retry: RetryConfig,
    gate: tokio::sync::Mutex<()>,
}

impl<B: LoadBalancer> Registrar<B> {
    pub fn new(
        balancer: Arc<B>,
        service: ServiceName,
        drain: DrainConfig,
        retry: RetryConfig,
    ) -> Self {
        Self {
            balancer,
            service,
            drain,
            retry,
            gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Add a task to the routed pool.
    pub async fn register(&self, task: &mut Task) -> Result<(), DeployError> {
        let _gate = self.gate.lock().await;

        with_backoff(&self.retry, BalancerError::is_transient, || {
            self.balancer.register(&self.service, &task.id, &task.address)
        })
        .await?;

        task.registered = true;
        Ok(())
    }

    /// Remove a task from the pool, waiting for connection draining.
    ///
    /// Idempotent: deregistering a task that is not in the pool returns
    /// `AlreadyRemoved` without touching the balancer further.
    pub async fn deregister(&self, task: &mut Task) -> Result<DrainOutcome, DeployError> {
        let _gate = self.gate.lock().await;

        let state = self.drain_state(&task.id).await?;
        if state == DrainState::NotRegistered {
            task.registered = false;
            return Ok(DrainOutcome::AlreadyRemoved);
        }

        with_backoff(&self.retry, BalancerError::is_transient, || {
            self.balancer.begin_drain(&self.service, &task.id)
        })
        .await?;
        if task.status != TaskStatus::Stopped {
            task.status = TaskStatus::Draining;
        }

        let deadline = Instant::now() + self.drain.timeout;
        loop {
            match self.drain_state(&task.id).await? {
                DrainState::Drained | DrainState::NotRegistered => {
                    task.registered = false;
                    return Ok(DrainOutcome::Drained);
                }
                DrainState::Draining => {}
            }

            if Instant::now() >= deadline {
                task.registered = false;
                return Ok(DrainOutcome::TimedOut);
            }
            tokio::time::sleep(self.drain.poll_interval).await;
        }
    }

    /// Current pool membership for the service.
    pub async fn registered_targets(&self) -> Result<Vec<TaskId>, DeployError> {
        let targets = with_backoff(&self.retry, BalancerError::is_transient, || {
            self.balancer.registered_targets(&self.service)
        })
        .await?;
        Ok(targets)
    }

    async fn drain_state(&self, task: &TaskId) -> Result<DrainState, DeployError> {
        let state = with_backoff(&self.retry, BalancerError::is_transient, || {
            self.balancer.drain_state(&self.service, task)
        })
        .await?;
        Ok(state)
    }
}
