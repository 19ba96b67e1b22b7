// ABOUTME: Rollback: restore traffic to the prior stable task set.
// ABOUTME: Re-registers drained stable tasks and retires all candidates.

use crate::cluster::{LoadBalancer, Scheduler};

use super::error::DeployError;
use super::registrar::{DrainOutcome, Registrar};
use super::task_set::{TaskSet, TaskSetManager, TaskStatus};

/// Restore the registrar state to route 100% of traffic to the prior
/// stable task set, then stop and deregister every candidate task.
///
/// Each collaborator call already carries the bounded retry budget for
/// transient errors; an error surfacing here means the budget is spent
/// and the deployment must be flagged for manual intervention.
pub async fn restore_stable<S, B>(
    manager: &TaskSetManager<S>,
    registrar: &Registrar<B>,
    stable: &mut TaskSet,
    candidate: &mut TaskSet,
) -> Result<(), DeployError>
where
    S: Scheduler,
    B: LoadBalancer,
{
    // Re-register any stable tasks deregistered mid-shift.
    for task in &mut stable.tasks {
        if task.status == TaskStatus::Stopped {
            // A stable task already stopped cannot carry traffic again;
            // restoring it is beyond what the registrar can do.
            return Err(DeployError::RollbackFailed(format!(
                "stable task {} was already stopped",
                task.id
            )));
        }
        if !task.registered {
            registrar
                .register(task)
                .await
                .map_err(|e| DeployError::RollbackFailed(e.to_string()))?;
            task.status = TaskStatus::Healthy;
        }
    }

    // Retire the candidate generation: out of the pool first, then stop.
    for task in &mut candidate.tasks {
        match registrar.deregister(task).await {
            Ok(DrainOutcome::TimedOut) => {
                tracing::warn!("candidate task {} drain timed out during rollback", task.id);
            }
            Ok(_) => {}
            Err(e) => return Err(DeployError::RollbackFailed(e.to_string())),
        }

        manager
            .stop_task(task)
            .await
            .map_err(|e| DeployError::RollbackFailed(e.to_string()))?;
    }

    Ok(())
}
