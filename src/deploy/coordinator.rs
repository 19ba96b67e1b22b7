// ABOUTME: Top-level deployment coordinator: one control loop per deployment.
// ABOUTME: Sequences launch, validation, traffic shift, drain, and rollback.

use std::sync::Arc;

use crate::cluster::{LoadBalancer, Scheduler, TaskSpec};
use crate::config::Config;
use crate::health::HealthProbe;
use crate::store::DeploymentStore;
use crate::types::{ImageRef, ServiceName};

use super::deployment::Deployment;
use super::error::DeployError;
use super::lock::ActiveLock;
use super::monitor::{HealthMonitor, Validation};
use super::phase::Phase;
use super::registrar::{DrainOutcome, Registrar};
use super::rollback::restore_stable;
use super::task_set::{Generation, Task, TaskSet, TaskSetManager, TaskStatus};

/// Coordinates one deployment from PENDING to a terminal phase.
///
/// Every phase transition is persisted before the loop acts on it, so a
/// status query or a restarted process reconstructs progress from the
/// record alone. Cancellation is a store marker observed at loop
/// iteration boundaries in every phase.
pub struct Coordinator<S, B, P> {
    scheduler: Arc<S>,
    balancer: Arc<B>,
    probe: Arc<P>,
    config: Config,
    store: DeploymentStore,
}

impl<S, B, P> Coordinator<S, B, P>
where
    S: Scheduler,
    B: LoadBalancer,
    P: HealthProbe,
{
    pub fn new(
        scheduler: Arc<S>,
        balancer: Arc<B>,
        probe: Arc<P>,
        config: Config,
        store: DeploymentStore,
    ) -> Self {
        Self {
            scheduler,
            balancer,
            probe,
            config,
            store,
        }
    }

    pub fn store(&self) -> &DeploymentStore {
        &self.store
    }

    /// Accept a deployment request.
    ///
    /// Acquires the per-service advisory lock; a second concurrent
    /// request for the same service is rejected with `Conflict`, never
    /// queued.
    pub fn start(
        &self,
        service: ServiceName,
        desired_count: u32,
        image: ImageRef,
        force: bool,
    ) -> Result<(Deployment, ActiveLock), DeployError> {
        // An empty candidate generation would validate vacuously and
        // then retire every stable task.
        if desired_count == 0 {
            return Err(DeployError::Invalid(
                "desired task count must be at least 1".to_string(),
            ));
        }

        let deployment = Deployment::new(service, desired_count, image);
        let lock = ActiveLock::acquire(
            &self.store.locks_dir(),
            &deployment.service,
            &deployment.id,
            force,
        )?;
        self.store.save(&deployment)?;
        Ok((deployment, lock))
    }

    /// Run the control loop to a terminal phase. Always releases the
    /// lock and persists the final record.
    pub async fn run(
        &self,
        mut deployment: Deployment,
        lock: ActiveLock,
    ) -> Result<Deployment, DeployError> {
        if let Err(e) = self.drive(&mut deployment).await {
            // Transitions are recorded as the loop goes; an error
            // escaping here means persistence itself failed mid-flight.
            if !deployment.phase.is_terminal() {
                deployment.fail(e.to_string(), false);
            }
        }

        self.store.clear_cancel(&deployment.id);
        lock.release();
        self.store.save(&deployment)?;
        Ok(deployment)
    }

    async fn drive(&self, d: &mut Deployment) -> Result<(), DeployError> {
        let service = d.service.clone();
        let spec = TaskSpec {
            service: service.clone(),
            image: d.image.clone(),
        };
        let manager = TaskSetManager::new(
            self.scheduler.clone(),
            self.config.launch.clone(),
            self.config.retry,
        );
        let registrar = Registrar::new(
            self.balancer.clone(),
            service.clone(),
            self.config.drain.clone(),
            self.config.retry,
        );
        let monitor = HealthMonitor::new(self.probe.clone(), self.config.healthcheck.clone());

        // Live stable membership comes from the cluster and the pool,
        // never from a local cache.
        let mut stable = match self.reconcile_stable(&registrar, &service).await {
            Ok(set) => set,
            Err(e) => {
                // Nothing has been mutated yet; fail without rollback.
                d.fail(e.to_string(), false);
                self.save(d)?;
                return Ok(());
            }
        };

        // PENDING -> LAUNCHING
        d.transition(
            Phase::Launching,
            format!(
                "launching {} candidate task(s) with image {}",
                d.desired_count, d.image
            ),
        );
        self.save(d)?;

        let mut candidate = match manager.launch(&spec, d.desired_count).await {
            Ok(set) => set,
            Err((mut partial, e)) => {
                return self
                    .roll_back(d, &manager, &registrar, &mut stable, &mut partial, e)
                    .await;
            }
        };
        d.record_tasks(&stable, &candidate);
        self.save(d)?;

        if self.cancelled(d) {
            return self
                .roll_back(
                    d,
                    &manager,
                    &registrar,
                    &mut stable,
                    &mut candidate,
                    DeployError::Cancelled,
                )
                .await;
        }

        // LAUNCHING -> VALIDATING
        d.transition(Phase::Validating, "validating candidate task health");
        self.save(d)?;

        let mut replacements = vec![0u32; candidate.tasks.len()];
        loop {
            let verdict = monitor
                .validate(&mut candidate, || self.store.cancel_requested(&d.id))
                .await;

            match verdict {
                Validation::AllHealthy => break,
                Validation::TaskFailed { index } => {
                    let failed = candidate.tasks[index].id.clone();
                    d.append_event(format!("task {} exceeded the failure threshold", failed));

                    if replacements[index] < self.config.launch.replacement_budget {
                        // Retired and replaced, never revalidated.
                        if let Err(e) = manager.stop_task(&mut candidate.tasks[index]).await {
                            return self
                                .roll_back(d, &manager, &registrar, &mut stable, &mut candidate, e)
                                .await;
                        }
                        match manager.launch_replacement(&spec).await {
                            Ok(replacement) => {
                                d.append_event(format!(
                                    "replaced task {} with {}",
                                    failed, replacement.id
                                ));
                                candidate.tasks[index] = replacement;
                                replacements[index] += 1;
                                d.record_tasks(&stable, &candidate);
                                self.save(d)?;
                                continue;
                            }
                            Err(e) => {
                                return self
                                    .roll_back(
                                        d, &manager, &registrar, &mut stable, &mut candidate, e,
                                    )
                                    .await;
                            }
                        }
                    }

                    return self
                        .roll_back(
                            d,
                            &manager,
                            &registrar,
                            &mut stable,
                            &mut candidate,
                            DeployError::HealthCheckFailed { task: failed },
                        )
                        .await;
                }
                Validation::TimedOut => {
                    let secs = self.config.healthcheck.validation_timeout.as_secs();
                    return self
                        .roll_back(
                            d,
                            &manager,
                            &registrar,
                            &mut stable,
                            &mut candidate,
                            DeployError::ValidationTimeout(secs),
                        )
                        .await;
                }
                Validation::Cancelled => {
                    return self
                        .roll_back(
                            d,
                            &manager,
                            &registrar,
                            &mut stable,
                            &mut candidate,
                            DeployError::Cancelled,
                        )
                        .await;
                }
            }
        }
        d.record_tasks(&stable, &candidate);
        self.save(d)?;

        // VALIDATING -> SHIFTING: register every candidate, then drain
        // old targets one at a time (bounds simultaneous capacity loss).
        d.transition(Phase::Shifting, "shifting traffic to candidate tasks");
        self.save(d)?;

        for i in 0..candidate.tasks.len() {
            if self.cancelled(d) {
                return self
                    .roll_back(
                        d,
                        &manager,
                        &registrar,
                        &mut stable,
                        &mut candidate,
                        DeployError::Cancelled,
                    )
                    .await;
            }
            if let Err(e) = registrar.register(&mut candidate.tasks[i]).await {
                return self
                    .roll_back(d, &manager, &registrar, &mut stable, &mut candidate, e)
                    .await;
            }
        }
        d.record_tasks(&stable, &candidate);
        self.save(d)?;

        for i in 0..stable.tasks.len() {
            if self.cancelled(d) {
                return self
                    .roll_back(
                        d,
                        &manager,
                        &registrar,
                        &mut stable,
                        &mut candidate,
                        DeployError::Cancelled,
                    )
                    .await;
            }
            match registrar.deregister(&mut stable.tasks[i]).await {
                Ok(DrainOutcome::TimedOut) => {
                    d.append_event(format!(
                        "task {} did not finish draining within the drain timeout; forcing stop",
                        stable.tasks[i].id
                    ));
                }
                Ok(_) => {}
                Err(e) => {
                    return self
                        .roll_back(d, &manager, &registrar, &mut stable, &mut candidate, e)
                        .await;
                }
            }
            d.record_tasks(&stable, &candidate);
            self.save(d)?;
        }

        // SHIFTING -> DRAINING_OLD: old generation is out of the pool;
        // stop it.
        d.transition(Phase::DrainingOld, "stopping retired stable tasks");
        self.save(d)?;

        for i in 0..stable.tasks.len() {
            if self.cancelled(d) {
                return self
                    .roll_back(
                        d,
                        &manager,
                        &registrar,
                        &mut stable,
                        &mut candidate,
                        DeployError::Cancelled,
                    )
                    .await;
            }
            if let Err(e) = manager.stop_task(&mut stable.tasks[i]).await {
                return self
                    .roll_back(d, &manager, &registrar, &mut stable, &mut candidate, e)
                    .await;
            }
            d.record_tasks(&stable, &candidate);
            self.save(d)?;
        }

        // DRAINING_OLD -> COMPLETED
        candidate.relabel_stable();
        d.transition(
            Phase::Completed,
            "deployment completed; candidate generation is now stable",
        );
        d.record_tasks(&candidate, &TaskSet::new(Generation::Candidate, 0));
        self.save(d)?;
        Ok(())
    }

    /// Rebuild the stable task set from the scheduler's running tasks
    /// and the balancer's registered targets.
    ///
    /// Pool targets with no running task are routing to nothing; they
    /// are drained out here rather than carried as phantom members.
    async fn reconcile_stable(
        &self,
        registrar: &Registrar<B>,
        service: &ServiceName,
    ) -> Result<TaskSet, DeployError> {
        let registered = registrar.registered_targets().await?;
        let running = self.scheduler.list_tasks(service).await?;

        let mut stable = TaskSet::new(Generation::Stable, 0);
        for launched in running {
            if registered.contains(&launched.id) {
                let mut task = Task::new(launched.id, launched.address);
                task.status = TaskStatus::Healthy;
                task.registered = true;
                stable.tasks.push(task);
            }
        }
        stable.desired_count = stable.tasks.len() as u32;

        for id in registered {
            if !stable.tasks.iter().any(|t| t.id == id) {
                tracing::warn!("pool target {} has no running task; removing it", id);
                let mut stale = Task::new(id, String::new());
                registrar.deregister(&mut stale).await?;
            }
        }

        Ok(stable)
    }

    async fn roll_back(
        &self,
        d: &mut Deployment,
        manager: &TaskSetManager<S>,
        registrar: &Registrar<B>,
        stable: &mut TaskSet,
        candidate: &mut TaskSet,
        cause: DeployError,
    ) -> Result<(), DeployError> {
        d.transition(Phase::RollingBack, format!("rolling back: {}", cause));
        self.save(d)?;

        match restore_stable(manager, registrar, stable, candidate).await {
            Ok(()) => {
                d.record_tasks(stable, candidate);
                d.append_event("prior stable task set restored");
                d.fail(cause.to_string(), false);
            }
            Err(rollback_err) => {
                d.record_tasks(stable, candidate);
                d.fail(format!("{}; {}", cause, rollback_err), true);
            }
        }
        self.save(d)?;
        Ok(())
    }

    fn cancelled(&self, d: &Deployment) -> bool {
        self.store.cancel_requested(&d.id)
    }

    fn save(&self, d: &Deployment) -> Result<(), DeployError> {
        self.store.save(d).map_err(DeployError::from)
    }
}
