// ABOUTME: Rollback-path scenarios: cancellation mid-shift, drain behavior,
// ABOUTME: restore failures that require manual intervention.

mod support;

use std::collections::HashSet;
use std::sync::Arc;

use tempfile::TempDir;

use relevo::config::Config;
use relevo::deploy::{
    Coordinator, Deployment, DrainOutcome, Phase, Registrar, Task,
};
use relevo::store::DeploymentStore;
use relevo::types::{ImageRef, ServiceName, TaskId};

use support::{service, test_config, FakeBalancer, FakeProbe, FakeScheduler};

struct Harness {
    scheduler: Arc<FakeScheduler>,
    balancer: Arc<FakeBalancer>,
    coordinator: Coordinator<FakeScheduler, FakeBalancer, FakeProbe>,
    store: DeploymentStore,
    _state: TempDir,
}

fn harness() -> Harness {
    harness_with(|_| {})
}

fn harness_with(tweak: impl FnOnce(&mut Config)) -> Harness {
    let state = TempDir::new().unwrap();
    let mut config = test_config(state.path());
    tweak(&mut config);

    let scheduler = Arc::new(FakeScheduler::new());
    let balancer = Arc::new(FakeBalancer::new());
    let probe = Arc::new(FakeProbe::all_pass());
    let store = DeploymentStore::open(state.path()).unwrap();
    let coordinator = Coordinator::new(
        scheduler.clone(),
        balancer.clone(),
        probe,
        config,
        store.clone(),
    );

    Harness {
        scheduler,
        balancer,
        coordinator,
        store,
        _state: state,
    }
}

fn image() -> ImageRef {
    ImageRef::parse("registry.example.com/team/api:2.0.0").unwrap()
}

impl Harness {
    fn seed_stable(&self, svc: &ServiceName, count: u32) -> Vec<TaskId> {
        (0..count)
            .map(|_| {
                let task = self.scheduler.seed_task(svc);
                self.balancer.seed_target(svc, &task.id, &task.address);
                task.id
            })
            .collect()
    }

    async fn run_prepared(
        &self,
        deployment: Deployment,
        lock: relevo::deploy::ActiveLock,
    ) -> Deployment {
        self.coordinator.run(deployment, lock).await.unwrap()
    }
}

fn id_set(ids: &[TaskId]) -> HashSet<TaskId> {
    ids.iter().cloned().collect()
}

#[tokio::test]
async fn cancel_mid_shift_restores_drained_stable_tasks() {
    let h = harness();
    let svc = service("api");
    let old = h.seed_stable(&svc, 3);

    let (deployment, lock) = h
        .coordinator
        .start(svc.clone(), 3, image(), false)
        .unwrap();

    // Request cancellation the moment the first old target starts
    // draining. The marker is observed at the next loop iteration, so
    // exactly one stable task leaves the pool before rollback.
    let store = h.store.clone();
    let id = deployment.id.clone();
    let old_ids = id_set(&old);
    let hook_old = old_ids.clone();
    h.balancer.on_begin_drain(move |task| {
        if hook_old.contains(task) {
            store.request_cancel(&id).unwrap();
        }
    });

    let finished = h.run_prepared(deployment, lock).await;

    assert_eq!(finished.phase, Phase::Failed);
    let failure = finished.failure.as_ref().unwrap();
    assert!(failure.cause.contains("cancelled"), "{}", failure.cause);
    assert!(!failure.manual_intervention_required);

    // No further stable target was deregistered after the marker.
    let old_drains: Vec<_> = h
        .balancer
        .drain_begun_on()
        .into_iter()
        .filter(|t| old_ids.contains(t))
        .collect();
    assert_eq!(old_drains.len(), 1);

    // The drained stable task was re-registered; the full old
    // generation serves traffic again and the candidates are gone.
    assert_eq!(id_set(&h.balancer.routed_ids(&svc)), old_ids);
    assert_eq!(id_set(&h.scheduler.running_ids(&svc)), old_ids);
}

#[tokio::test]
async fn failed_restore_requires_manual_intervention() {
    let h = harness();
    let svc = service("api");
    let old = h.seed_stable(&svc, 2);

    let (deployment, lock) = h
        .coordinator
        .start(svc.clone(), 2, image(), false)
        .unwrap();

    // Cancel once the first old target drains, and make every register
    // call fail from then on: rollback cannot put the drained stable
    // task back into the pool.
    let store = h.store.clone();
    let id = deployment.id.clone();
    let balancer = h.balancer.clone();
    let old_ids = id_set(&old);
    h.balancer.on_begin_drain(move |task| {
        if old_ids.contains(task) {
            store.request_cancel(&id).unwrap();
            balancer.fail_next_registers_transiently(100);
        }
    });

    let finished = h.run_prepared(deployment, lock).await;

    assert_eq!(finished.phase, Phase::Failed);
    let failure = finished.failure.as_ref().unwrap();
    assert!(failure.manual_intervention_required);
    assert!(failure.cause.contains("rollback failed"), "{}", failure.cause);
}

#[tokio::test]
async fn slow_drain_is_forced_and_does_not_fail_the_deployment() {
    let h = harness();
    let svc = service("api");
    let old = h.seed_stable(&svc, 1);
    // Far more polls than fit in the drain timeout.
    h.balancer.set_drain_polls(1_000_000);

    let (deployment, lock) = h
        .coordinator
        .start(svc.clone(), 1, image(), false)
        .unwrap();
    let finished = h.run_prepared(deployment, lock).await;

    assert_eq!(finished.phase, Phase::Completed);
    assert!(finished
        .events
        .iter()
        .any(|e| e.message.contains("forcing stop")));
    assert_eq!(id_set(&h.scheduler.stopped_ids(&svc)), id_set(&old));
}

// =============================================================================
// Registrar-level behavior
// =============================================================================

fn registrar(balancer: Arc<FakeBalancer>, svc: &ServiceName) -> Registrar<FakeBalancer> {
    let config = test_config(std::path::Path::new("/tmp"));
    Registrar::new(balancer, svc.clone(), config.drain, config.retry)
}

#[tokio::test]
async fn deregister_is_idempotent() {
    let svc = service("api");
    let balancer = Arc::new(FakeBalancer::new());
    let registrar = registrar(balancer.clone(), &svc);

    let mut task = Task::new(TaskId::new("t1"), "10.0.0.1:8080".to_string());
    registrar.register(&mut task).await.unwrap();
    assert!(task.registered);

    let first = registrar.deregister(&mut task).await.unwrap();
    assert_eq!(first, DrainOutcome::Drained);
    assert!(!task.registered);

    let second = registrar.deregister(&mut task).await.unwrap();
    assert_eq!(second, DrainOutcome::AlreadyRemoved);

    // Only the first call actually initiated a drain.
    assert_eq!(balancer.drain_begun_on().len(), 1);
}

#[tokio::test]
async fn deregister_of_never_registered_task_is_a_no_op() {
    let svc = service("api");
    let balancer = Arc::new(FakeBalancer::new());
    let registrar = registrar(balancer.clone(), &svc);

    let mut task = Task::new(TaskId::new("t9"), "10.0.0.9:8080".to_string());
    let outcome = registrar.deregister(&mut task).await.unwrap();
    assert_eq!(outcome, DrainOutcome::AlreadyRemoved);
    assert!(balancer.drain_begun_on().is_empty());
}

#[tokio::test]
async fn deregister_reports_timeout_when_connections_linger() {
    let svc = service("api");
    let balancer = Arc::new(FakeBalancer::new());
    balancer.set_drain_polls(1_000_000);
    let registrar = registrar(balancer.clone(), &svc);

    let mut task = Task::new(TaskId::new("t1"), "10.0.0.1:8080".to_string());
    registrar.register(&mut task).await.unwrap();

    let outcome = registrar.deregister(&mut task).await.unwrap();
    assert_eq!(outcome, DrainOutcome::TimedOut);
}

#[tokio::test]
async fn register_retries_transient_balancer_errors() {
    let svc = service("api");
    let balancer = Arc::new(FakeBalancer::new());
    balancer.fail_next_registers_transiently(2);
    let registrar = registrar(balancer.clone(), &svc);

    let mut task = Task::new(TaskId::new("t1"), "10.0.0.1:8080".to_string());
    registrar.register(&mut task).await.unwrap();
    assert_eq!(balancer.routed_ids(&svc), vec![TaskId::new("t1")]);
}
