// ABOUTME: Shared test support: deterministic in-memory collaborator fakes.
// ABOUTME: Replaces the live cluster, balancer, and health endpoints.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use relevo::cluster::{
    BalancerError, DrainState, LaunchedTask, LoadBalancer, ScheduleError, Scheduler, TaskRunState,
    TaskSpec,
};
use relevo::config::{Config, RetryConfig};
use relevo::health::{HealthProbe, Outcome};
use relevo::types::{ServiceName, TaskId};

/// Config tuned for fast tests: millisecond intervals, tiny timeouts.
pub fn test_config(state_dir: &Path) -> Config {
    let mut config = Config::template();
    config.state_dir = Some(state_dir.to_path_buf());
    config.healthcheck.interval = Duration::from_millis(1);
    config.healthcheck.timeout = Duration::from_millis(20);
    config.healthcheck.validation_timeout = Duration::from_millis(2000);
    config.drain.timeout = Duration::from_millis(50);
    config.drain.poll_interval = Duration::from_millis(1);
    config.retry = RetryConfig {
        attempts: 3,
        backoff: Duration::from_millis(1),
    };
    config.launch.timeout = Duration::from_millis(200);
    config.launch.poll_interval = Duration::from_millis(1);
    config.launch.replacement_budget = 1;
    config
}

pub fn service(name: &str) -> ServiceName {
    ServiceName::new(name).unwrap()
}

// =============================================================================
// FakeScheduler
// =============================================================================

struct FakeTask {
    id: TaskId,
    service: String,
    address: String,
    state: TaskRunState,
}

struct SchedulerInner {
    next_ordinal: u32,
    tasks: Vec<FakeTask>,
    /// Max concurrently running tasks before launches fail with Capacity.
    capacity: Option<u32>,
    /// Next N launch calls fail with a transient Unavailable error.
    transient_launch_failures: u32,
}

pub struct FakeScheduler {
    inner: Mutex<SchedulerInner>,
}

impl FakeScheduler {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SchedulerInner {
                next_ordinal: 1,
                tasks: Vec::new(),
                capacity: None,
                transient_launch_failures: 0,
            }),
        }
    }

    pub fn set_capacity(&self, max_running: u32) {
        self.inner.lock().unwrap().capacity = Some(max_running);
    }

    pub fn fail_next_launches_transiently(&self, count: u32) {
        self.inner.lock().unwrap().transient_launch_failures = count;
    }

    /// Seed a running task, as if launched by an earlier deployment.
    pub fn seed_task(&self, service: &ServiceName) -> LaunchedTask {
        let mut inner = self.inner.lock().unwrap();
        let ordinal = inner.next_ordinal;
        inner.next_ordinal += 1;
        let id = TaskId::new(format!("t{}", ordinal));
        let address = format!("10.0.0.{}:8080", ordinal);
        inner.tasks.push(FakeTask {
            id: id.clone(),
            service: service.to_string(),
            address: address.clone(),
            state: TaskRunState::Running,
        });
        LaunchedTask { id, address }
    }

    pub fn running_ids(&self, service: &ServiceName) -> Vec<TaskId> {
        self.inner
            .lock()
            .unwrap()
            .tasks
            .iter()
            .filter(|t| t.service == service.as_str() && t.state == TaskRunState::Running)
            .map(|t| t.id.clone())
            .collect()
    }

    pub fn stopped_ids(&self, service: &ServiceName) -> Vec<TaskId> {
        self.inner
            .lock()
            .unwrap()
            .tasks
            .iter()
            .filter(|t| t.service == service.as_str() && t.state == TaskRunState::Stopped)
            .map(|t| t.id.clone())
            .collect()
    }

    /// Address a future launch will receive, given its ordinal.
    pub fn address_for_ordinal(ordinal: u32) -> String {
        format!("10.0.0.{}:8080", ordinal)
    }
}

#[async_trait]
impl Scheduler for FakeScheduler {
    async fn launch_task(&self, spec: &TaskSpec) -> Result<LaunchedTask, ScheduleError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.transient_launch_failures > 0 {
            inner.transient_launch_failures -= 1;
            return Err(ScheduleError::Unavailable("scheduler restarting".into()));
        }

        let running = inner
            .tasks
            .iter()
            .filter(|t| t.state != TaskRunState::Stopped)
            .count() as u32;
        if let Some(capacity) = inner.capacity {
            if running >= capacity {
                return Err(ScheduleError::Capacity(format!(
                    "cluster at {} of {} tasks",
                    running, capacity
                )));
            }
        }

        let ordinal = inner.next_ordinal;
        inner.next_ordinal += 1;
        let id = TaskId::new(format!("t{}", ordinal));
        let address = format!("10.0.0.{}:8080", ordinal);
        inner.tasks.push(FakeTask {
            id: id.clone(),
            service: spec.service.to_string(),
            address: address.clone(),
            state: TaskRunState::Running,
        });
        Ok(LaunchedTask { id, address })
    }

    async fn task_state(&self, id: &TaskId) -> Result<TaskRunState, ScheduleError> {
        self.inner
            .lock()
            .unwrap()
            .tasks
            .iter()
            .find(|t| &t.id == id)
            .map(|t| t.state)
            .ok_or_else(|| ScheduleError::NotFound(id.to_string()))
    }

    async fn stop_task(&self, id: &TaskId) -> Result<(), ScheduleError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(task) = inner.tasks.iter_mut().find(|t| &t.id == id) {
            task.state = TaskRunState::Stopped;
        }
        Ok(())
    }

    async fn list_tasks(&self, service: &ServiceName) -> Result<Vec<LaunchedTask>, ScheduleError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .tasks
            .iter()
            .filter(|t| t.service == service.as_str() && t.state == TaskRunState::Running)
            .map(|t| LaunchedTask {
                id: t.id.clone(),
                address: t.address.clone(),
            })
            .collect())
    }
}

// =============================================================================
// FakeBalancer
// =============================================================================

struct PoolEntry {
    task: TaskId,
    address: String,
    draining: bool,
    polls_left: u32,
}

struct BalancerInner {
    pools: HashMap<String, Vec<PoolEntry>>,
    /// Lowest routed (non-draining) count observed per service.
    min_routed: HashMap<String, usize>,
    /// Tasks drain was actually begun on (no-op calls are not recorded).
    drain_begun: Vec<TaskId>,
    /// drain_state polls before a draining target reports Drained.
    drain_polls: u32,
    /// Next N register calls fail with a transient error.
    transient_register_failures: u32,
}

type DrainHook = Box<dyn Fn(&TaskId) + Send + Sync>;

pub struct FakeBalancer {
    inner: Mutex<BalancerInner>,
    on_begin_drain: Mutex<Option<DrainHook>>,
}

impl FakeBalancer {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BalancerInner {
                pools: HashMap::new(),
                min_routed: HashMap::new(),
                drain_begun: Vec::new(),
                drain_polls: 0,
                transient_register_failures: 0,
            }),
            on_begin_drain: Mutex::new(None),
        }
    }

    pub fn set_drain_polls(&self, polls: u32) {
        self.inner.lock().unwrap().drain_polls = polls;
    }

    pub fn fail_next_registers_transiently(&self, count: u32) {
        self.inner.lock().unwrap().transient_register_failures = count;
    }

    /// Install a hook invoked when drain actually begins on a target.
    pub fn on_begin_drain(&self, hook: impl Fn(&TaskId) + Send + Sync + 'static) {
        *self.on_begin_drain.lock().unwrap() = Some(Box::new(hook));
    }

    /// Seed a registered target, as if from an earlier deployment.
    pub fn seed_target(&self, service: &ServiceName, task: &TaskId, address: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .pools
            .entry(service.to_string())
            .or_default()
            .push(PoolEntry {
                task: task.clone(),
                address: address.to_string(),
                draining: false,
                polls_left: 0,
            });
        Self::note_routed(&mut inner, service.as_str());
    }

    pub fn routed_ids(&self, service: &ServiceName) -> Vec<TaskId> {
        self.inner
            .lock()
            .unwrap()
            .pools
            .get(service.as_str())
            .map(|pool| {
                pool.iter()
                    .filter(|e| !e.draining)
                    .map(|e| e.task.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Start measuring the routed-count minimum from the current state,
    /// discarding dips recorded while seeding.
    pub fn reset_min_routed(&self, service: &ServiceName) {
        let mut inner = self.inner.lock().unwrap();
        let routed = inner
            .pools
            .get(service.as_str())
            .map(|pool| pool.iter().filter(|e| !e.draining).count())
            .unwrap_or(0);
        inner.min_routed.insert(service.to_string(), routed);
    }

    pub fn min_routed(&self, service: &ServiceName) -> usize {
        self.inner
            .lock()
            .unwrap()
            .min_routed
            .get(service.as_str())
            .copied()
            .unwrap_or(0)
    }

    pub fn drain_begun_on(&self) -> Vec<TaskId> {
        self.inner.lock().unwrap().drain_begun.clone()
    }

    fn note_routed(inner: &mut BalancerInner, service: &str) {
        let routed = inner
            .pools
            .get(service)
            .map(|pool| pool.iter().filter(|e| !e.draining).count())
            .unwrap_or(0);
        inner
            .min_routed
            .entry(service.to_string())
            .and_modify(|m| *m = (*m).min(routed))
            .or_insert(routed);
    }
}

#[async_trait]
impl LoadBalancer for FakeBalancer {
    async fn register(
        &self,
        service: &ServiceName,
        task: &TaskId,
        address: &str,
    ) -> Result<(), BalancerError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.transient_register_failures > 0 {
            inner.transient_register_failures -= 1;
            return Err(BalancerError::Unavailable("balancer reloading".into()));
        }

        let pool = inner.pools.entry(service.to_string()).or_default();
        if !pool.iter().any(|e| &e.task == task) {
            pool.push(PoolEntry {
                task: task.clone(),
                address: address.to_string(),
                draining: false,
                polls_left: 0,
            });
        }
        Self::note_routed(&mut inner, service.as_str());
        Ok(())
    }

    async fn begin_drain(
        &self,
        service: &ServiceName,
        task: &TaskId,
    ) -> Result<(), BalancerError> {
        let mut begun = false;
        {
            let mut inner = self.inner.lock().unwrap();
            let drain_polls = inner.drain_polls;
            if let Some(pool) = inner.pools.get_mut(service.as_str()) {
                if let Some(entry) = pool.iter_mut().find(|e| &e.task == task && !e.draining) {
                    entry.draining = true;
                    entry.polls_left = drain_polls;
                    begun = true;
                }
            }
            if begun {
                inner.drain_begun.push(task.clone());
                Self::note_routed(&mut inner, service.as_str());
            }
        }

        if begun {
            if let Some(hook) = self.on_begin_drain.lock().unwrap().as_ref() {
                hook(task);
            }
        }
        Ok(())
    }

    async fn drain_state(
        &self,
        service: &ServiceName,
        task: &TaskId,
    ) -> Result<DrainState, BalancerError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(pool) = inner.pools.get_mut(service.as_str()) else {
            return Ok(DrainState::NotRegistered);
        };
        let Some(index) = pool.iter().position(|e| &e.task == task) else {
            return Ok(DrainState::NotRegistered);
        };

        if !pool[index].draining {
            return Ok(DrainState::Draining);
        }

        if pool[index].polls_left == 0 {
            pool.remove(index);
            Self::note_routed(&mut inner, service.as_str());
            return Ok(DrainState::Drained);
        }

        pool[index].polls_left -= 1;
        Ok(DrainState::Draining)
    }

    async fn registered_targets(
        &self,
        service: &ServiceName,
    ) -> Result<Vec<TaskId>, BalancerError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .pools
            .get(service.as_str())
            .map(|pool| pool.iter().map(|e| e.task.clone()).collect())
            .unwrap_or_default())
    }
}

// =============================================================================
// FakeProbe
// =============================================================================

/// Probe with per-address scripted outcomes; unscripted addresses pass.
pub struct FakeProbe {
    constant: Mutex<HashMap<String, Outcome>>,
    scripted: Mutex<HashMap<String, VecDeque<Outcome>>>,
}

impl FakeProbe {
    pub fn all_pass() -> Self {
        Self {
            constant: Mutex::new(HashMap::new()),
            scripted: Mutex::new(HashMap::new()),
        }
    }

    /// Every probe of `address` yields `outcome`.
    pub fn set_constant(&self, address: &str, outcome: Outcome) {
        self.constant
            .lock()
            .unwrap()
            .insert(address.to_string(), outcome);
    }

    /// The next probes of `address` yield these outcomes in order, then
    /// fall back to the constant (or Pass).
    pub fn script(&self, address: &str, outcomes: impl IntoIterator<Item = Outcome>) {
        self.scripted
            .lock()
            .unwrap()
            .insert(address.to_string(), outcomes.into_iter().collect());
    }
}

#[async_trait]
impl HealthProbe for FakeProbe {
    async fn probe(&self, address: &str) -> Outcome {
        if let Some(queue) = self.scripted.lock().unwrap().get_mut(address) {
            if let Some(outcome) = queue.pop_front() {
                return outcome;
            }
        }
        self.constant
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .unwrap_or(Outcome::Pass)
    }
}
