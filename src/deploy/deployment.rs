// ABOUTME: The persisted deployment record: identity, phase, events, task snapshots.
// ABOUTME: Becomes immutable history once a terminal phase is recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{DeploymentId, ImageRef, ServiceName, TaskId};

use super::event::DeploymentEvent;
use super::phase::Phase;
use super::task_set::{TaskSet, TaskStatus};

/// Why a deployment ended in FAILED.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureInfo {
    pub cause: String,
    /// Set when rollback itself could not complete and an operator has
    /// to reconcile the cluster by hand.
    pub manual_intervention_required: bool,
}

/// Persisted snapshot of one task's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub address: String,
    pub status: TaskStatus,
    pub registered: bool,
}

/// One deployment: the transition of a service from its stable task set
/// to a candidate generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,
    pub service: ServiceName,
    pub image: ImageRef,
    pub desired_count: u32,
    pub phase: Phase,
    pub created_at: DateTime<Utc>,
    pub events: Vec<DeploymentEvent>,
    #[serde(default)]
    pub failure: Option<FailureInfo>,
    /// Stable-generation membership routed before the shift began.
    #[serde(default)]
    pub stable_tasks: Vec<TaskRecord>,
    #[serde(default)]
    pub candidate_tasks: Vec<TaskRecord>,
}

impl Deployment {
    pub fn new(service: ServiceName, desired_count: u32, image: ImageRef) -> Self {
        let created_at = Utc::now();
        let id = DeploymentId::new(format!(
            "{}-{}",
            service,
            created_at.format("%Y%m%d%H%M%S%3f")
        ));
        let mut deployment = Self {
            id,
            service,
            image,
            desired_count,
            phase: Phase::Pending,
            created_at,
            events: Vec::new(),
            failure: None,
            stable_tasks: Vec::new(),
            candidate_tasks: Vec::new(),
        };
        deployment.append_event("deployment created");
        deployment
    }

    /// Append an event under the current phase.
    pub fn append_event(&mut self, message: impl Into<String>) {
        self.events.push(DeploymentEvent::now(self.phase, message));
    }

    /// Move to a new phase and record the transition.
    ///
    /// Terminal phases are frozen; transitioning out of one is a logic
    /// error and is ignored with a warning rather than corrupting history.
    pub fn transition(&mut self, phase: Phase, message: impl Into<String>) {
        if self.phase.is_terminal() {
            tracing::warn!(
                "ignoring transition from terminal phase {} to {}",
                self.phase,
                phase
            );
            return;
        }
        self.phase = phase;
        self.append_event(message);
    }

    /// Record terminal failure with its cause.
    pub fn fail(&mut self, cause: impl Into<String>, manual_intervention_required: bool) {
        let cause = cause.into();
        self.transition(Phase::Failed, format!("deployment failed: {}", cause));
        self.failure = Some(FailureInfo {
            cause,
            manual_intervention_required,
        });
    }

    /// Snapshot live task sets into the persisted record.
    pub fn record_tasks(&mut self, stable: &TaskSet, candidate: &TaskSet) {
        self.stable_tasks = stable.tasks.iter().map(TaskRecord::from).collect();
        self.candidate_tasks = candidate.tasks.iter().map(TaskRecord::from).collect();
    }
}

impl From<&super::task_set::Task> for TaskRecord {
    fn from(task: &super::task_set::Task) -> Self {
        Self {
            id: task.id.clone(),
            address: task.address.clone(),
            status: task.status,
            registered: task.registered,
        }
    }
}
