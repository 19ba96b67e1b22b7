// ABOUTME: Deployment orchestration: phase state machine, task sets, rollback.
// ABOUTME: The Coordinator sequences launch, validation, traffic shift, and drain.

mod coordinator;
mod deployment;
mod error;
mod event;
mod lock;
mod monitor;
mod phase;
mod registrar;
mod retry;
mod rollback;
mod task_set;

pub use coordinator::Coordinator;
pub use deployment::{Deployment, FailureInfo, TaskRecord};
pub use error::DeployError;
pub use event::DeploymentEvent;
pub use lock::{ActiveLock, LockInfo};
pub use monitor::{HealthMonitor, Validation};
pub use phase::Phase;
pub use registrar::{DrainOutcome, Registrar};
pub use retry::with_backoff;
pub use rollback::restore_stable;
pub use task_set::{Generation, Task, TaskSet, TaskSetManager, TaskStatus};
