// ABOUTME: Deployment phase enum, the tagged state of the coordinator machine.
// ABOUTME: Serialized with deployment records so progress survives restarts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a deployment stands. Persisted after every transition so status
/// queries and crash recovery reconstruct progress from the record alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Created, control loop not yet started.
    Pending,
    /// Candidate task set being launched on the cluster.
    Launching,
    /// Candidate tasks under health check validation.
    Validating,
    /// Candidate tasks being registered with the load balancer.
    Shifting,
    /// Old stable tasks being drained and stopped, one at a time.
    DrainingOld,
    /// Restoring the prior stable task set after a failure or cancel.
    RollingBack,
    /// Terminal: candidate promoted to stable.
    Completed,
    /// Terminal: deployment did not take effect.
    Failed,
}

impl Phase {
    /// Terminal phases admit no further mutation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Pending => "PENDING",
            Phase::Launching => "LAUNCHING",
            Phase::Validating => "VALIDATING",
            Phase::Shifting => "SHIFTING",
            Phase::DrainingOld => "DRAINING_OLD",
            Phase::RollingBack => "ROLLING_BACK",
            Phase::Completed => "COMPLETED",
            Phase::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}
