// ABOUTME: Append-only deployment event log entries.
// ABOUTME: Used for audit and for reconstructing rollback cause.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::phase::Phase;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentEvent {
    pub at: DateTime<Utc>,
    pub phase: Phase,
    pub message: String,
}

impl DeploymentEvent {
    pub fn now(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            phase,
            message: message.into(),
        }
    }
}
