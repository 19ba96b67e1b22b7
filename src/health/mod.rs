// ABOUTME: Health check primitives: probe trait, outcomes, and results.
// ABOUTME: The HTTP implementation lives in http.rs.

mod http;

pub use http::HttpProbe;

use crate::types::TaskId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of one health check probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    /// The endpoint answered with a non-success status, or the
    /// connection failed outright.
    Fail,
    /// No response arrived within the probe timeout window.
    Timeout,
}

/// One recorded health check observation for a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub task: TaskId,
    pub outcome: Outcome,
    pub checked_at: DateTime<Utc>,
}

impl HealthCheckResult {
    pub fn now(task: TaskId, outcome: Outcome) -> Self {
        Self {
            task,
            outcome,
            checked_at: Utc::now(),
        }
    }
}

/// A readiness probe against one task address.
///
/// Implementations decide transport; the monitor only cares about the
/// three-way outcome.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, address: &str) -> Outcome;
}
