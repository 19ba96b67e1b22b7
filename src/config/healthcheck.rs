// ABOUTME: Health check configuration for candidate task validation.
// ABOUTME: Defines HTTP probe parameters, thresholds, and phase timeout.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct HealthcheckConfig {
    /// Path probed with GET on each task's address; 2xx means ready.
    #[serde(default = "default_path")]
    pub path: String,

    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Per-probe response deadline. No response within this window
    /// counts as a timeout rather than a plain failure.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Consecutive passes required before a task is marked healthy.
    #[serde(default = "default_healthy_threshold")]
    pub healthy_threshold: u32,

    /// Accumulated failures (fail + timeout) that retire a task.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Overall deadline for the validation phase.
    #[serde(default = "default_validation_timeout", with = "humantime_serde")]
    pub validation_timeout: Duration,
}

impl Default for HealthcheckConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            interval: default_interval(),
            timeout: default_timeout(),
            healthy_threshold: default_healthy_threshold(),
            failure_threshold: default_failure_threshold(),
            validation_timeout: default_validation_timeout(),
        }
    }
}

fn default_path() -> String {
    "/health".to_string()
}

fn default_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_healthy_threshold() -> u32 {
    3
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_validation_timeout() -> Duration {
    Duration::from_secs(120)
}
