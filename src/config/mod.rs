// ABOUTME: Configuration types and parsing for relevo.yml.
// ABOUTME: Handles YAML parsing, file discovery, and tuning defaults.

mod healthcheck;
mod init;

pub use healthcheck::HealthcheckConfig;
pub use init::init_config;

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "relevo.yml";
pub const CONFIG_FILENAME_ALT: &str = "relevo.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address (host:port) of the compute cluster scheduler API.
    pub scheduler_addr: String,

    /// Address (host:port) of the load balancer target pool API.
    pub balancer_addr: String,

    #[serde(default)]
    pub healthcheck: HealthcheckConfig,

    #[serde(default)]
    pub drain: DrainConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub launch: LaunchConfig,

    /// Override for the deployment state directory
    /// (default: ~/.local/state/relevo).
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

impl Config {
    /// Parse a config file at the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Find and parse a config file, walking up from `start_dir`.
    pub fn discover(start_dir: &Path) -> Result<Self> {
        let mut dir = Some(start_dir);
        while let Some(current) = dir {
            for name in [CONFIG_FILENAME, CONFIG_FILENAME_ALT] {
                let candidate = current.join(name);
                if candidate.is_file() {
                    return Self::load(&candidate);
                }
            }
            dir = current.parent();
        }
        Err(Error::ConfigNotFound(start_dir.to_path_buf()))
    }

    /// A complete config with default tuning, used by `init` and tests.
    pub fn template() -> Self {
        Self {
            scheduler_addr: "127.0.0.1:7433".to_string(),
            balancer_addr: "127.0.0.1:7434".to_string(),
            healthcheck: HealthcheckConfig::default(),
            drain: DrainConfig::default(),
            retry: RetryConfig::default(),
            launch: LaunchConfig::default(),
            state_dir: None,
        }
    }
}

/// Connection draining behavior for old-task removal.
#[derive(Debug, Clone, Deserialize)]
pub struct DrainConfig {
    /// How long to wait for in-flight connections to close before the
    /// task is forcibly stopped.
    #[serde(default = "default_drain_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// How often to ask the balancer whether draining has finished.
    #[serde(default = "default_drain_poll", with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            timeout: default_drain_timeout(),
            poll_interval: default_drain_poll(),
        }
    }
}

fn default_drain_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_drain_poll() -> Duration {
    Duration::from_secs(1)
}

/// Bounded retry policy for transient scheduler/balancer errors.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Initial backoff, doubled after each failed attempt.
    #[serde(default = "default_backoff", with = "humantime_serde")]
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            backoff: default_backoff(),
        }
    }
}

fn default_attempts() -> u32 {
    3
}

fn default_backoff() -> Duration {
    Duration::from_millis(500)
}

/// Task launch behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct LaunchConfig {
    /// How long to wait for the scheduler to confirm a task is running.
    #[serde(default = "default_launch_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// How often to poll the scheduler for launch confirmation.
    #[serde(default = "default_launch_poll", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// How many replacement tasks may be launched for a task slot whose
    /// occupant failed validation, before the deployment rolls back.
    #[serde(default = "default_replacement_budget")]
    pub replacement_budget: u32,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            timeout: default_launch_timeout(),
            poll_interval: default_launch_poll(),
            replacement_budget: default_replacement_budget(),
        }
    }
}

fn default_launch_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_launch_poll() -> Duration {
    Duration::from_secs(1)
}

fn default_replacement_budget() -> u32 {
    1
}
