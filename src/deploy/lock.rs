// ABOUTME: Per-service advisory lock enforcing one active deployment at a time.
// ABOUTME: Uses atomic file creation with holder info stored in the state dir.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::{DeploymentId, ServiceName};

use super::DeployError;

/// Information about who holds the active-deployment lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    /// Service being deployed.
    pub service: String,
    /// Deployment the lock belongs to.
    pub deployment: String,
}

impl LockInfo {
    /// Create lock info for the current process.
    pub fn new(service: &ServiceName, deployment: &DeploymentId) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            service: service.to_string(),
            deployment: deployment.to_string(),
        }
    }

    /// Check if this lock is stale (older than 1 hour). A crashed
    /// orchestrator never releases; staleness is the recovery path.
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.started_at;
        age.num_hours() >= 1
    }
}

fn lock_path(locks_dir: &Path, service: &ServiceName) -> PathBuf {
    locks_dir.join(format!("{}.lock", service))
}

/// A held active-deployment lock. Released explicitly at terminal state;
/// a crash leaves the file for stale-break or `--force`.
#[derive(Debug)]
pub struct ActiveLock {
    path: PathBuf,
}

impl ActiveLock {
    /// Acquire the lock for a service.
    ///
    /// Uses `create_new` for atomic acquisition (no TOCTOU race).
    /// Fails with `Conflict` if another deployment holds a fresh lock.
    /// Auto-breaks stale locks (>1 hour) with a warning.
    pub fn acquire(
        locks_dir: &Path,
        service: &ServiceName,
        deployment: &DeploymentId,
        force: bool,
    ) -> Result<Self, DeployError> {
        std::fs::create_dir_all(locks_dir)
            .map_err(|e| DeployError::Lock(format!("failed to create locks directory: {}", e)))?;

        let path = lock_path(locks_dir, service);
        let info = LockInfo::new(service, deployment);

        match Self::try_create(&path, &info) {
            Ok(()) => return Ok(Self { path }),
            Err(e) if e.kind() != std::io::ErrorKind::AlreadyExists => {
                return Err(DeployError::Lock(format!("failed to acquire lock: {}", e)));
            }
            Err(_already_exists) => {}
        }

        if !Self::should_break(&path, force)? {
            // Valid lock held by another deployment.
            let existing = Self::read_info(&path);
            return match existing {
                Some(existing) => Err(DeployError::Conflict {
                    deployment: existing.deployment,
                    holder: existing.holder,
                    pid: existing.pid,
                    since: existing.started_at,
                }),
                None => Err(DeployError::Lock("lock held by another process".to_string())),
            };
        }

        tracing::debug!("removing stale/forced lock at {}", path.display());
        let _ = std::fs::remove_file(&path);

        match Self::try_create(&path, &info) {
            Ok(()) => Ok(Self { path }),
            Err(_) => Err(DeployError::Lock(
                "lock acquired by another process during break".to_string(),
            )),
        }
    }

    fn try_create(path: &Path, info: &LockInfo) -> std::io::Result<()> {
        use std::io::Write;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        let json = serde_json::to_string(info)
            .map_err(|e| std::io::Error::other(format!("failed to serialize lock: {}", e)))?;
        file.write_all(json.as_bytes())
    }

    fn read_info(path: &Path) -> Option<LockInfo> {
        let contents = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&contents).ok()
    }

    /// Check if an existing lock should be broken (stale, forced, or
    /// corrupted).
    fn should_break(path: &Path, force: bool) -> Result<bool, DeployError> {
        match Self::read_info(path) {
            Some(existing) => {
                if force {
                    tracing::warn!(
                        "breaking lock held by {} (pid {}) since {}",
                        existing.holder,
                        existing.pid,
                        existing.started_at
                    );
                    Ok(true)
                } else if existing.is_stale() {
                    tracing::warn!(
                        "auto-breaking stale lock held by {} (pid {}) since {}",
                        existing.holder,
                        existing.pid,
                        existing.started_at
                    );
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            None => {
                tracing::warn!("lock info unreadable or corrupted, breaking lock");
                Ok(true)
            }
        }
    }

    /// Release the lock. Called when the deployment reaches a terminal
    /// phase.
    pub fn release(self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ServiceName {
        ServiceName::new("test-service").unwrap()
    }

    #[test]
    fn lock_info_records_current_host_and_pid() {
        let info = LockInfo::new(&service(), &DeploymentId::new("test-service-1"));
        assert_eq!(info.service, "test-service");
        assert_eq!(info.pid, std::process::id());
        assert!(!info.holder.is_empty());
    }

    #[test]
    fn fresh_lock_is_not_stale() {
        let info = LockInfo::new(&service(), &DeploymentId::new("d1"));
        assert!(!info.is_stale());
    }

    #[test]
    fn old_lock_is_stale() {
        let mut info = LockInfo::new(&service(), &DeploymentId::new("d1"));
        info.started_at = Utc::now() - chrono::Duration::hours(2);
        assert!(info.is_stale());
    }
}
