// ABOUTME: Durable storage of deployment records and cancel markers.
// ABOUTME: One JSON file per deployment under the XDG state directory.

use std::path::{Path, PathBuf};

use crate::deploy::Deployment;
use crate::types::DeploymentId;

/// Relative state directory under $HOME (XDG Base Directory compliant).
const STATE_DIR: &str = ".local/state/relevo";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown deployment: {0}")]
    UnknownDeployment(String),

    #[error("state I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt deployment record: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Persists deployment records so `status` and audit queries work after
/// the orchestrator process recycles. Live task state is never trusted
/// from here; the coordinator reconciles it from the cluster.
#[derive(Debug, Clone)]
pub struct DeploymentStore {
    dir: PathBuf,
}

impl DeploymentStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(dir.join("deployments"))?;
        std::fs::create_dir_all(dir.join("locks"))?;
        Ok(Self { dir })
    }

    /// Default state directory: ~/.local/state/relevo.
    pub fn default_dir() -> PathBuf {
        match std::env::var_os("HOME") {
            Some(home) => Path::new(&home).join(STATE_DIR),
            None => PathBuf::from(STATE_DIR),
        }
    }

    /// Directory holding per-service advisory lock files.
    pub fn locks_dir(&self) -> PathBuf {
        self.dir.join("locks")
    }

    fn record_path(&self, id: &DeploymentId) -> PathBuf {
        self.dir.join("deployments").join(format!("{}.json", id))
    }

    fn cancel_path(&self, id: &DeploymentId) -> PathBuf {
        self.dir.join("deployments").join(format!("{}.cancel", id))
    }

    /// Write a deployment record. The write goes to a temp file first so
    /// a crash mid-write never leaves a truncated record behind.
    pub fn save(&self, deployment: &Deployment) -> Result<(), StoreError> {
        let path = self.record_path(&deployment.id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(deployment)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn load(&self, id: &DeploymentId) -> Result<Deployment, StoreError> {
        let path = self.record_path(id);
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::UnknownDeployment(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&contents)?)
    }

    /// All recorded deployments, oldest first.
    pub fn list(&self) -> Result<Vec<Deployment>, StoreError> {
        let mut deployments = Vec::new();
        for entry in std::fs::read_dir(self.dir.join("deployments"))? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "json") {
                let contents = std::fs::read_to_string(&path)?;
                deployments.push(serde_json::from_str(&contents)?);
            }
        }
        deployments.sort_by_key(|d: &Deployment| d.created_at);
        Ok(deployments)
    }

    /// Leave a cancel marker for a running deployment. The coordinator
    /// observes it at the next loop iteration boundary.
    pub fn request_cancel(&self, id: &DeploymentId) -> Result<(), StoreError> {
        // Marker only makes sense for a deployment we know about.
        let _ = self.load(id)?;
        std::fs::write(self.cancel_path(id), b"")?;
        Ok(())
    }

    pub fn cancel_requested(&self, id: &DeploymentId) -> bool {
        self.cancel_path(id).exists()
    }

    /// Remove the cancel marker once the deployment reaches a terminal
    /// phase; markers must not leak into unrelated future runs.
    pub fn clear_cancel(&self, id: &DeploymentId) {
        let _ = std::fs::remove_file(self.cancel_path(id));
    }
}
