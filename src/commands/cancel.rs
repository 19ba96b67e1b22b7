// ABOUTME: The cancel command: request rollback of a running deployment.
// ABOUTME: Exit 0 once the request is accepted, not once rollback finishes.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::{DeploymentStore, StoreError};
use crate::types::DeploymentId;

pub fn cancel(config: Config, deployment_id: &str) -> Result<i32> {
    let state_dir = config
        .state_dir
        .clone()
        .unwrap_or_else(DeploymentStore::default_dir);
    let store = DeploymentStore::open(state_dir).map_err(|e| Error::Deploy(e.to_string()))?;

    let id = DeploymentId::new(deployment_id);
    let deployment = match store.load(&id) {
        Ok(d) => d,
        Err(StoreError::UnknownDeployment(id)) => return Err(Error::UnknownDeployment(id)),
        Err(e) => return Err(Error::Deploy(e.to_string())),
    };

    if deployment.phase.is_terminal() {
        eprintln!(
            "deployment {} already reached {}; nothing to cancel",
            deployment.id, deployment.phase
        );
        return Ok(1);
    }

    store
        .request_cancel(&id)
        .map_err(|e| Error::Deploy(e.to_string()))?;
    println!("cancellation requested for deployment {}", id);
    Ok(0)
}
