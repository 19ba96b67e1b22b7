// ABOUTME: The list command: recorded deployments for audit.
// ABOUTME: Oldest first, matching the store order.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::DeploymentStore;

pub fn list(config: Config, json: bool) -> Result<i32> {
    let state_dir = config
        .state_dir
        .clone()
        .unwrap_or_else(DeploymentStore::default_dir);
    let store = DeploymentStore::open(state_dir).map_err(|e| Error::Deploy(e.to_string()))?;

    let deployments = store.list().map_err(|e| Error::Deploy(e.to_string()))?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&deployments).map_err(|e| Error::Deploy(e.to_string()))?
        );
        return Ok(0);
    }

    if deployments.is_empty() {
        println!("no deployments recorded");
        return Ok(0);
    }

    for d in deployments {
        println!(
            "{}  {}  {}  {}  {}",
            d.id,
            d.service,
            d.image,
            d.phase,
            d.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(0)
}
