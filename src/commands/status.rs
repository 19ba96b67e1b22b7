// ABOUTME: The status command: phase and per-task summary of a deployment.
// ABOUTME: Exit code mirrors terminal state: 0 completed, 1 failed, 2 in progress.

use crate::config::Config;
use crate::deploy::Phase;
use crate::error::{Error, Result};
use crate::store::{DeploymentStore, StoreError};
use crate::types::DeploymentId;

pub fn status(config: Config, deployment_id: &str, json: bool) -> Result<i32> {
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

    if json {
        let rendered = serde_json::to_string_pretty(&deployment)
            .map_err(|e| Error::Deploy(e.to_string()))?;
        println!("{}", rendered);
    } else {
        println!("deployment: {}", deployment.id);
        println!("service:    {}", deployment.service);
        println!("image:      {}", deployment.image);
        println!("phase:      {}", deployment.phase);
        if let Some(failure) = &deployment.failure {
            println!("cause:      {}", failure.cause);
            if failure.manual_intervention_required {
                println!("            MANUAL INTERVENTION REQUIRED");
            }
        }

        if !deployment.candidate_tasks.is_empty() {
            println!("candidate tasks:");
            for task in &deployment.candidate_tasks {
                println!(
                    "  {}  {:?}  registered={}",
                    task.id, task.status, task.registered
                );
            }
        }
        if !deployment.stable_tasks.is_empty() {
            println!("stable tasks:");
            for task in &deployment.stable_tasks {
                println!(
                    "  {}  {:?}  registered={}",
                    task.id, task.status, task.registered
                );
            }
        }
    }

    Ok(match deployment.phase {
        Phase::Completed => 0,
        Phase::Failed => 1,
        _ => 2,
    })
}
