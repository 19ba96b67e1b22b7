// ABOUTME: The deploy command: accept a request and run the control loop.
// ABOUTME: Prints the deployment id on acceptance, then drives to a terminal phase.

use std::sync::Arc;

use crate::cluster::{HttpBalancer, HttpScheduler};
use crate::config::Config;
use crate::deploy::{Coordinator, DeployError, Phase};
use crate::error::{Error, Result};
use crate::health::HttpProbe;
use crate::store::DeploymentStore;
use crate::types::{ImageRef, ServiceName};

pub async fn deploy(
    config: Config,
    service: &str,
    image: &str,
    count: u32,
    force: bool,
) -> Result<i32> {
    let service = ServiceName::new(service).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    let image = ImageRef::parse(image).map_err(|e| Error::InvalidConfig(e.to_string()))?;

    let state_dir = config
        .state_dir
        .clone()
        .unwrap_or_else(DeploymentStore::default_dir);
    let store =
        DeploymentStore::open(state_dir).map_err(|e| Error::Deploy(e.to_string()))?;

    let scheduler = Arc::new(HttpScheduler::new(config.scheduler_addr.as_str()));
    let balancer = Arc::new(HttpBalancer::new(config.balancer_addr.as_str()));
    let probe = Arc::new(HttpProbe::new(
        config.healthcheck.path.as_str(),
        config.healthcheck.timeout,
    ));

    let coordinator = Coordinator::new(scheduler, balancer, probe, config, store);

    let (deployment, lock) = match coordinator.start(service, count, image, force) {
        Ok(accepted) => accepted,
        Err(e @ DeployError::Conflict { .. }) => {
            eprintln!("Error: {e}");
            return Ok(1);
        }
        Err(e) => return Err(Error::Deploy(e.to_string())),
    };

    println!("deployment {} accepted", deployment.id);

    let finished = coordinator
        .run(deployment, lock)
        .await
        .map_err(|e| Error::Deploy(e.to_string()))?;

    match finished.phase {
        Phase::Completed => {
            println!("deployment {} completed", finished.id);
            Ok(0)
        }
        _ => {
            if let Some(failure) = &finished.failure {
                eprintln!("deployment {} failed: {}", finished.id, failure.cause);
                if failure.manual_intervention_required {
                    eprintln!("MANUAL INTERVENTION REQUIRED: rollback did not complete");
                }
            }
            for event in &finished.events {
                eprintln!(
                    "  [{}] {} {}",
                    event.at.format("%H:%M:%S"),
                    event.phase,
                    event.message
                );
            }
            Ok(1)
        }
    }
}
