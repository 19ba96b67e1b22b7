// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates relevo.yml template files.

use std::path::Path;

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, Config};

pub fn init_config(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let config = Config::template();
    std::fs::write(&config_path, generate_template_yaml(&config))?;

    Ok(())
}

fn generate_template_yaml(config: &Config) -> String {
    format!(
        r#"# Compute cluster scheduler API
scheduler_addr: {}
# Load balancer target pool API
balancer_addr: {}

healthcheck:
  path: /health
  interval: 5s
  timeout: 2s
  healthy_threshold: 3
  failure_threshold: 3
  validation_timeout: 2m

drain:
  timeout: 30s

retry:
  attempts: 3
  backoff: 500ms
"#,
        config.scheduler_addr, config.balancer_addr
    )
}
