use anyhow::{Context, Result};
use std::path::Path;

use crate::config::{CommandKind, Environment, Settings};
use crate::output;

use super::{build, deploy};

/// Build and push a fresh tag, then deploy exactly that tag.
pub async fn run(
    settings: &Settings,
    environment: Option<&str>,
    tag: Option<&str>,
    project_root: &Path,
) -> Result<()> {
    settings.require(CommandKind::Full)?;
    let environment = Environment::new(settings.environment_name(environment))?;
    // Nothing is pushed unless the deploy half can run.
    let target = settings.target()?;
    let database_url = settings.database_url()?;

    let image = build::run(settings, tag, project_root).context("Build failed, nothing was deployed")?;

    output::info(&format!("Deploying freshly built tag {}", image.tag));
    deploy::deploy_image(settings, &target, database_url, environment, &image, false).await
}
