use anyhow::{Context, Result};

use crate::config::{CommandKind, DeploymentTarget, Environment, Settings};
use crate::deploy;
use crate::deploy::context::DeployContext;
use crate::image::RegistryImage;
use crate::release::Release;
use crate::ssh::SshSession;

pub struct DeployArgs<'a> {
    pub environment: Option<&'a str>,
    pub frontend_port: Option<u16>,
    pub backend_port: Option<u16>,
    pub external_db: bool,
    pub tag: &'a str,
}

pub async fn run(settings: &Settings, args: DeployArgs<'_>) -> Result<()> {
    settings.require(CommandKind::Deploy)?;

    let environment = Environment::with_ports(
        settings.environment_name(args.environment),
        args.frontend_port,
        args.backend_port,
    )?;
    let release = Release::named(args.tag)?;
    let image = RegistryImage::new(settings.registry()?, &settings.config.app.name, &release);
    let target = settings.target()?;
    let database_url = settings.database_url()?;

    deploy_image(settings, &target, database_url, environment, &image, args.external_db).await
}

/// Open one session to the target and replace the environment's container.
pub async fn deploy_image(
    settings: &Settings,
    target: &DeploymentTarget,
    database_url: &str,
    environment: Environment,
    image: &RegistryImage,
    external_db: bool,
) -> Result<()> {
    let mut session = SshSession::open(target).await?;
    session.mask(database_url);
    if let Some(password) = settings.db_password.as_deref() {
        session.mask(password);
    }

    let ctx = DeployContext::new(
        settings.config.clone(),
        environment,
        image.reference(),
        database_url.to_string(),
        target.host_address.clone(),
    )
    .with_external_db(external_db);

    let result = deploy::run(&session, &ctx).await;
    let closed = session.close().await;

    result.with_context(|| format!("Deploy of {} failed", ctx.container_name()))?;
    closed?;
    Ok(())
}
