use anyhow::Result;

use crate::config::{CommandKind, Environment, Settings};
use crate::deploy::instance::DockerCli;
use crate::error::{DeployError, DeployResult};
use crate::ssh::{Remote, SshSession};

pub async fn run(settings: &Settings, environment: Option<&str>, lines: usize) -> Result<()> {
    settings.require(CommandKind::Logs)?;
    let environment = Environment::new(settings.environment_name(environment))?;
    let target = settings.target()?;

    let session = SshSession::open(&target).await?;
    let result = tail(&session, &environment.container_name, lines).await;
    let closed = session.close().await;

    println!("{}", result?);
    closed?;
    Ok(())
}

pub async fn tail<R: Remote + ?Sized>(remote: &R, container: &str, lines: usize) -> DeployResult<String> {
    let docker = DockerCli::resolve_lenient(remote).await?;

    if !remote.exec_ok(&docker.inspect_running(container)).await? {
        return Err(DeployError::Invalid(format!(
            "no container named {} on {}; deploy it first",
            container,
            remote.host()
        )));
    }

    let cmd = docker.cmd(&format!("logs --tail {} {} 2>&1", lines, container));
    let out = remote.run(&cmd).await?;
    if !out.success() {
        return Err(DeployError::RemoteCommand {
            host: remote.host().to_string(),
            command: cmd,
            exit_code: out.exit_code,
            output: remote.redact(&out.combined()),
        });
    }
    Ok(out.combined())
}
