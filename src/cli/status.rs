use anyhow::Result;

use crate::config::{CommandKind, HmsgConfig, Settings};
use crate::deploy::instance::DockerCli;
use crate::error::DeployResult;
use crate::output;
use crate::shell;
use crate::ssh::steps::run_steps;
use crate::ssh::{Remote, RemoteStep, SshSession, StepResult};

const CONTAINER_FORMAT: &str = r"'table {{.Names}}\t{{.Status}}\t{{.Ports}}'";

pub async fn run(settings: &Settings) -> Result<()> {
    settings.require(CommandKind::Status)?;
    let target = settings.target()?;

    output::header(&format!("Status of {}", target.host_address));

    let session = SshSession::open(&target).await?;
    let result = query(&session, &settings.config).await;
    let closed = session.close().await;

    for step in result? {
        output::field(&step.description, "");
        output::block(&step.output.combined());
    }
    closed?;
    Ok(())
}

/// Read-only checks. Individual failures are shown as output; only a broken
/// session is an error.
pub async fn query<R: Remote + ?Sized>(remote: &R, config: &HmsgConfig) -> DeployResult<Vec<StepResult>> {
    let docker = DockerCli::resolve_lenient(remote).await?;
    let config_file = shell::quote_path(&config.config_file());

    let steps = [
        RemoteStep::best_effort(
            "Containers",
            docker.cmd(&format!("ps -a --filter name=hmsg- --format {}", CONTAINER_FORMAT)),
        ),
        RemoteStep::best_effort("PostgreSQL", "systemctl is-active postgresql"),
        RemoteStep::best_effort(
            "Database config",
            format!("ls -l {}", config_file),
        ),
        RemoteStep::best_effort("Disk", "df -h /"),
    ];
    run_steps(remote, &steps).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::fake::FakeRemote;
    use crate::ssh::CommandOutput;

    #[tokio::test]
    async fn reports_every_check_even_when_some_fail() {
        let remote = FakeRemote::new()
            .on("systemctl is-active", CommandOutput::failed(3, "inactive"))
            .on("docker ps", CommandOutput::ok("NAMES STATUS PORTS\nhmsg-staging Up 2 hours"));

        let results = query(&remote, &HmsgConfig::default()).await.unwrap();
        let names: Vec<&str> = results.iter().map(|r| r.description.as_str()).collect();
        assert_eq!(names, ["Containers", "PostgreSQL", "Database config", "Disk"]);
        assert!(results[0].output.stdout.contains("hmsg-staging"));
        assert!(!results[1].ok());
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let err = query(&FakeRemote::unreachable(), &HmsgConfig::default())
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().starts_with("cannot reach host"));
    }

    #[tokio::test]
    async fn broken_daemon_still_queries() {
        let remote = FakeRemote::new().on("docker info", CommandOutput::failed(1, "no daemon"));
        let results = query(&remote, &HmsgConfig::default()).await.unwrap();
        assert_eq!(results.len(), 4);
        assert!(remote.commands().iter().any(|c| c.starts_with("docker ps -a")));
    }
}
