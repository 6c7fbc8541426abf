pub mod context;
pub mod instance;
pub mod progress;
pub mod steps;

use tracing::{debug, info, warn};

use crate::error::DeployResult;
use crate::output;
use crate::ssh::Remote;

use context::DeployContext;
use instance::ContainerInstance;
use progress::{DeployPhase, DeployProgress};

/// Outcome of a successful deploy.
#[derive(Debug)]
pub struct DeployReport {
    pub instance: ContainerInstance,
    pub port_bindings: String,
    pub frontend_url: String,
    pub backend_url: String,
    pub phases: Vec<DeployPhase>,
}

/// Replace the environment's container with a fresh one from `ctx.image_reference`.
/// The old instance is removed before the new one starts; a failure after that
/// leaves no instance running.
pub async fn run<R: Remote + ?Sized>(remote: &R, ctx: &DeployContext) -> DeployResult<DeployReport> {
    output::header(&format!(
        "Deploying {} to {} ({})",
        ctx.image_reference,
        ctx.environment.name,
        remote.host()
    ));

    let mut progress = DeployProgress::new();
    match replace(remote, ctx, &mut progress).await {
        Ok(report) => {
            println!();
            output::success(&format!("{} is live", ctx.container_name()));
            output::field("Image", &report.instance.image_reference);
            output::field("Frontend", &report.frontend_url);
            output::field("Backend", &report.backend_url);
            if !report.port_bindings.trim().is_empty() {
                output::field("Ports", "");
                output::block(&report.port_bindings);
            }
            debug!("phases {:?}", report.phases);
            Ok(report)
        }
        Err(e) => {
            let phase = progress.phase();
            if !phase.is_terminal() {
                let _ = progress.fail();
            }
            warn!("deploy failed during {:?}", phase);
            if phase.old_instance_removed() {
                output::warning(&format!(
                    "The previous {} was already removed; re-run deploy once fixed",
                    ctx.container_name()
                ));
            }
            Err(e)
        }
    }
}

async fn replace<R: Remote + ?Sized>(
    remote: &R,
    ctx: &DeployContext,
    progress: &mut DeployProgress,
) -> DeployResult<DeployReport> {
    let docker = steps::resolve_runtime(remote).await?;
    let config_file = steps::check_database_config(remote, ctx).await?;

    progress.advance(DeployPhase::StoppingOld)?;
    steps::stop_previous(remote, &docker, ctx).await?;

    progress.advance(DeployPhase::Pulling)?;
    steps::pull_image(remote, &docker, ctx).await?;
    steps::prepare_logs_dir(remote, ctx).await?;

    progress.advance(DeployPhase::Starting)?;
    let instance = steps::start_new(remote, &docker, ctx, config_file.as_deref()).await?;

    progress.advance(DeployPhase::Verifying)?;
    let port_bindings = steps::verify(remote, &docker, ctx).await?;
    progress.advance(DeployPhase::Running)?;
    info!("{} running from {}", instance.name, instance.image_reference);

    steps::prune_images(remote, &docker).await?;

    Ok(DeployReport {
        instance,
        port_bindings,
        frontend_url: ctx.environment.frontend_url(&ctx.host),
        backend_url: ctx.environment.backend_url(&ctx.host),
        phases: progress.history().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Environment, HmsgConfig};
    use crate::error::DeployError;
    use crate::ssh::fake::FakeRemote;
    use crate::ssh::CommandOutput;
    use DeployPhase::*;

    const DB_URL: &str = "postgresql://hmsg_user:pw@172.17.0.1:5432/health_message_db";

    fn staging_ctx() -> DeployContext {
        let mut config = HmsgConfig::default();
        config.verify.container_settle_secs = 0;
        DeployContext::new(
            config,
            Environment::new("staging").unwrap(),
            "acme/health-message-app:v3".to_string(),
            DB_URL.to_string(),
            "203.0.113.10".to_string(),
        )
    }

    fn provisioned() -> CommandOutput {
        CommandOutput::ok(&format!(
            "DB_NAME=health_message_db\nDB_USER=hmsg_user\nDB_PASSWORD=pw\nDATABASE_URL={}\n",
            DB_URL
        ))
    }

    #[tokio::test]
    async fn staging_end_to_end_without_prior_instance() {
        let remote = FakeRemote::new()
            .on("cat \"$HOME/.hmsg/database.env\"", provisioned())
            .on("inspect", CommandOutput::failed(1, "No such object: hmsg-staging"))
            .on("inspect", CommandOutput::ok("true\n"))
            .on("port hmsg-staging", CommandOutput::ok("3000/tcp -> 0.0.0.0:3000\n8000/tcp -> 0.0.0.0:8000\n"));

        let report = run(&remote, &staging_ctx()).await.unwrap();

        assert_eq!(report.instance.name, "hmsg-staging");
        assert_eq!(report.frontend_url, "http://203.0.113.10:3000");
        assert_eq!(report.backend_url, "http://203.0.113.10:8000");
        assert!(report.port_bindings.contains("0.0.0.0:3000"));
        assert_eq!(
            report.phases,
            vec![Idle, StoppingOld, Pulling, Starting, Verifying, Running]
        );

        let run_cmd = remote
            .commands()
            .into_iter()
            .find(|c| c.starts_with("docker run"))
            .unwrap();
        assert!(run_cmd.contains("--name hmsg-staging"));
        assert!(run_cmd.contains("-p 3000:3000 -p 8000:8000"));
        assert!(run_cmd.contains(&format!("-e DATABASE_URL={}", DB_URL)));
        assert!(run_cmd.contains("-e ENVIRONMENT=staging"));
        assert!(run_cmd.contains("--restart always"));
        assert!(run_cmd.contains("/app/config/database.env:ro"));

        assert_eq!(remote.count("docker stop"), 0);
        assert_eq!(remote.count("docker rm"), 0);
        assert_eq!(remote.count("docker pull acme/health-message-app:v3"), 1);
    }

    #[tokio::test]
    async fn previous_instance_is_stopped_and_removed_before_start() {
        let remote = FakeRemote::new()
            .on("cat \"$HOME/.hmsg/database.env\"", provisioned())
            .on("inspect", CommandOutput::ok("true\n"));

        run(&remote, &staging_ctx()).await.unwrap();

        let stop = remote.position("docker stop hmsg-staging").unwrap();
        let rm = remote.position("docker rm hmsg-staging").unwrap();
        let pull = remote.position("docker pull").unwrap();
        let start = remote.position("docker run").unwrap();
        assert!(stop < rm && rm < pull && pull < start);
    }

    #[tokio::test]
    async fn exited_instance_is_removed_without_stop() {
        let remote = FakeRemote::new()
            .on("cat \"$HOME/.hmsg/database.env\"", provisioned())
            .on("inspect", CommandOutput::ok("false\n"))
            .on("inspect", CommandOutput::ok("true\n"));

        run(&remote, &staging_ctx()).await.unwrap();
        assert_eq!(remote.count("docker stop"), 0);
        assert_eq!(remote.count("docker rm hmsg-staging"), 1);
    }

    #[tokio::test]
    async fn crashed_instance_fails_with_logs() {
        let remote = FakeRemote::new()
            .on("cat \"$HOME/.hmsg/database.env\"", provisioned())
            .on("inspect", CommandOutput::failed(1, "No such object"))
            .on("logs --tail", CommandOutput::ok("sqlalchemy.exc.OperationalError: could not connect"));

        let err = run(&remote, &staging_ctx()).await.unwrap_err();
        match err {
            DeployError::VerificationTimeout { what, diagnostics, .. } => {
                assert_eq!(what, "container hmsg-staging");
                assert!(diagnostics.contains("OperationalError"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(remote.count("image prune"), 0);
    }

    #[tokio::test]
    async fn missing_database_config_is_fatal_before_teardown() {
        let remote = FakeRemote::new().on("test -f", CommandOutput::failed(1, ""));

        let err = run(&remote, &staging_ctx()).await.unwrap_err();
        assert!(matches!(err, DeployError::FileNotFound(_)));
        assert!(err.to_string().contains("database local"));
        assert_eq!(remote.count("docker stop"), 0);
        assert_eq!(remote.count("docker pull"), 0);
    }

    #[tokio::test]
    async fn external_database_skips_config_mount() {
        let remote = FakeRemote::new()
            .on("test -f", CommandOutput::failed(1, ""))
            .on("inspect", CommandOutput::failed(1, "No such object"))
            .on("inspect", CommandOutput::ok("true\n"));

        let ctx = staging_ctx().with_external_db(true);
        let report = run(&remote, &ctx).await.unwrap();
        assert_eq!(report.instance.volume_mounts.len(), 1);
    }

    #[tokio::test]
    async fn prune_failure_does_not_fail_deploy() {
        let remote = FakeRemote::new()
            .on("cat \"$HOME/.hmsg/database.env\"", provisioned())
            .on("inspect", CommandOutput::failed(1, "No such object"))
            .on("inspect", CommandOutput::ok("true\n"))
            .on("image prune", CommandOutput::failed(1, "prune already running"));

        assert!(run(&remote, &staging_ctx()).await.is_ok());
        assert_eq!(remote.count("image prune"), 1);
    }

    #[tokio::test]
    async fn sudo_is_decided_once_and_used_throughout() {
        let remote = FakeRemote::new()
            .on("sudo -n docker info", CommandOutput::ok(""))
            .on("docker info", CommandOutput::failed(1, "permission denied"))
            .on("cat \"$HOME/.hmsg/database.env\"", provisioned())
            .on("inspect", CommandOutput::failed(1, "No such object"))
            .on("inspect", CommandOutput::ok("true\n"));

        run(&remote, &staging_ctx()).await.unwrap();

        assert_eq!(remote.count("docker info"), 2);
        for cmd in remote.commands().iter().filter(|c| c.contains("docker run") || c.contains("docker pull")) {
            assert!(cmd.starts_with("sudo docker"), "{cmd}");
        }
    }

    #[tokio::test]
    async fn failed_start_does_not_leak_database_url() {
        let remote = FakeRemote::new()
            .on("cat \"$HOME/.hmsg/database.env\"", provisioned())
            .on("inspect", CommandOutput::failed(1, "No such object"))
            .on("docker run", CommandOutput::failed(125, "port is already allocated"));

        let err = run(&remote, &staging_ctx()).await.unwrap_err();
        let rendered = format!("{} {:?}", err, err);
        assert!(!rendered.contains("hmsg_user:pw@"), "{rendered}");
        assert!(err.to_string().contains("start hmsg-staging"));
        assert!(rendered.contains("port is already allocated"));
    }
}
