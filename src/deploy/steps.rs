use tracing::{debug, warn};

use crate::database::DatabaseConfig;
use crate::error::{DeployError, DeployResult};
use crate::output;
use crate::shell;
use crate::ssh::steps::run_steps;
use crate::ssh::{Remote, RemoteStep};

use super::context::DeployContext;
use super::instance::{self, ContainerInstance, DockerCli};

pub const TOTAL_STEPS: usize = 8;

const TROUBLESHOOTING: &[&str] = &[
    "DATABASE_URL is correct and the database accepts connections from the Docker network",
    "Host ports are free (`sudo ss -ltnp`)",
    "The security group / firewall allows the frontend and backend ports",
    "The image runs on this host's architecture",
];

pub async fn resolve_runtime<R: Remote + ?Sized>(remote: &R) -> DeployResult<DockerCli> {
    output::step(1, TOTAL_STEPS, "Checking container runtime");

    instance::ensure_docker(remote).await?;
    let docker = DockerCli::resolve(remote).await?;

    if docker.is_elevated() {
        output::info("Using sudo for docker commands this session");
    }
    output::success("Docker is available");
    Ok(docker)
}

/// The persisted config is mounted when present. Without it the database has
/// not been provisioned, which is fatal unless it lives elsewhere.
pub async fn check_database_config<R: Remote + ?Sized>(
    remote: &R,
    ctx: &DeployContext,
) -> DeployResult<Option<String>> {
    output::step(2, TOTAL_STEPS, "Checking database configuration");

    let path = ctx.remote_config_file();
    match DatabaseConfig::read(remote, &path).await? {
        Some(db) => {
            if db.connection_string != ctx.database_url {
                output::warning(&format!(
                    "DATABASE_URL differs from {} ({}); using DATABASE_URL",
                    path,
                    shell::mask_url(&db.connection_string)
                ));
            }
            output::success(&format!("Found {}", path));
            Ok(Some(path))
        }
        None if ctx.external_db => {
            output::info("External database, no local config to mount");
            Ok(None)
        }
        None => Err(DeployError::FileNotFound(format!(
            "{} on {}. Run `hmsg-deploy database local` first, or pass --external-db",
            path,
            remote.host()
        ))),
    }
}

pub async fn stop_previous<R: Remote + ?Sized>(
    remote: &R,
    docker: &DockerCli,
    ctx: &DeployContext,
) -> DeployResult<()> {
    output::step(3, TOTAL_STEPS, "Stopping previous instance");

    let name = ctx.container_name();
    let state = remote.run(&docker.inspect_running(name)).await?;

    if !state.success() {
        output::success(&format!("No previous {} instance", name));
        return Ok(());
    }

    if state.stdout.trim() == "true" {
        remote.exec(&docker.cmd(&format!("stop {}", name))).await?;
        debug!("stopped {}", name);
    }
    remote.exec(&docker.cmd(&format!("rm {}", name))).await?;

    output::success(&format!("Removed previous {}", name));
    Ok(())
}

pub async fn pull_image<R: Remote + ?Sized>(
    remote: &R,
    docker: &DockerCli,
    ctx: &DeployContext,
) -> DeployResult<()> {
    output::step(4, TOTAL_STEPS, "Pulling image");

    let spinner = output::create_spinner(&format!("Pulling {}...", ctx.image_reference));
    let result = remote
        .exec(&docker.cmd(&format!("pull {}", shell::quote(&ctx.image_reference))))
        .await;
    spinner.finish_and_clear();
    result?;

    output::success(&format!("Pulled {}", ctx.image_reference));
    Ok(())
}

pub async fn prepare_logs_dir<R: Remote + ?Sized>(remote: &R, ctx: &DeployContext) -> DeployResult<()> {
    output::step(5, TOTAL_STEPS, "Preparing log directory");

    remote
        .exec(&format!("mkdir -p {}", shell::quote_path(&ctx.remote_logs_dir())))
        .await?;

    output::success(&ctx.remote_logs_dir());
    Ok(())
}

pub async fn start_new<R: Remote + ?Sized>(
    remote: &R,
    docker: &DockerCli,
    ctx: &DeployContext,
    config_file: Option<&str>,
) -> DeployResult<ContainerInstance> {
    output::step(6, TOTAL_STEPS, "Starting new instance");

    let instance = ContainerInstance::new(
        &ctx.environment,
        &ctx.image_reference,
        &ctx.database_url,
        &ctx.remote_logs_dir(),
        config_file,
    );

    // The run line carries DATABASE_URL; errors name the step instead.
    let id = remote
        .exec_secret(&format!("start {}", instance.name), &docker.cmd(&instance.run_args()))
        .await?;
    debug!("started {} ({})", instance.name, id.trim());

    output::success(&format!("Started {}", instance.name));
    Ok(instance)
}

/// Wait for the settle period, then confirm the instance is running. On
/// failure the crash logs are printed and carried in the error.
pub async fn verify<R: Remote + ?Sized>(
    remote: &R,
    docker: &DockerCli,
    ctx: &DeployContext,
) -> DeployResult<String> {
    output::step(7, TOTAL_STEPS, "Verifying instance");

    let name = ctx.container_name();
    let policy = ctx.verify_policy();
    let inspect = docker.inspect_running(name);
    let check = inspect.as_str();

    let spinner = output::create_spinner(&format!(
        "Waiting {}s for {} to settle...",
        policy.initial_delay.as_secs(),
        name
    ));
    let result = policy
        .run("container liveness", move |_| async move {
            let out = remote.run(check).await.map_err(|e| e.to_string())?;
            match out.stdout.trim() {
                "true" if out.success() => Ok(()),
                _ if out.success() => Err("container is not running".to_string()),
                _ => Err("container does not exist".to_string()),
            }
        })
        .await;
    spinner.finish_and_clear();

    if result.succeeded {
        let ports = remote
            .exec(&docker.cmd(&format!("port {}", name)))
            .await
            .unwrap_or_default();
        output::success(&format!("{} is running", name));
        return Ok(ports);
    }

    let logs = remote
        .run(&docker.cmd(&format!("logs --tail 50 {} 2>&1", name)))
        .await
        .map(|o| o.combined())
        .unwrap_or_else(|e| e.to_string());

    output::error(&format!("{} is not running", name));
    if !logs.trim().is_empty() {
        output::info("Container logs:");
        output::block(&logs);
    }
    output::checklist("Check that:", TROUBLESHOOTING);

    Err(DeployError::VerificationTimeout {
        what: format!("container {}", name),
        attempts: result.attempt_count,
        diagnostics: format!(
            "{}\n\nContainer logs:\n{}",
            result.last_error.unwrap_or_default(),
            logs.trim()
        ),
    })
}

/// Housekeeping; failure is only a warning.
pub async fn prune_images<R: Remote + ?Sized>(remote: &R, docker: &DockerCli) -> DeployResult<()> {
    output::step(8, TOTAL_STEPS, "Pruning dangling images");

    let results = run_steps(
        remote,
        &[RemoteStep::best_effort(
            "prune dangling images",
            docker.cmd("image prune -f"),
        )],
    )
    .await;

    match results {
        Ok(results) if results.iter().all(|r| r.ok()) => output::success("Images pruned"),
        Ok(_) => output::warning("Image prune failed (ignored)"),
        Err(e) => {
            warn!("image prune skipped: {}", e);
            output::warning("Image prune skipped (ignored)");
        }
    }
    Ok(())
}
