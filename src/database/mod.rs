pub mod config;
pub mod sql;

use tracing::{info, warn};

use crate::config::HmsgConfig;
use crate::error::{DeployError, DeployResult};
use crate::os::HostOs;
use crate::output;
use crate::ssh::steps::run_steps;
use crate::ssh::{Remote, RemoteStep};

pub use config::DatabaseConfig;

const TOTAL_STEPS: usize = 9;

/// Whether an idempotent ensure-step created the object or found it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ensured {
    Created,
    Existing,
}

/// Bring PostgreSQL, the app database and its role to a ready state.
/// Safe to re-run: existing objects are kept, the config file and role
/// password take the latest values.
pub async fn provision<R: Remote + ?Sized>(
    remote: &R,
    config: &HmsgConfig,
    password: &str,
) -> DeployResult<DatabaseConfig> {
    let db = &config.database;
    let db_config = DatabaseConfig::new(db, password)?;

    output::step(1, TOTAL_STEPS, "Preparing config directory");
    DatabaseConfig::prepare_dir(remote, &config.remote.config_dir).await?;
    output::success(&format!("{} (mode 700)", config.remote.config_dir));

    output::step(2, TOTAL_STEPS, "Writing database config");
    db_config.write(remote, &config.config_file()).await?;
    output::success(&format!("{} (mode 600)", config.config_file()));

    output::step(3, TOTAL_STEPS, "Checking PostgreSQL");
    install_postgres(remote).await?;

    output::step(4, TOTAL_STEPS, "Starting PostgreSQL");
    remote
        .exec("sudo systemctl enable --now postgresql")
        .await?;
    output::success("PostgreSQL enabled and running");

    output::step(5, TOTAL_STEPS, "Ensuring role and database");
    match ensure_role(remote, &db.user, password).await? {
        Ensured::Created => output::success(&format!("Role {} created", db.user)),
        Ensured::Existing => output::success(&format!("Role {} exists, password updated", db.user)),
    }
    match ensure_database(remote, &db.name, &db.user).await? {
        Ensured::Created => output::success(&format!("Database {} created", db.name)),
        Ensured::Existing => output::success(&format!("Database {} already exists", db.name)),
    }

    output::step(6, TOTAL_STEPS, "Granting privileges");
    let grants: Vec<RemoteStep> = sql::grants(&db.name, &db.user)
        .into_iter()
        .map(|(desc, cmd)| RemoteStep::required(desc, cmd))
        .collect();
    run_steps(remote, &grants).await?;
    output::success("Privileges granted");

    output::step(7, TOTAL_STEPS, "Configuring network access");
    let script = remote.run_script(&sql::network_script(&db.networks)).await?;
    if script.exit_code != 0 {
        return Err(DeployError::RemoteCommand {
            host: remote.host().to_string(),
            command: "configure listen_addresses and pg_hba.conf".to_string(),
            exit_code: script.exit_code,
            output: script.output,
        });
    }
    output::success("Listening on all interfaces, password auth for private ranges");

    output::step(8, TOTAL_STEPS, "Restarting PostgreSQL");
    remote.exec("sudo systemctl restart postgresql").await?;

    output::step(9, TOTAL_STEPS, "Verifying connectivity");
    verify(remote, config, password).await?;

    Ok(db_config)
}

async fn install_postgres<R: Remote + ?Sized>(remote: &R) -> DeployResult<()> {
    if remote.exec_ok("command -v psql").await? {
        output::success("PostgreSQL already installed");
        return Ok(());
    }

    let host_os = HostOs::detect(remote).await?;
    info!("Installing PostgreSQL on {:?}", host_os);

    let spinner = output::create_spinner("Installing PostgreSQL...");
    let result = remote.exec(host_os.install_postgres_cmd()).await;
    spinner.finish_and_clear();
    result?;

    output::success("PostgreSQL installed");
    Ok(())
}

pub async fn ensure_role<R: Remote + ?Sized>(
    remote: &R,
    user: &str,
    password: &str,
) -> DeployResult<Ensured> {
    let exists = remote.exec(&sql::role_exists(user)).await?.trim() == "1";
    if exists {
        remote
            .exec_secret(&format!("set password of role {}", user), &sql::alter_role_password(user, password))
            .await?;
        Ok(Ensured::Existing)
    } else {
        remote
            .exec_secret(&format!("create role {}", user), &sql::create_role(user, password))
            .await?;
        Ok(Ensured::Created)
    }
}

pub async fn ensure_database<R: Remote + ?Sized>(
    remote: &R,
    db: &str,
    owner: &str,
) -> DeployResult<Ensured> {
    let exists = remote.exec(&sql::database_exists(db)).await?.trim() == "1";
    if exists {
        return Ok(Ensured::Existing);
    }
    remote.exec(&sql::create_database(db, owner)).await?;
    Ok(Ensured::Created)
}

/// Authenticated query with bounded retries; exhaustion is final.
pub async fn verify<R: Remote + ?Sized>(
    remote: &R,
    config: &HmsgConfig,
    password: &str,
) -> DeployResult<()> {
    let db = &config.database;
    let policy = config.db_retry();
    let query = sql::connectivity_check(&db.user, password, &db.name, db.port);
    let check = query.as_str();

    let spinner = output::create_spinner("Waiting for PostgreSQL to accept connections...");
    let result = policy
        .run("database connectivity", move |_| async move {
            let out = remote.run(check).await.map_err(|e| e.to_string())?;
            if out.success() {
                Ok(())
            } else {
                Err(remote.redact(&out.combined()))
            }
        })
        .await;
    spinner.finish_and_clear();

    if result.succeeded {
        output::success(&format!(
            "Connected as {} to {} (attempt {}/{})",
            db.user, db.name, result.attempt_count, policy.max_attempts
        ));
        return Ok(());
    }

    warn!(
        "database connectivity failed after {} attempts: {:?}",
        result.attempt_count, result.last_error
    );

    let status = remote
        .run("sudo systemctl status postgresql --no-pager")
        .await
        .map(|o| o.combined())
        .unwrap_or_else(|e| e.to_string());

    Err(DeployError::VerificationTimeout {
        what: "database connectivity".to_string(),
        attempts: result.attempt_count,
        diagnostics: format!(
            "Last error: {}\n\nService status:\n{}\n\nTry manually on the host:\n  psql -h 127.0.0.1 -p {} -U {} -d {}",
            result.last_error.unwrap_or_default().trim(),
            status.trim(),
            db.port,
            db.user,
            db.name
        ),
    })
}
