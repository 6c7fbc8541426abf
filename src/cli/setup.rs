use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::output;

pub const LOCAL_LOGS_DIR: &str = "logs";
pub const LOCAL_STATE_DIR: &str = ".hmsg";

/// Create the local working directories. Re-running is harmless.
pub fn run(project_root: &Path) -> Result<()> {
    output::header("Setting up local workspace");

    let logs = project_root.join(LOCAL_LOGS_DIR);
    fs::create_dir_all(&logs).with_context(|| format!("Failed to create {}", logs.display()))?;
    output::success(&format!("{}/", LOCAL_LOGS_DIR));

    let state = project_root.join(LOCAL_STATE_DIR);
    fs::create_dir_all(&state).with_context(|| format!("Failed to create {}", state.display()))?;
    restrict(&state)?;
    output::success(&format!("{}/ (mode 700)", LOCAL_STATE_DIR));

    println!();
    output::info("Next: export DOCKER_REGISTRY, EC2_HOST, PEM_KEY_PATH and DATABASE_URL");
    Ok(())
}

#[cfg(unix)]
fn restrict(dir: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
        .with_context(|| format!("Failed to restrict {}", dir.display()))
}

#[cfg(not(unix))]
fn restrict(_dir: &Path) -> Result<()> {
    Ok(())
}
