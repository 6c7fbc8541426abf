pub mod exec;
#[cfg(test)]
pub mod fake;
pub mod steps;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use openssh::{KnownHosts, Session, SessionBuilder};
use tracing::debug;

use crate::config::DeploymentTarget;
use crate::error::{DeployError, DeployResult};
use crate::shell;

pub use exec::{CommandOutput, Remote};
pub use steps::{RemoteStep, StepResult};

pub struct SshSession {
    session: Session,
    host: String,
    secrets: Vec<String>,
}

impl SshSession {
    pub async fn connect(user: &str, host: &str, identity: &Path) -> DeployResult<Self> {
        debug!("Connecting to {}@{} with {}", user, host, identity.display());

        let mut builder = SessionBuilder::default();
        builder.known_hosts_check(KnownHosts::Accept);
        builder.user(user.to_string());
        builder.keyfile(identity);
        builder.connect_timeout(Duration::from_secs(10));

        let session = builder
            .connect(host)
            .await
            .map_err(|e| DeployError::transport(host, e))?;

        Ok(Self {
            session,
            host: host.to_string(),
            secrets: Vec::new(),
        })
    }

    pub async fn open(target: &DeploymentTarget) -> DeployResult<Self> {
        Self::connect(
            &target.ssh_user,
            &target.host_address,
            &target.identity_file_path,
        )
        .await
    }

    /// Keep `secret` out of debug logs for this session.
    pub fn mask(&mut self, secret: &str) {
        self.secrets.push(secret.to_string());
    }

    pub async fn close(self) -> DeployResult<()> {
        let host = self.host;
        self.session
            .close()
            .await
            .map_err(|e| DeployError::transport(&host, e))
    }
}

#[async_trait]
impl Remote for SshSession {
    fn host(&self) -> &str {
        &self.host
    }

    fn redact(&self, text: &str) -> String {
        shell::redact(text, &self.secrets)
    }

    async fn run(&self, cmd: &str) -> DeployResult<CommandOutput> {
        debug!("[{}] run: {}", self.host, self.redact(cmd));

        let output = self
            .session
            .command("bash")
            .arg("-c")
            .arg(cmd)
            .output()
            .await
            .map_err(|e| DeployError::transport(&self.host, e))?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
