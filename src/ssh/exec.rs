use async_trait::async_trait;
use tracing::debug;

use crate::error::{DeployError, DeployResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[cfg(test)]
    pub fn ok(stdout: &str) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    #[cfg(test)]
    pub fn failed(exit_code: i32, stderr: &str) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn combined(&self) -> String {
        match (self.stdout.trim(), self.stderr.trim()) {
            (out, "") => out.to_string(),
            ("", err) => err.to_string(),
            (out, err) => format!("{}\n{}", out, err),
        }
    }
}

/// Result of a whole fail-fast script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutput {
    pub exit_code: i32,
    pub output: String,
}

/// A command-execution session on the target host.
///
/// `run` only fails when the session itself is broken; a non-zero exit is
/// reported through [`CommandOutput::exit_code`].
#[async_trait]
pub trait Remote: Send + Sync {
    fn host(&self) -> &str;

    async fn run(&self, cmd: &str) -> DeployResult<CommandOutput>;

    /// Mask session secrets in text that leaves the session.
    fn redact(&self, text: &str) -> String {
        text.to_string()
    }

    /// Execute a command and return stdout, failing on non-zero exit
    async fn exec(&self, cmd: &str) -> DeployResult<String> {
        let out = self.run(cmd).await?;
        if !out.success() {
            return Err(DeployError::RemoteCommand {
                host: self.host().to_string(),
                command: self.redact(cmd),
                exit_code: out.exit_code,
                output: self.redact(&out.combined()),
            });
        }
        Ok(out.stdout)
    }

    /// Like `exec`, for commands that embed a secret: a failure names
    /// `description` instead of the command.
    async fn exec_secret(&self, description: &str, cmd: &str) -> DeployResult<String> {
        let out = self.run(cmd).await?;
        if !out.success() {
            return Err(DeployError::RemoteCommand {
                host: self.host().to_string(),
                command: description.to_string(),
                exit_code: out.exit_code,
                output: self.redact(&out.combined()),
            });
        }
        Ok(out.stdout)
    }

    /// Execute a command, returning Ok(true) if exit 0, Ok(false) otherwise
    async fn exec_ok(&self, cmd: &str) -> DeployResult<bool> {
        Ok(self.run(cmd).await?.success())
    }

    /// Write content to a file on the remote; `path` must already be quoted
    async fn write_file(&self, path: &str, content: &str) -> DeployResult<()> {
        self.exec_secret(&format!("write {}", path), &format!(
            "umask 077 && cat > {} << 'HMSG_EOF'\n{}\nHMSG_EOF",
            path,
            content.trim_end()
        ))
        .await?;
        Ok(())
    }

    /// Run a script body as one unit under `set -euo pipefail`.
    async fn run_script(&self, body: &str) -> DeployResult<ScriptOutput> {
        debug!("[{}] script ({} lines)", self.host(), body.lines().count());
        let out = self.run(&format!("set -euo pipefail\n{}", body)).await?;
        Ok(ScriptOutput {
            exit_code: out.exit_code,
            output: self.redact(&out.combined()),
        })
    }
}
