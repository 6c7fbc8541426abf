use tracing::{debug, warn};

use super::exec::{CommandOutput, Remote};
use crate::error::{DeployError, DeployResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
    /// A failure aborts the remaining steps.
    Required,
    /// A failure is logged and the sequence continues.
    BestEffort,
}

/// One discrete command sent over the session.
#[derive(Debug, Clone)]
pub struct RemoteStep {
    pub description: String,
    pub command: String,
    pub policy: StepPolicy,
}

impl RemoteStep {
    pub fn required(description: &str, command: impl Into<String>) -> Self {
        Self {
            description: description.to_string(),
            command: command.into(),
            policy: StepPolicy::Required,
        }
    }

    pub fn best_effort(description: &str, command: impl Into<String>) -> Self {
        Self {
            description: description.to_string(),
            command: command.into(),
            policy: StepPolicy::BestEffort,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StepResult {
    pub description: String,
    pub output: CommandOutput,
}

impl StepResult {
    pub fn ok(&self) -> bool {
        self.output.success()
    }
}

/// Run steps in order over one session, stopping at the first required failure.
pub async fn run_steps<R: Remote + ?Sized>(
    remote: &R,
    steps: &[RemoteStep],
) -> DeployResult<Vec<StepResult>> {
    let mut results = Vec::with_capacity(steps.len());

    for step in steps {
        debug!("[{}] step: {}", remote.host(), step.description);
        let output = remote.run(&step.command).await?;

        if !output.success() {
            match step.policy {
                StepPolicy::Required => {
                    return Err(DeployError::RemoteCommand {
                        host: remote.host().to_string(),
                        command: step.description.clone(),
                        exit_code: output.exit_code,
                        output: remote.redact(&output.combined()),
                    });
                }
                StepPolicy::BestEffort => {
                    warn!(
                        "{} failed (exit {}): {}",
                        step.description,
                        output.exit_code,
                        output.combined()
                    );
                }
            }
        }

        results.push(StepResult {
            description: step.description.clone(),
            output,
        });
    }

    Ok(results)
}
