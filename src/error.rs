pub type DeployResult<T> = Result<T, DeployError>;

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("missing required configuration: {}", .0.join(", "))]
    Configuration(Vec<String>),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("cannot reach host {host}: {reason}")]
    Transport { host: String, reason: String },

    #[error("command failed on {host} (exit {exit_code}): {command}")]
    RemoteCommand {
        host: String,
        command: String,
        exit_code: i32,
        output: String,
    },

    #[error("local command failed: {command}")]
    LocalCommand { command: String },

    #[error("{what} did not pass after {attempts} attempt(s)")]
    VerificationTimeout {
        what: String,
        attempts: u32,
        diagnostics: String,
    },

    #[error("invalid deploy transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: crate::deploy::progress::DeployPhase,
        to: crate::deploy::progress::DeployPhase,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl DeployError {
    pub fn missing(names: &[&str]) -> Self {
        Self::Configuration(names.iter().map(|n| n.to_string()).collect())
    }

    pub fn transport(host: &str, reason: impl std::fmt::Display) -> Self {
        Self::Transport {
            host: host.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Remediation shown to the operator under the error line.
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Configuration(names) => Some(format!(
                "Export the missing variable(s) and retry, e.g. `export {}=...`",
                names.first().map(String::as_str).unwrap_or("NAME")
            )),
            Self::FileNotFound(_) => {
                Some("Check the path; `~/` is expanded against your home directory.".to_string())
            }
            Self::Transport { .. } => Some(
                "Check EC2_HOST, EC2_USER and PEM_KEY_PATH, and that port 22 is open to this machine."
                    .to_string(),
            ),
            Self::RemoteCommand { output, .. } if !output.trim().is_empty() => {
                Some(format!("Remote output:\n{}", output.trim()))
            }
            Self::LocalCommand { .. } => {
                Some("Is Docker running and are you logged in to the registry (`docker login`)?".to_string())
            }
            Self::VerificationTimeout { diagnostics, .. } => Some(diagnostics.clone()),
            _ => None,
        }
    }
}
